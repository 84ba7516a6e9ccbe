//! Script registry: load scripts once, share them across sessions.

use std::path::Path;
use std::sync::{Arc, RwLock};

use rustc_hash::FxHashMap;

use crate::compile::{CellCompiler, ScriptParser};
use crate::error::Result;
use crate::script::{Script, ScriptHandle};

/// Registry of the scripts available to incoming connections.
///
/// Constructed explicitly and handed to collaborators; there is no global
/// instance. Compiled cell sequences live on the `Script` handles and are
/// effectively immutable after first compilation, so many sessions read
/// them concurrently without further synchronization.
pub struct ScriptRegistry {
    parser: Arc<dyn ScriptParser>,
    compiler: Arc<dyn CellCompiler>,
    scripts: RwLock<FxHashMap<String, ScriptHandle>>,
}

impl ScriptRegistry {
    pub fn new(parser: Arc<dyn ScriptParser>, compiler: Arc<dyn CellCompiler>) -> Self {
        Self {
            parser,
            compiler,
            scripts: RwLock::new(FxHashMap::default()),
        }
    }

    /// Register a script file. The registry key is the file stem; a second
    /// registration under the same name replaces the first.
    pub fn register(&self, path: impl AsRef<Path>) -> Result<ScriptHandle> {
        let handle: ScriptHandle = Arc::new(Script::from_path(path)?);
        self.scripts
            .write()
            .unwrap()
            .insert(handle.name().to_string(), handle.clone());
        tracing::info!(script = %handle.name(), "registered script");
        Ok(handle)
    }

    /// Register an already-built script (embedders, demo scripts).
    pub fn add(&self, script: Script) -> ScriptHandle {
        let handle: ScriptHandle = Arc::new(script);
        self.scripts
            .write()
            .unwrap()
            .insert(handle.name().to_string(), handle.clone());
        handle
    }

    pub fn get(&self, name: &str) -> Option<ScriptHandle> {
        self.scripts.read().unwrap().get(name).cloned()
    }

    /// Names of all registered scripts, sorted.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.scripts.read().unwrap().keys().cloned().collect();
        names.sort();
        names
    }

    pub fn parser(&self) -> Arc<dyn ScriptParser> {
        self.parser.clone()
    }

    pub fn compiler(&self) -> Arc<dyn CellCompiler> {
        self.compiler.clone()
    }
}
