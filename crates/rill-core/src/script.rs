//! Scripts and their compiled cells.

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use uuid::Uuid;

use crate::compile::{CellCompiler, ExecutableUnit, ScriptParser};
use crate::error::{Error, Result};

/// Stable identifier for a cell, assigned at compile time.
///
/// The id survives as the cell's identity even when recompilation shifts
/// positions: the index is a position, the id is an identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub struct CellId(Uuid);

impl CellId {
    /// Generate a fresh cell id.
    pub fn fresh() -> Self {
        Self(Uuid::new_v4())
    }
}

impl fmt::Display for CellId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One compiled, independently rerunnable unit of script source.
pub struct Cell {
    id: CellId,
    index: usize,
    body: ExecutableUnit,
}

impl Cell {
    pub fn new(index: usize, body: ExecutableUnit) -> Self {
        Self {
            id: CellId::fresh(),
            index,
            body,
        }
    }

    pub fn id(&self) -> CellId {
        self.id
    }

    pub fn index(&self) -> usize {
        self.index
    }

    /// Execute the cell body.
    pub fn execute(&self) -> anyhow::Result<()> {
        self.body.call()
    }
}

impl fmt::Debug for Cell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Cell")
            .field("id", &self.id)
            .field("index", &self.index)
            .finish_non_exhaustive()
    }
}

/// Start position for a partial rerun: the earliest cell that produced a
/// changed widget.
#[derive(Debug, Clone, Copy)]
pub struct StartCell {
    /// Stable id of the cell, used to resolve the start position against
    /// the current cell sequence.
    pub cell_id: CellId,
    /// Index the cell had when the widget state was recorded.
    pub cell_index: usize,
}

enum CompiledCells {
    Pending,
    Ready(Arc<[Cell]>),
    Failed(String),
}

/// A script: immutable identity plus its compiled cell sequence.
///
/// Cells are compiled once on first use and shared read-only across all
/// sessions of the script. A compile failure is cached and reported to
/// every rerun that hits it; the script stays not-runnable until
/// [`Script::invalidate`] clears the cached state.
pub struct Script {
    name: String,
    path: Option<PathBuf>,
    cells: Mutex<CompiledCells>,
}

/// Shared handle to a script.
pub type ScriptHandle = Arc<Script>;

impl Script {
    /// Create a script backed by a source file. The name is the file stem.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let name = path
            .file_stem()
            .map(|stem| stem.to_string_lossy().into_owned())
            .ok_or_else(|| Error::Parse(format!("not a script path: {}", path.display())))?;
        Ok(Self {
            name,
            path: Some(path),
            cells: Mutex::new(CompiledCells::Pending),
        })
    }

    /// Create a script from cells built elsewhere (embedders, tests).
    /// Cell indices must match their positions in the sequence.
    pub fn from_cells(name: impl Into<String>, cells: Vec<Cell>) -> Self {
        Self {
            name: name.into(),
            path: None,
            cells: Mutex::new(CompiledCells::Ready(cells.into())),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Total cell count, if the script has been compiled.
    pub fn cell_count(&self) -> Option<usize> {
        match &*self.cells.lock().unwrap() {
            CompiledCells::Ready(cells) => Some(cells.len()),
            _ => None,
        }
    }

    /// Compile all cells on first use, caching the result.
    ///
    /// Each cell gets a fresh stable id and its positional index. A cached
    /// failure is returned as-is without touching the source again.
    pub fn ensure_compiled(
        &self,
        parser: &dyn ScriptParser,
        compiler: &dyn CellCompiler,
    ) -> Result<Arc<[Cell]>> {
        let mut cells = self.cells.lock().unwrap();
        match &*cells {
            CompiledCells::Ready(compiled) => return Ok(compiled.clone()),
            CompiledCells::Failed(message) => {
                return Err(Error::Compile {
                    cell_index: None,
                    message: message.clone(),
                });
            }
            CompiledCells::Pending => {}
        }

        match self.compile_cells(parser, compiler) {
            Ok(compiled) => {
                *cells = CompiledCells::Ready(compiled.clone());
                Ok(compiled)
            }
            Err(error) => {
                *cells = CompiledCells::Failed(error.to_string());
                Err(error)
            }
        }
    }

    fn compile_cells(
        &self,
        parser: &dyn ScriptParser,
        compiler: &dyn CellCompiler,
    ) -> Result<Arc<[Cell]>> {
        let path = self
            .path
            .as_ref()
            .ok_or_else(|| Error::Parse(format!("script {} has no source to compile", self.name)))?;
        let source = std::fs::read_to_string(path)?;
        let sources = parser.parse(&source)?;

        let mut compiled = Vec::with_capacity(sources.len());
        for (index, cell_source) in sources.iter().enumerate() {
            let body = compiler.compile(cell_source).map_err(|error| match error {
                Error::Compile { message, .. } => Error::Compile {
                    cell_index: Some(index),
                    message,
                },
                other => other,
            })?;
            compiled.push(Cell::new(index, body));
        }

        tracing::debug!(script = %self.name, cells = compiled.len(), "compiled script");
        Ok(compiled.into())
    }

    /// Invalidation hook: drop the cached cells (or cached failure) so the
    /// next rerun recompiles from source.
    pub fn invalidate(&self) {
        *self.cells.lock().unwrap() = CompiledCells::Pending;
    }
}

impl fmt::Debug for Script {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Script")
            .field("name", &self.name)
            .field("path", &self.path)
            .field("cell_count", &self.cell_count())
            .finish()
    }
}
