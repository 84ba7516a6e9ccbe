//! Core engine for the rill reactive script server.
//!
//! A script is an ordered sequence of cells. User input events change widget
//! values; the engine decides which suffix of cells to rerun, supersedes a
//! still-running prior execution cooperatively, and merges the newly
//! produced widget values with the previously known ones for transmission.
//!
//! This crate provides:
//! - Script registry with compile-once cell caching
//! - Execution-run context with cooperative cancellation
//! - Widget model, emission API, and per-session widget store
//! - The rerun scheduler (partial reruns and supersession)

pub mod compile;
pub mod context;
pub mod error;
pub mod registry;
pub mod runner;
pub mod script;
pub mod store;
pub mod widgets;

pub use compile::{CellCompiler, EchoCompiler, ExecutableUnit, PercentParser, ScriptParser};
pub use context::{ExecutionRun, RunCallback, RunOutcome, SessionContext, current_run};
pub use error::{Error, Result};
pub use registry::ScriptRegistry;
pub use runner::{RunDecision, ScriptRunner};
pub use script::{Cell, CellId, Script, ScriptHandle, StartCell};
pub use store::{WidgetState, WidgetStateRecord, WidgetStore, WidgetUpdate};
pub use widgets::{Widget, WidgetKind, WidgetValue};
