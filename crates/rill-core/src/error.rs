//! Error types for rill-core.

use thiserror::Error;

use crate::script::CellId;

/// Result type for rill-core operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in rill-core.
///
/// None of these cross the session boundary as a failure of the session
/// itself: compile and cell errors are recorded on the run and forwarded to
/// the session handler for transmission as a status message.
#[derive(Debug, Error)]
pub enum Error {
    /// A cell failed to compile. The script stays not-runnable until its
    /// source is fixed and the cached state is explicitly invalidated.
    #[error("compile error{}: {message}", cell_index.map(|i| format!(" in cell {i}")).unwrap_or_default())]
    Compile {
        cell_index: Option<usize>,
        message: String,
    },

    /// A cell body failed during execution. The remaining cells of the run
    /// are skipped; widgets already published stay valid.
    #[error("cell {cell_index} ({cell_id}) failed: {message}")]
    CellFailed {
        cell_id: CellId,
        cell_index: usize,
        message: String,
    },

    /// A widget primitive was invoked outside any execution run. Fatal to
    /// that call site only, signals misuse.
    #[error("no active run on this thread")]
    NoActiveRun,

    /// Script not found in the registry.
    #[error("script not found: {0}")]
    ScriptNotFound(String),

    /// Failed to split script source into cells.
    #[error("parse error: {0}")]
    Parse(String),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
