//! Error types for the rill server.

/// Server error type.
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    /// Core engine error.
    #[error("core error: {0}")]
    Core(#[from] rill_core::Error),

    /// Requested script is not registered.
    #[error("script not found: {0}")]
    ScriptNotFound(String),

    /// IO error (bind, listen).
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Result type for server operations.
pub type ServerResult<T> = Result<T, ServerError>;
