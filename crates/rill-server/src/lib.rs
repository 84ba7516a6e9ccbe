//! rill WebSocket server.
//!
//! Binds one session per connection: inbound widget updates become rerun
//! requests against the session's script, and widget-state snapshots stream
//! back in a stable order.
//!
//! # Architecture
//!
//! - **Session**: one connection's widget store + script runner binding
//! - **Protocol**: client/server message types
//! - **Routes**: HTTP and WebSocket handlers

pub mod error;
pub mod protocol;
pub mod routes;
pub mod session;

use std::net::SocketAddr;
use std::sync::Arc;

use rill_core::ScriptRegistry;

pub use error::{ServerError, ServerResult};
pub use protocol::{ClientMessage, RunStatus, ScriptStatus, ServerMessage};
pub use routes::{AppState, create_router};
pub use session::Session;

/// Server configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Host address to bind to.
    pub host: String,
    /// Port to listen on.
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8888,
        }
    }
}

/// Start the rill server for a registry of scripts.
pub async fn serve(registry: Arc<ScriptRegistry>, config: ServerConfig) -> ServerResult<()> {
    let state = Arc::new(AppState { registry });
    let app = create_router(state);

    let addr: SocketAddr = format!("{}:{}", config.host, config.port)
        .parse()
        .map_err(|_| {
            ServerError::Io(std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                format!("invalid address: {}:{}", config.host, config.port),
            ))
        })?;

    tracing::info!("rill server listening on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;

    // Graceful shutdown on Ctrl+C
    let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel::<()>();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("received shutdown signal");
            let _ = shutdown_tx.send(());
        }
    });

    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            let _ = shutdown_rx.await;
        })
        .await?;

    tracing::info!("server shutdown complete");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = ServerConfig::default();
        assert_eq!(config.host, "127.0.0.1");
        assert_eq!(config.port, 8888);
    }
}
