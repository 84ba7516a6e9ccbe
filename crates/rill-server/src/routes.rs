//! HTTP and WebSocket routes for the rill server.

use std::sync::Arc;

use axum::{
    Router,
    extract::{
        Path, State, WebSocketUpgrade,
        ws::{Message, WebSocket},
    },
    response::{IntoResponse, Json},
    routing::get,
};
use futures::{SinkExt, StreamExt};
use tokio::sync::broadcast;
use tower_http::cors::CorsLayer;

use rill_core::ScriptRegistry;

use crate::protocol::ServerMessage;
use crate::session::Session;

/// Application state shared across handlers.
pub struct AppState {
    /// Scripts available to incoming connections.
    pub registry: Arc<ScriptRegistry>,
}

/// Create the router with all routes.
pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .route("/api/scripts", get(scripts_handler))
        .route("/ws/{script}", get(ws_handler))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Health check handler.
async fn health_handler() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION")
    }))
}

/// Names of the registered scripts.
async fn scripts_handler(State(state): State<Arc<AppState>>) -> Json<Vec<String>> {
    Json(state.registry.names())
}

/// WebSocket upgrade handler: one session per connection.
async fn ws_handler(
    ws: WebSocketUpgrade,
    Path(script): Path<String>,
    State(state): State<Arc<AppState>>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_websocket(socket, script, state))
}

/// Handle one WebSocket connection for its whole lifetime.
async fn handle_websocket(socket: WebSocket, script_name: String, state: Arc<AppState>) {
    let (mut sender, mut receiver) = socket.split();

    let Some(script) = state.registry.get(&script_name) else {
        tracing::warn!(script = %script_name, "connection for unknown script rejected");
        let message = ServerMessage::Error {
            message: format!("script not found: {script_name}"),
        };
        if let Ok(json) = serde_json::to_string(&message) {
            let _ = sender.send(Message::Text(json.into())).await;
        }
        let _ = sender.close().await;
        return;
    };

    let session = Session::open(script, state.registry.parser(), state.registry.compiler());
    let mut snapshots = session.subscribe_snapshots();
    let mut events = session.subscribe_events();
    session.start();

    // Forward outbound traffic to the socket. The snapshot side observes
    // only the latest full snapshot, so a slow client coalesces harder
    // instead of queuing every incremental publish.
    let forward_task = tokio::spawn(async move {
        loop {
            let message = tokio::select! {
                changed = snapshots.changed() => {
                    if changed.is_err() {
                        break;
                    }
                    let records = snapshots.borrow_and_update().clone();
                    ServerMessage::WidgetStates(records)
                }
                event = events.recv() => {
                    match event {
                        Ok(message) => message,
                        Err(broadcast::error::RecvError::Lagged(skipped)) => {
                            tracing::debug!(skipped, "slow client skipped status events");
                            continue;
                        }
                        Err(broadcast::error::RecvError::Closed) => break,
                    }
                }
            };
            if let Ok(json) = serde_json::to_string(&message) {
                if sender.send(Message::Text(json.into())).await.is_err() {
                    break;
                }
            }
        }
    });

    // Inbound loop: decode and merge input batches until the peer goes away.
    while let Some(result) = receiver.next().await {
        match result {
            Ok(Message::Text(text)) => session.on_input(&text),
            Ok(Message::Close(_)) => break,
            Err(error) => {
                tracing::warn!(%error, "websocket error");
                break;
            }
            _ => {}
        }
    }

    session.close();
    forward_task.abort();
}
