//! Per-connection session handling.
//!
//! A session binds one connection to one script runner and one widget
//! store. Inbound messages become rerun requests; outbound traffic is split
//! into a coalescing snapshot channel and a bounded status event channel.
//! The snapshot channel always carries the latest full ordered snapshot, so
//! a slow client coalesces bursts instead of accumulating a backlog, and a
//! snapshot can never contain a value older than one already sent.

use std::sync::Arc;

use tokio::sync::{broadcast, watch};
use uuid::Uuid;

use rill_core::{
    CellCompiler, Error, RunCallback, RunOutcome, ScriptHandle, ScriptParser, ScriptRunner,
    SessionContext, WidgetState, WidgetStateRecord, WidgetStore,
};

use crate::protocol::{ClientMessage, ScriptStatus, ServerMessage};

/// Capacity for the status event channel. If a client falls behind, the
/// oldest events are dropped.
const EVENT_CHANNEL_CAPACITY: usize = 256;

/// One connection bound to one script runner and widget store.
pub struct Session {
    id: Uuid,
    store: Arc<WidgetStore>,
    runner: ScriptRunner,
    snapshots: watch::Receiver<Vec<WidgetStateRecord>>,
    events: broadcast::Sender<ServerMessage>,
}

/// Run callbacks publishing into the session's outbound channels. Invoked
/// from run execution threads; both sends are non-blocking, so a publish
/// never stalls the script.
struct SessionCallbacks {
    store: Arc<WidgetStore>,
    snapshots: watch::Sender<Vec<WidgetStateRecord>>,
    events: broadcast::Sender<ServerMessage>,
}

impl RunCallback for SessionCallbacks {
    fn on_widget_published(&self, _state: &WidgetState) {
        // replace the channel's value with the latest full ordered snapshot
        let _ = self.snapshots.send(self.store.snapshot());
    }

    fn on_run_started(&self) {
        let _ = self
            .events
            .send(ServerMessage::ScriptStatus(ScriptStatus::running()));
    }

    fn on_run_error(&self, error: &Error) {
        let _ = self
            .events
            .send(ServerMessage::ScriptStatus(ScriptStatus::error(
                error.to_string(),
            )));
    }

    fn on_run_finished(&self, outcome: RunOutcome) {
        if outcome == RunOutcome::Completed {
            let _ = self
                .events
                .send(ServerMessage::ScriptStatus(ScriptStatus::finished()));
        }
    }
}

impl Session {
    /// Create the session's widget store and bind a script runner to it.
    ///
    /// Subscribe to the outbound channels before calling [`Session::start`],
    /// which triggers the initial full run.
    pub fn open(
        script: ScriptHandle,
        parser: Arc<dyn ScriptParser>,
        compiler: Arc<dyn CellCompiler>,
    ) -> Self {
        let id = Uuid::new_v4();
        let store = Arc::new(WidgetStore::new());
        let (snapshot_tx, snapshot_rx) = watch::channel(Vec::new());
        let (event_tx, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);

        let callbacks = Arc::new(SessionCallbacks {
            store: store.clone(),
            snapshots: snapshot_tx,
            events: event_tx.clone(),
        });
        let context = Arc::new(SessionContext::new(store.clone(), callbacks));
        let runner = ScriptRunner::new(script.clone(), parser, compiler, context);

        tracing::info!(session = %id, script = %script.name(), "session opened");
        Self {
            id,
            store,
            runner,
            snapshots: snapshot_rx,
            events: event_tx,
        }
    }

    /// Trigger the initial full run.
    pub fn start(&self) {
        self.runner.run(None);
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn store(&self) -> &Arc<WidgetStore> {
        &self.store
    }

    /// Subscribe to coalesced widget-state snapshots.
    pub fn subscribe_snapshots(&self) -> watch::Receiver<Vec<WidgetStateRecord>> {
        self.snapshots.clone()
    }

    /// Subscribe to run status events.
    pub fn subscribe_events(&self) -> broadcast::Receiver<ServerMessage> {
        self.events.subscribe()
    }

    /// Handle one raw inbound message.
    ///
    /// Updates for unknown keys or with unchanged values are skipped; the
    /// client racing ahead of server state is expected, not an error. If at
    /// least one widget changed, a rerun starts at the earliest cell that
    /// produced any changed widget.
    pub fn on_input(&self, raw: &str) {
        let message = match serde_json::from_str::<ClientMessage>(raw) {
            Ok(message) => message,
            Err(error) => {
                tracing::warn!(session = %self.id, %error, "malformed client message ignored");
                return;
            }
        };

        match message {
            ClientMessage::WidgetStateUpdate(updates) => {
                match self.store.apply_updates(&updates) {
                    Some(start) => {
                        self.runner.run(Some(start));
                    }
                    None => {
                        tracing::debug!(session = %self.id, "no widget changed, rerun skipped");
                    }
                }
            }
            ClientMessage::Unknown => {
                tracing::debug!(session = %self.id, "unrecognized message type ignored");
            }
        }
    }

    /// Release the session: cancel any active run. The widget store dies
    /// with the session.
    pub fn close(&self) {
        self.runner.abort();
        tracing::info!(session = %self.id, "session closed");
    }
}
