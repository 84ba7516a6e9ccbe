//! The rerun scheduler.
//!
//! One blocking execution unit per in-flight run. A newer rerun request
//! supersedes a still-running one cooperatively instead of killing it:
//! cells are atomic units of execution, and the cancellation flag is only
//! observed between cells and at widget publish time. The new run is
//! scheduled without waiting for the superseded one to unwind; the widget
//! store's mutex plus the publish-time cancellation check keep the two from
//! ever interleaving writes.

use std::any::Any;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::{Arc, Mutex};

use crate::compile::{CellCompiler, ScriptParser};
use crate::context::{self, ExecutionRun, RunOutcome, SessionContext};
use crate::error::Error;
use crate::script::{Cell, ScriptHandle, StartCell};

/// Scheduler decision for a rerun request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunDecision {
    /// A new run was spawned.
    Started,
    /// The in-flight run has not yet reached the requested start cell and
    /// will cover it on its own; no new run is needed.
    Declined,
}

struct SchedulerState {
    active: Option<Arc<ExecutionRun>>,
    started_once: bool,
}

/// Per-session orchestrator of script reruns.
pub struct ScriptRunner {
    script: ScriptHandle,
    parser: Arc<dyn ScriptParser>,
    compiler: Arc<dyn CellCompiler>,
    session: Arc<SessionContext>,
    state: Mutex<SchedulerState>,
}

impl ScriptRunner {
    pub fn new(
        script: ScriptHandle,
        parser: Arc<dyn ScriptParser>,
        compiler: Arc<dyn CellCompiler>,
        session: Arc<SessionContext>,
    ) -> Self {
        Self {
            script,
            parser,
            compiler,
            session,
            state: Mutex::new(SchedulerState {
                active: None,
                started_once: false,
            }),
        }
    }

    pub fn script(&self) -> &ScriptHandle {
        &self.script
    }

    /// Request a rerun starting at the given cell.
    ///
    /// `None`, and the very first request of a session whatever its start,
    /// means a full rerun. If the active run has already progressed to or
    /// past the requested start it is stale relative to the request: its
    /// cancellation flag is set and a new run starts immediately. If it has
    /// not reached the start yet, the request is redundant and declined.
    pub fn run(&self, start: Option<StartCell>) -> RunDecision {
        let mut state = self.state.lock().unwrap();

        let start = if state.started_once { start } else { None };
        let requested_index = start.map_or(0, |s| s.cell_index);

        if let Some(active) = &state.active {
            if !active.is_finished() {
                if active.current_cell_index() >= requested_index {
                    tracing::debug!(
                        script = %self.script.name(),
                        requested_index,
                        "superseding active run"
                    );
                    active.cancel();
                } else {
                    tracing::debug!(
                        script = %self.script.name(),
                        requested_index,
                        "request covered by active run, declining"
                    );
                    return RunDecision::Declined;
                }
            }
        }

        let run = Arc::new(ExecutionRun::new(requested_index));
        state.active = Some(run.clone());
        state.started_once = true;
        drop(state);

        let script = self.script.clone();
        let parser = self.parser.clone();
        let compiler = self.compiler.clone();
        let session = self.session.clone();
        tokio::task::spawn_blocking(move || {
            execute_run(script, parser, compiler, session, run, start);
        });

        RunDecision::Started
    }

    /// Cancel the active run, if any. Used on session teardown.
    pub fn abort(&self) {
        if let Some(active) = &self.state.lock().unwrap().active {
            active.cancel();
        }
    }

    /// The run most recently registered with the scheduler.
    pub fn active_run(&self) -> Option<Arc<ExecutionRun>> {
        self.state.lock().unwrap().active.clone()
    }
}

/// Cell loop of one execution run. Runs on its own blocking thread with the
/// run bound as the thread's ambient context.
fn execute_run(
    script: ScriptHandle,
    parser: Arc<dyn ScriptParser>,
    compiler: Arc<dyn CellCompiler>,
    session: Arc<SessionContext>,
    run: Arc<ExecutionRun>,
    start: Option<StartCell>,
) {
    let callbacks = session.callbacks().clone();
    callbacks.on_run_started();

    let cells = match script.ensure_compiled(parser.as_ref(), compiler.as_ref()) {
        Ok(cells) => cells,
        Err(error) => {
            tracing::warn!(script = %script.name(), %error, "script is not runnable");
            callbacks.on_run_error(&error);
            run.finish();
            callbacks.on_run_finished(RunOutcome::Failed);
            return;
        }
    };

    let start_index = resolve_start(&cells, start);
    run.advance_to(start_index);

    let scope = context::enter(session.clone(), run.clone());
    let mut outcome = RunOutcome::Completed;

    for cell in cells.iter().skip(start_index) {
        if run.is_cancelled() {
            tracing::debug!(script = %script.name(), cell = cell.index(), "run superseded, stopping");
            outcome = RunOutcome::Superseded;
            break;
        }

        run.advance_to(cell.index());
        scope.begin_cell(cell.id(), cell.index());

        let result = catch_unwind(AssertUnwindSafe(|| cell.execute()));
        let message = match result {
            Ok(Ok(())) => continue,
            Ok(Err(source)) => format!("{source:#}"),
            Err(panic) => panic_message(panic),
        };

        let error = Error::CellFailed {
            cell_id: cell.id(),
            cell_index: cell.index(),
            message,
        };
        tracing::warn!(script = %script.name(), %error, "cell failed, skipping remaining cells");
        callbacks.on_run_error(&error);
        outcome = RunOutcome::Failed;
        break;
    }

    drop(scope);
    run.finish();
    callbacks.on_run_finished(outcome);
}

/// Resolve the requested start cell against the compiled sequence. A stale
/// id that no longer resolves degrades to a full rerun, not an error.
fn resolve_start(cells: &[Cell], start: Option<StartCell>) -> usize {
    let Some(start) = start else { return 0 };
    match cells.iter().find(|cell| cell.id() == start.cell_id) {
        Some(cell) => cell.index(),
        None => {
            tracing::debug!(
                requested = start.cell_index,
                "start cell no longer resolves, running the full script"
            );
            0
        }
    }
}

fn panic_message(panic: Box<dyn Any + Send>) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.clone()
    } else {
        "cell panicked".to_string()
    }
}
