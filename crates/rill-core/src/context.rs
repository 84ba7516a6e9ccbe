//! Execution-run context and its ambient binding.
//!
//! Each rerun executes on its own blocking thread, and the widget emission
//! API must reach the current run without being threaded through every call
//! in a cell body. The binding is a thread-local scoped to the lifetime of
//! one run: set when the run's scope guard is created, cleared when it
//! drops. It is the only ambient state in the engine.

use std::cell::RefCell;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use crate::error::{Error, Result};
use crate::script::CellId;
use crate::store::{WidgetState, WidgetStore};

/// One attempt to execute a subsequence of cells.
///
/// Shared between the executing thread and the scheduler: the scheduler
/// reads the current cell index to decide whether a new rerun request
/// supersedes this run, and sets the cancellation flag when it does.
/// Cancellation is cooperative and observed only at cell boundaries and at
/// widget publish time: a cell body is an atomic unit of execution and is
/// never interrupted from the inside.
#[derive(Debug)]
pub struct ExecutionRun {
    start_index: usize,
    current_cell_index: AtomicUsize,
    cancelled: AtomicBool,
    finished: AtomicBool,
}

impl ExecutionRun {
    pub(crate) fn new(start_index: usize) -> Self {
        Self {
            start_index,
            current_cell_index: AtomicUsize::new(start_index),
            cancelled: AtomicBool::new(false),
            finished: AtomicBool::new(false),
        }
    }

    /// Index of the cell this run was asked to start from.
    pub fn start_index(&self) -> usize {
        self.start_index
    }

    /// Index of the cell the run is currently executing, or about to.
    pub fn current_cell_index(&self) -> usize {
        self.current_cell_index.load(Ordering::Acquire)
    }

    pub(crate) fn advance_to(&self, index: usize) {
        self.current_cell_index.store(index, Ordering::Release);
    }

    /// Request cooperative cancellation. The run observes the flag at the
    /// next cell boundary or widget publish and stops; nothing it already
    /// published is rolled back.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Release);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
    }

    pub(crate) fn finish(&self) {
        self.finished.store(true, Ordering::Release);
    }

    /// Whether the run's cell loop has retired.
    pub fn is_finished(&self) -> bool {
        self.finished.load(Ordering::Acquire)
    }
}

/// How a run retired.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunOutcome {
    /// All selected cells executed.
    Completed,
    /// A newer run superseded this one before it reached the end.
    Superseded,
    /// A cell failed to compile or its body failed; remaining cells were
    /// skipped.
    Failed,
}

/// Run lifecycle callbacks, implemented by the session handler.
///
/// Errors are forwarded here and never thrown across the session boundary.
/// Callbacks are invoked from the run's execution thread and must not
/// block on the transport.
pub trait RunCallback: Send + Sync {
    /// A widget state was written to the session's store.
    fn on_widget_published(&self, state: &WidgetState);

    /// A run's cell loop is about to start.
    fn on_run_started(&self) {}

    /// A compile or cell error terminated the run.
    fn on_run_error(&self, _error: &Error) {}

    /// The run retired.
    fn on_run_finished(&self, _outcome: RunOutcome) {}
}

/// Per-session state shared by reference with every run of the session:
/// the widget store plus the callbacks used to publish widgets and report
/// run progress.
pub struct SessionContext {
    store: Arc<WidgetStore>,
    callbacks: Arc<dyn RunCallback>,
}

impl SessionContext {
    pub fn new(store: Arc<WidgetStore>, callbacks: Arc<dyn RunCallback>) -> Self {
        Self { store, callbacks }
    }

    pub fn store(&self) -> &Arc<WidgetStore> {
        &self.store
    }

    pub fn callbacks(&self) -> &Arc<dyn RunCallback> {
        &self.callbacks
    }
}

pub(crate) struct RunScope {
    pub(crate) session: Arc<SessionContext>,
    pub(crate) run: Arc<ExecutionRun>,
    current_cell: Option<(CellId, usize)>,
    slot_index: u32,
}

impl RunScope {
    /// Enter a cell: record its identity and reset the output-slot index.
    /// The slot index only ever resets here, on a fresh cell boundary.
    fn begin_cell(&mut self, id: CellId, index: usize) {
        self.current_cell = Some((id, index));
        self.slot_index = 0;
    }

    pub(crate) fn current_cell(&self) -> Option<(CellId, usize)> {
        self.current_cell
    }

    pub(crate) fn next_slot(&mut self) -> u32 {
        self.slot_index += 1;
        self.slot_index
    }
}

thread_local! {
    static RUN_SCOPE: RefCell<Option<RunScope>> = const { RefCell::new(None) };
}

/// Binds a run to the calling thread until dropped.
pub(crate) struct ScopeGuard {
    _private: (),
}

impl ScopeGuard {
    pub(crate) fn begin_cell(&self, id: CellId, index: usize) {
        // the guard is alive, so the scope is present
        let _ = with_current(|scope| scope.begin_cell(id, index));
    }
}

impl Drop for ScopeGuard {
    fn drop(&mut self) {
        RUN_SCOPE.with(|scope| scope.borrow_mut().take());
    }
}

/// Attach a run to the calling thread. The previous binding, if any, is
/// replaced; the returned guard clears the binding on drop.
pub(crate) fn enter(session: Arc<SessionContext>, run: Arc<ExecutionRun>) -> ScopeGuard {
    RUN_SCOPE.with(|scope| {
        *scope.borrow_mut() = Some(RunScope {
            session,
            run,
            current_cell: None,
            slot_index: 0,
        });
    });
    ScopeGuard { _private: () }
}

pub(crate) fn with_current<R>(f: impl FnOnce(&mut RunScope) -> R) -> Result<R> {
    RUN_SCOPE.with(|scope| match scope.borrow_mut().as_mut() {
        Some(scope) => Ok(f(scope)),
        None => Err(Error::NoActiveRun),
    })
}

/// The run bound to the calling thread.
///
/// Fails with [`Error::NoActiveRun`] when called outside any run, e.g.
/// from an interactive context that never entered the scheduler.
pub fn current_run() -> Result<Arc<ExecutionRun>> {
    with_current(|scope| scope.run.clone())
}
