use crate::{
    FnStep, HookFault, StepContext, Worker, WorkerBuilder, WorkerError,
    WorkerHooks, WorkerState,
};
use std::fmt;

/// Hook decorator that parks the worker before each step while a pause is
/// requested. Cancellation wakes it, after which the step is skipped.
pub(crate) struct PauseGate<H> {
    inner: H,
}

impl<H> PauseGate<H> {
    pub(crate) fn new(inner: H) -> PauseGate<H> {
        PauseGate { inner }
    }
}

impl<H: WorkerHooks> WorkerHooks for PauseGate<H> {
    fn setup(&mut self) {
        self.inner.setup()
    }

    fn step(&mut self, ctx: &StepContext<'_>) {
        if ctx.park_while_paused() {
            tracing::trace!(
                worker = ctx.worker_name(),
                cancelled = ctx.is_cancelled(),
                "worker left pause gate"
            );
        }

        if ctx.is_cancelled() {
            return;
        }

        self.inner.step(ctx)
    }

    fn teardown(&mut self) {
        self.inner.teardown()
    }

    fn on_fault(&mut self, fault: &HookFault) {
        self.inner.on_fault(fault)
    }
}

/// A [`Worker`] that can additionally be paused and resumed.
///
/// Pausing takes effect at the next step boundary: a step already in progress
/// finishes, then the worker thread parks until it is resumed or stopped.
/// Stopping always clears the pause, so a restarted worker never starts out
/// paused.
pub struct PausableWorker<H: WorkerHooks> {
    worker: Worker<PauseGate<H>>,
}

impl<F> PausableWorker<FnStep<F>>
where
    F: FnMut(&StepContext<'_>) + Send + 'static,
{
    /// Create a pausable worker whose step is the given closure
    pub fn from_fn(step: F) -> Self {
        PausableWorker::new(FnStep::new(step))
    }
}

impl<H: WorkerHooks> PausableWorker<H> {
    /// Create a stopped pausable worker that will run the given hooks
    pub fn new(hooks: H) -> Self {
        WorkerBuilder::new().build_pausable(hooks)
    }

    pub(crate) fn from_worker(worker: Worker<PauseGate<H>>) -> Self {
        PausableWorker { worker }
    }

    /// See [`Worker::start`]
    pub fn start(&self) -> Result<(), WorkerError> {
        self.worker.start()
    }

    /// See [`Worker::stop`]. A paused worker is woken up so it can exit.
    pub fn stop(&self, wait: bool) {
        self.worker.stop(wait)
    }

    /// Pause the worker before its next step.
    ///
    /// True will be returned if a pause was requested, and false will be
    /// returned if the worker was not running or was already paused.
    pub fn pause(&self) -> bool {
        let paused = self.worker.shared().request_pause();

        if paused {
            tracing::trace!(
                worker = self.worker.name(),
                "worker pause requested"
            );
        }

        paused
    }

    /// Resume the worker and wake its thread if it is parked.
    ///
    /// This will return true if the worker was paused and false otherwise
    pub fn resume(&self) -> bool {
        let resumed = self.worker.shared().request_resume();

        if resumed {
            tracing::trace!(worker = self.worker.name(), "worker resumed");
        }

        resumed
    }

    /// Check to see if a pause is currently requested
    pub fn is_paused(&self) -> bool {
        self.worker.shared().lock().is_pause_requested()
    }

    /// See [`Worker::state`]
    pub fn state(&self) -> WorkerState {
        self.worker.state()
    }

    /// See [`Worker::is_stopped`]
    pub fn is_stopped(&self) -> bool {
        self.worker.is_stopped()
    }

    /// See [`Worker::name`]
    pub fn name(&self) -> Option<&str> {
        self.worker.name()
    }
}

impl<H: WorkerHooks> fmt::Debug for PausableWorker<H> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PausableWorker")
            .field("name", &self.name())
            .field("state", &self.state())
            .field("paused", &self.is_paused())
            .finish()
    }
}
