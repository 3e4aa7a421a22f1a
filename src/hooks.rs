use crate::cancel::StepContext;
use crate::error::HookFault;
use std::fmt;

/// The behavior a worker runs on its execution context.
///
/// Each start of the worker calls [`setup`](WorkerHooks::setup) once, then
/// [`step`](WorkerHooks::step) repeatedly until the worker is asked to stop,
/// then [`teardown`](WorkerHooks::teardown) once. The same hooks value is
/// reused across restarts, so state kept in its fields survives a stop.
///
/// Cancellation is cooperative. It is checked between steps, but a step that
/// blocks for a long time should poll [`StepContext::is_cancelled`] or wait
/// with [`StepContext::sleep`] so that stopping is not delayed.
pub trait WorkerHooks: Send + 'static {
    /// Runs once per start, before the first step. It is not interrupted by
    /// a stop request.
    fn setup(&mut self) {}

    /// One iteration of the worker's loop
    fn step(&mut self, ctx: &StepContext<'_>);

    /// Runs once per start after the loop ends, including when setup or a
    /// step panicked.
    fn teardown(&mut self) {}

    /// Called on the worker thread when a hook panicked, after teardown and
    /// before the panic is resumed.
    fn on_fault(&mut self, _fault: &HookFault) {}
}

/// The hook in which a fault occurred
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HookPhase {
    /// [`WorkerHooks::setup`]
    Setup,
    /// [`WorkerHooks::step`]
    Step,
    /// [`WorkerHooks::teardown`]
    Teardown,
}

impl fmt::Display for HookPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            HookPhase::Setup => "setup",
            HookPhase::Step => "step",
            HookPhase::Teardown => "teardown",
        })
    }
}

/// Hooks built from a single step closure, with no setup or teardown
pub struct FnStep<F>(F);

impl<F> FnStep<F>
where
    F: FnMut(&StepContext<'_>) + Send + 'static,
{
    /// Wrap a step closure
    pub fn new(step: F) -> FnStep<F> {
        FnStep(step)
    }
}

impl<F> WorkerHooks for FnStep<F>
where
    F: FnMut(&StepContext<'_>) + Send + 'static,
{
    fn step(&mut self, ctx: &StepContext<'_>) {
        (self.0)(ctx)
    }
}

impl<F> fmt::Debug for FnStep<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FnStep").finish_non_exhaustive()
    }
}
