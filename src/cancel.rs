use crate::lifecycle::Shared;
use crate::sync::AtomicBool;
use std::sync::atomic::Ordering;
use std::time::Duration;

/// Handle given to [`WorkerHooks::step`](crate::WorkerHooks::step) for
/// observing the cancellation signal of the current execution context.
///
/// The signal belongs to one context: a worker that is stopped and started
/// again hands its hooks a fresh, uncancelled context.
#[derive(Debug)]
pub struct StepContext<'a> {
    shared: &'a Shared,
    cancel: &'a AtomicBool,
}

impl<'a> StepContext<'a> {
    pub(crate) fn new(shared: &'a Shared, cancel: &'a AtomicBool) -> Self {
        StepContext { shared, cancel }
    }

    /// Check whether the worker has been asked to stop
    pub fn is_cancelled(&self) -> bool {
        self.cancel.load(Ordering::SeqCst)
    }

    /// Sleep for the given duration or until the worker is asked to stop,
    /// whichever comes first. Returns `true` if the full duration elapsed
    /// and `false` if the sleep was cut short by cancellation.
    pub fn sleep(&self, duration: Duration) -> bool {
        self.shared.sleep(self.cancel, duration)
    }

    /// The name the worker was built with, if any
    pub fn worker_name(&self) -> Option<&str> {
        self.shared.name()
    }

    pub(crate) fn park_while_paused(&self) -> bool {
        self.shared.park_while_paused(self.cancel)
    }
}
