use crate::pause_gate::PauseGate;
use crate::{PausableWorker, Worker, WorkerHooks};

/// Configuration for the thread a worker spawns on each start
#[derive(Debug, Clone, Default)]
pub struct WorkerBuilder {
    name: Option<String>,
    stack_size: Option<usize>,
}

impl WorkerBuilder {
    /// Create a builder with the platform's thread defaults
    pub fn new() -> WorkerBuilder {
        WorkerBuilder::default()
    }

    /// Name the worker. The name is given to every thread the worker spawns
    /// and is attached to the worker's log events.
    pub fn name<N: Into<String>>(self, name: N) -> Self {
        WorkerBuilder {
            name: Some(name.into()),
            ..self
        }
    }

    /// Set the stack size, in bytes, of the worker's threads
    pub fn stack_size(self, stack_size: usize) -> Self {
        WorkerBuilder {
            stack_size: Some(stack_size),
            ..self
        }
    }

    /// Build a stopped worker running the given hooks
    pub fn build<H: WorkerHooks>(self, hooks: H) -> Worker<H> {
        Worker::with_config(hooks, self.name, self.stack_size)
    }

    /// Build a stopped worker, with a pause gate, running the given hooks
    pub fn build_pausable<H: WorkerHooks>(self, hooks: H) -> PausableWorker<H> {
        PausableWorker::from_worker(self.build(PauseGate::new(hooks)))
    }
}

#[cfg(all(test, not(loom)))]
mod tests {
    use super::*;
    use crate::{FnStep, StepContext};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::thread;
    use std::time::Duration;

    #[test]
    fn test_stack_size_is_applied() {
        let steps = Arc::new(AtomicUsize::new(0));
        let steps_clone = steps.clone();

        let worker = WorkerBuilder::new()
            .stack_size(256 * 1024)
            .name("small-stack")
            .build(FnStep::new(move |ctx: &StepContext<'_>| {
                steps_clone.fetch_add(1, Ordering::SeqCst);
                ctx.sleep(Duration::from_millis(1));
            }));

        worker.start().unwrap();
        while steps.load(Ordering::SeqCst) == 0 {
            thread::sleep(Duration::from_millis(1));
        }
        worker.stop(true);

        assert!(worker.is_stopped());
        assert_eq!(worker.name(), Some("small-stack"));
    }

    #[test]
    fn test_unnamed_by_default() {
        let worker = WorkerBuilder::new()
            .build_pausable(FnStep::new(|_: &StepContext<'_>| {}));

        assert_eq!(worker.name(), None);
        assert!(worker.is_stopped());
    }
}
