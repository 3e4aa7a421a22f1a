//! # Pausable Worker
//!
//! This crate provides a single background worker thread that can be started,
//! stopped, paused and resumed ... (and restarted, as often as you like). The
//! provided struct `Worker` runs a set of user supplied hooks on its own
//! thread: `setup` once, `step` over and over until asked to stop, then
//! `teardown` once. `PausableWorker` adds a pause gate in front of every step.
//!
//! ## Features
//! - Thread-Safe: (`Send`/`Sync`) All lifecycle operations take `&self` and
//! are serialized by a single std mutex, so concurrent callers can never
//! create two worker threads or race a stop against a start
//! - Cooperative Cancellation: stopping never kills a thread. The signal is
//! checked between steps and wakes a step blocked in `StepContext::sleep` or
//! a worker parked by a pause
//! - Restartable: a stopped worker (even one whose hooks panicked) can be
//! started again, and pause state never survives a stop
//!
//! ## Example
//!
//! ```rust
//! # use std::sync::Arc;
//! # use std::sync::atomic::{AtomicUsize, Ordering};
//! # use std::time::Duration;
//! # use std::thread;
//! use pausable_worker::PausableWorker;
//!
//! let counter = Arc::new(AtomicUsize::new(0));
//! let counter_clone = counter.clone();
//!
//! let worker = PausableWorker::from_fn(move |ctx| {
//!     counter_clone.fetch_add(1, Ordering::SeqCst);
//!     ctx.sleep(Duration::from_millis(1));
//! });
//!
//! worker.start().unwrap();
//!
//! // Let the worker make some progress
//! while counter.load(Ordering::SeqCst) < 3 {
//!     thread::sleep(Duration::from_millis(1));
//! }
//!
//! worker.pause();
//!
//! // Stopping a paused worker wakes it up so it can exit
//! worker.stop(true);
//! assert!(worker.is_stopped());
//! ```
//!
//! ## Caveats
//! - Cancellation is cooperative. A step that blocks without using
//! `StepContext::sleep` or polling `StepContext::is_cancelled` delays stop
//! until it returns
//! - A panic in a hook is reported through `WorkerHooks::on_fault` and then
//! resumed on the worker thread. The worker itself is reset to stopped
//! - Right after `start` returns, `is_stopped` may still report `true` until
//! the new thread has marked itself running
#![cfg_attr(
    feature = "document-features",
    doc = "## Feature flags",
    doc = document_features::document_features!()
)]
#![warn(
    missing_docs,
    rust_2018_idioms,
    missing_debug_implementations,
    clippy::all
)]

mod builder;
mod cancel;
mod context_guard;
mod error;
mod hooks;
mod lifecycle;
mod pause_gate;
mod sync;

pub use builder::WorkerBuilder;
pub use cancel::StepContext;
pub use error::{HookFault, WorkerError};
pub use hooks::{FnStep, HookPhase, WorkerHooks};
pub use lifecycle::WorkerState;
pub use pause_gate::PausableWorker;

use context_guard::ContextGuard;
use lifecycle::{Shared, StopWait};
use std::any::Any;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use sync::{relock, Arc, AtomicBool, Mutex};

/// A background worker bound to at most one execution context (thread) at a
/// time. Created once, it can be started and stopped any number of times;
/// each start spawns a fresh thread running the hooks.
///
/// Dropping a running worker stops it and waits for its thread to exit.
pub struct Worker<H: WorkerHooks> {
    shared: Arc<Shared>,
    hooks: Arc<Mutex<H>>,
    stack_size: Option<usize>,
}

impl<F> Worker<FnStep<F>>
where
    F: FnMut(&StepContext<'_>) + Send + 'static,
{
    /// Create a worker whose step is the given closure
    pub fn from_fn(step: F) -> Self {
        Worker::new(FnStep::new(step))
    }
}

impl<H: WorkerHooks> Worker<H> {
    /// Create a stopped worker that will run the given hooks
    pub fn new(hooks: H) -> Self {
        WorkerBuilder::new().build(hooks)
    }

    pub(crate) fn with_config(
        hooks: H,
        name: Option<String>,
        stack_size: Option<usize>,
    ) -> Self {
        Worker {
            shared: Arc::new(Shared::new(name)),
            hooks: Arc::new(Mutex::new(hooks)),
            stack_size,
        }
    }

    /// Start the worker on a new thread. If the worker already has a thread
    /// (running, starting up or still stopping) this does nothing.
    ///
    /// The only error is a failure to spawn the thread, in which case the
    /// worker stays stopped.
    pub fn start(&self) -> Result<(), WorkerError> {
        // The reserved slot keeps other starts out while the lock is released
        let (id, cancel) = match self.shared.lock().open_slot() {
            Some(slot) => slot,
            None => return Ok(()),
        };

        let shared = self.shared.clone();
        let hooks = self.hooks.clone();

        let spawned =
            sync::spawn(self.shared.name(), self.stack_size, move || {
                run_context::<H>(&shared, &hooks, id, &cancel)
            });

        match spawned {
            Ok(handle) => {
                // A context that already exited has cleared its slot, and
                // its handle is simply dropped
                self.shared.lock().attach(id, handle);

                tracing::debug!(
                    worker = self.shared.name(),
                    context = id,
                    "worker started"
                );

                Ok(())
            }
            Err(e) => {
                self.shared.abandon(id);

                tracing::warn!(
                    worker = self.shared.name(),
                    error = %e,
                    "failed to spawn worker thread"
                );

                Err(e.into())
            }
        }
    }

    /// Ask the worker to stop. Has no effect if the worker is stopped.
    ///
    /// With `wait` the calling thread blocks until the worker's thread has
    /// run teardown and exited. Waiting is skipped when called from the
    /// worker's own thread.
    pub fn stop(&self, wait: bool) {
        match self.shared.request_stop(wait) {
            StopWait::Nothing => {}
            StopWait::Join(handle) => {
                // A panicked context has already reported its fault
                let _ = handle.join();
            }
            StopWait::Await(id) => self.shared.await_exit(id),
        }
    }

    /// Get the current lifecycle state
    pub fn state(&self) -> WorkerState {
        self.shared.lock().state()
    }

    /// Check to see if the worker is stopped
    pub fn is_stopped(&self) -> bool {
        self.state() == WorkerState::Stopped
    }

    /// The name given to the worker's thread, if any
    pub fn name(&self) -> Option<&str> {
        self.shared.name()
    }

    pub(crate) fn shared(&self) -> &Shared {
        &self.shared
    }
}

impl<H: WorkerHooks> Drop for Worker<H> {
    fn drop(&mut self) {
        self.stop(true);
    }
}

impl<H: WorkerHooks> fmt::Debug for Worker<H> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Worker")
            .field("name", &self.name())
            .field("state", &self.state())
            .finish_non_exhaustive()
    }
}

/// Body of an execution context: setup, step until cancelled, teardown. The
/// context guard resets the lifecycle on every way out of this function.
fn run_context<H: WorkerHooks>(
    shared: &Shared,
    hooks: &Mutex<H>,
    id: u64,
    cancel: &AtomicBool,
) {
    let guard = ContextGuard::enter(shared, id);
    let mut hooks = relock(hooks.lock());
    let ctx = StepContext::new(shared, cancel);

    let mut faults = Vec::new();
    let mut first_panic: Option<Box<dyn Any + Send>> = None;

    let mut record = |phase, payload: Box<dyn Any + Send>| {
        faults.push(HookFault::from_panic(phase, &*payload));
        first_panic.get_or_insert(payload);
    };

    if let Err(payload) =
        panic::catch_unwind(AssertUnwindSafe(|| hooks.setup()))
    {
        record(HookPhase::Setup, payload);
    } else if let Err(payload) = panic::catch_unwind(AssertUnwindSafe(|| {
        while !ctx.is_cancelled() {
            hooks.step(&ctx);
        }
    })) {
        record(HookPhase::Step, payload);
    }

    if let Err(payload) =
        panic::catch_unwind(AssertUnwindSafe(|| hooks.teardown()))
    {
        record(HookPhase::Teardown, payload);
    }

    for fault in &faults {
        tracing::error!(
            worker = shared.name(),
            context = id,
            phase = %fault.phase(),
            "{}",
            fault
        );

        // The observer must not stop the remaining cleanup
        let _ = panic::catch_unwind(AssertUnwindSafe(|| hooks.on_fault(fault)));
    }

    drop(hooks);
    drop(guard);

    if let Some(payload) = first_panic {
        panic::resume_unwind(payload);
    }
}
