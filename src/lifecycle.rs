use crate::sync::{
    relock, thread, Arc, AtomicBool, Condvar, Instant, Mutex, MutexGuard,
};
use std::sync::atomic::Ordering;
use std::time::Duration;

/// Observable lifecycle state of a worker
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WorkerState {
    /// No execution context is running hooks. A context that was just
    /// spawned reports `Stopped` until it takes the lifecycle lock.
    Stopped,
    /// An execution context is running, possibly already asked to stop
    Running,
}

/// Bookkeeping for the single live execution context
#[derive(Debug)]
struct ContextSlot {
    id: u64,
    cancel: Arc<AtomicBool>,
    thread: Option<thread::JoinHandle<()>>,
    thread_id: Option<thread::ThreadId>,
}

#[derive(Debug)]
pub(crate) struct Lifecycle {
    state: WorkerState,
    pause_requested: bool,
    slot: Option<ContextSlot>,
    next_id: u64,
}

impl Lifecycle {
    pub(crate) fn state(&self) -> WorkerState {
        self.state
    }

    pub(crate) fn is_pause_requested(&self) -> bool {
        self.pause_requested
    }

    /// Reserve the context slot for a new context. Returns `None` if a
    /// context already exists (starting, running or stopping).
    pub(crate) fn open_slot(&mut self) -> Option<(u64, Arc<AtomicBool>)> {
        if self.slot.is_some() {
            return None;
        }

        let id = self.next_id;
        self.next_id += 1;
        let cancel = Arc::new(AtomicBool::new(false));

        self.slot = Some(ContextSlot {
            id,
            cancel: cancel.clone(),
            thread: None,
            thread_id: None,
        });

        Some((id, cancel))
    }

    pub(crate) fn attach(&mut self, id: u64, handle: thread::JoinHandle<()>) {
        if let Some(slot) = self.slot.as_mut().filter(|s| s.id == id) {
            slot.thread = Some(handle);
        }
    }

    /// Give up a reserved slot whose thread never started
    pub(crate) fn abandon(&mut self, id: u64) {
        if self.slot.as_ref().map_or(false, |s| s.id == id) {
            self.slot = None;
        }
    }
}

/// What a stop request has to do once the lifecycle lock is released
#[derive(Debug)]
pub(crate) enum StopWait {
    Nothing,
    Join(thread::JoinHandle<()>),
    Await(u64),
}

/// State shared between a worker handle and its execution context: one lock
/// over the lifecycle and one condvar used for pausing, cancellation wake-ups
/// and exit notification.
#[derive(Debug)]
pub(crate) struct Shared {
    name: Option<String>,
    lifecycle: Mutex<Lifecycle>,
    wake: Condvar,
}

impl Shared {
    pub(crate) fn new(name: Option<String>) -> Shared {
        Shared {
            name,
            lifecycle: Mutex::new(Lifecycle {
                state: WorkerState::Stopped,
                pause_requested: false,
                slot: None,
                next_id: 0,
            }),
            wake: Condvar::new(),
        }
    }

    pub(crate) fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub(crate) fn lock(&self) -> MutexGuard<'_, Lifecycle> {
        relock(self.lifecycle.lock())
    }

    fn wait<'a>(
        &self,
        guard: MutexGuard<'a, Lifecycle>,
    ) -> MutexGuard<'a, Lifecycle> {
        relock(self.wake.wait(guard))
    }

    /// Release a reserved slot whose thread could not be spawned, waking
    /// anyone waiting for it to exit
    pub(crate) fn abandon(&self, id: u64) {
        self.lock().abandon(id);
        self.wake.notify_all();
    }

    /// Called first thing on the execution context, possibly before the
    /// starting thread has attached its join handle
    pub(crate) fn mark_running(&self, id: u64) {
        let mut lifecycle = self.lock();

        let lifecycle = &mut *lifecycle;

        if let Some(slot) = lifecycle.slot.as_mut().filter(|s| s.id == id) {
            slot.thread_id = Some(thread::current().id());
            lifecycle.state = WorkerState::Running;
        }
    }

    /// Called last thing on the execution context, on every exit path
    pub(crate) fn mark_stopped(&self, id: u64) {
        let mut lifecycle = self.lock();

        if lifecycle.slot.as_ref().map_or(false, |s| s.id == id) {
            lifecycle.slot = None;
            lifecycle.state = WorkerState::Stopped;
            lifecycle.pause_requested = false;
        }

        self.wake.notify_all();
    }

    /// Signal cancellation to the live context, if any, and work out how the
    /// caller can wait for it. Must only be waited on after the lock is gone.
    pub(crate) fn request_stop(&self, wait: bool) -> StopWait {
        let mut lifecycle = self.lock();

        let slot = match lifecycle.slot.as_mut() {
            Some(slot) => slot,
            None => return StopWait::Nothing,
        };

        slot.cancel.store(true, Ordering::SeqCst);
        self.wake.notify_all();

        tracing::debug!(
            worker = self.name(),
            context = slot.id,
            wait,
            "worker stop requested"
        );

        // A context asking itself to stop must not wait on itself
        let on_context =
            slot.thread_id == Some(thread::current().id());

        if !wait || on_context {
            return StopWait::Nothing;
        }

        match slot.thread.take() {
            Some(handle) => StopWait::Join(handle),
            None => StopWait::Await(slot.id),
        }
    }

    /// Block until the context with the given id has cleared its slot
    pub(crate) fn await_exit(&self, id: u64) {
        let mut lifecycle = self.lock();

        while lifecycle.slot.as_ref().map_or(false, |s| s.id == id) {
            lifecycle = self.wait(lifecycle);
        }
    }

    /// Returns false if the worker was not running or already paused
    pub(crate) fn request_pause(&self) -> bool {
        let mut lifecycle = self.lock();

        if lifecycle.state != WorkerState::Running || lifecycle.pause_requested
        {
            return false;
        }

        lifecycle.pause_requested = true;
        true
    }

    /// Returns false if no pause was requested
    pub(crate) fn request_resume(&self) -> bool {
        let mut lifecycle = self.lock();
        let was_paused = lifecycle.pause_requested;

        lifecycle.pause_requested = false;
        self.wake.notify_all();

        was_paused
    }

    /// Park the calling context while a pause is requested. Returns whether
    /// the context actually parked.
    pub(crate) fn park_while_paused(&self, cancel: &AtomicBool) -> bool {
        let mut lifecycle = self.lock();
        let mut parked = false;

        while lifecycle.pause_requested && !cancel.load(Ordering::SeqCst) {
            parked = true;
            lifecycle = self.wait(lifecycle);
        }

        parked
    }

    /// Wait up to `duration`, waking early on cancellation. Returns true if
    /// the full duration elapsed. A duration past the end of the clock waits
    /// for cancellation only.
    pub(crate) fn sleep(
        &self,
        cancel: &AtomicBool,
        duration: Duration,
    ) -> bool {
        let deadline = Instant::now().checked_add(duration);
        let mut lifecycle = self.lock();

        loop {
            if cancel.load(Ordering::SeqCst) {
                return false;
            }

            let deadline = match deadline {
                Some(deadline) => deadline,
                None => {
                    lifecycle = self.wait(lifecycle);
                    continue;
                }
            };

            let now = Instant::now();

            if now >= deadline {
                return true;
            }

            lifecycle = match self.wake.wait_timeout(lifecycle, deadline - now)
            {
                Ok((guard, _)) => guard,
                Err(poisoned) => poisoned.into_inner().0,
            };
        }
    }
}

#[cfg(all(test, not(loom)))]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_slot_is_exclusive() {
        let shared = Shared::new(None);

        let (first, _) = shared.lock().open_slot().unwrap();
        assert!(shared.lock().open_slot().is_none());

        shared.lock().abandon(first);
        let (second, _) = shared.lock().open_slot().unwrap();
        assert_ne!(first, second);
    }

    #[test]
    fn test_stop_path_clears_pause() {
        let shared = Shared::new(None);
        assert!(!shared.request_pause());

        let (id, _) = shared.lock().open_slot().unwrap();
        shared.mark_running(id);
        assert_eq!(shared.lock().state(), WorkerState::Running);

        assert!(shared.request_pause());
        assert!(!shared.request_pause());
        assert!(shared.lock().is_pause_requested());

        shared.mark_stopped(id);
        let lifecycle = shared.lock();
        assert_eq!(lifecycle.state(), WorkerState::Stopped);
        assert!(!lifecycle.is_pause_requested());
    }

    #[test]
    fn test_stale_context_cannot_clear_new_one() {
        let shared = Shared::new(None);

        let (old, _) = shared.lock().open_slot().unwrap();
        shared.lock().abandon(old);
        let (new, _) = shared.lock().open_slot().unwrap();
        shared.mark_running(new);

        shared.mark_stopped(old);
        assert_eq!(shared.lock().state(), WorkerState::Running);
    }

    #[test]
    fn test_request_stop_sets_cancel() {
        let shared = Shared::new(None);
        assert!(matches!(shared.request_stop(true), StopWait::Nothing));

        let (id, cancel) = shared.lock().open_slot().unwrap();
        assert!(matches!(
            shared.request_stop(true),
            StopWait::Await(i) if i == id
        ));
        assert!(cancel.load(Ordering::SeqCst));
    }

    #[test]
    fn test_sleep_wakes_on_cancel() {
        let shared = Arc::new(Shared::new(None));
        let (_, cancel) = shared.lock().open_slot().unwrap();

        assert!(shared.sleep(&cancel, Duration::from_millis(5)));

        let shared_clone = shared.clone();
        let stopper = std::thread::spawn(move || {
            std::thread::sleep(Duration::from_millis(20));
            shared_clone.request_stop(false);
        });

        let begin = Instant::now();
        assert!(!shared.sleep(&cancel, Duration::from_secs(30)));
        assert!(begin.elapsed() < Duration::from_secs(10));

        stopper.join().unwrap();
    }

    #[test]
    fn test_unbounded_sleep_waits_for_cancel() {
        let shared = Arc::new(Shared::new(None));
        let (_, cancel) = shared.lock().open_slot().unwrap();

        let shared_clone = shared.clone();
        let stopper = std::thread::spawn(move || {
            std::thread::sleep(Duration::from_millis(20));
            shared_clone.request_stop(false);
        });

        assert!(!shared.sleep(&cancel, Duration::MAX));
        stopper.join().unwrap();
    }

    #[test]
    fn test_park_returns_on_resume() {
        let shared = Arc::new(Shared::new(None));
        let (id, cancel) = shared.lock().open_slot().unwrap();
        shared.mark_running(id);

        assert!(!shared.park_while_paused(&cancel));

        assert!(shared.request_pause());
        let shared_clone = shared.clone();
        let resumer = std::thread::spawn(move || {
            std::thread::sleep(Duration::from_millis(20));
            assert!(shared_clone.request_resume());
        });

        assert!(shared.park_while_paused(&cancel));
        resumer.join().unwrap();
    }
}

#[cfg(all(test, loom))]
mod loom_tests {
    use super::*;

    #[test]
    fn loom_only_one_slot_is_opened() {
        loom::model(|| {
            let shared = Arc::new(Shared::new(None));

            let handles: Vec<_> = (0..2)
                .map(|_| {
                    let shared = shared.clone();
                    thread::spawn(move || shared.lock().open_slot().is_some())
                })
                .collect();

            let opened = handles
                .into_iter()
                .map(|h| h.join().unwrap())
                .filter(|opened| *opened)
                .count();

            assert_eq!(opened, 1);
        });
    }

    #[test]
    fn loom_cancel_wakes_parked_context() {
        loom::model(|| {
            let shared = Arc::new(Shared::new(None));
            let (id, cancel) = shared.lock().open_slot().unwrap();
            shared.mark_running(id);
            assert!(shared.request_pause());

            let shared_clone = shared.clone();
            let context = thread::spawn(move || {
                shared_clone.park_while_paused(&cancel);
                shared_clone.mark_stopped(id);
            });

            shared.request_stop(false);
            context.join().unwrap();

            let lifecycle = shared.lock();
            assert_eq!(lifecycle.state(), WorkerState::Stopped);
            assert!(!lifecycle.is_pause_requested());
        });
    }

    #[test]
    fn loom_waiter_sees_exit() {
        loom::model(|| {
            let shared = Arc::new(Shared::new(None));
            let (id, _) = shared.lock().open_slot().unwrap();
            shared.mark_running(id);

            let shared_clone = shared.clone();
            let context = thread::spawn(move || shared_clone.mark_stopped(id));

            shared.await_exit(id);
            assert_eq!(shared.lock().state(), WorkerState::Stopped);

            context.join().unwrap();
        });
    }
}
