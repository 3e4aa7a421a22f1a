//! Synchronization primitives used by the worker. Under `cfg(loom)` these come
//! from loom so the lifecycle can be model checked.

#[cfg(loom)]
pub(crate) use loom::sync::{Arc, Condvar, Mutex, MutexGuard};
#[cfg(loom)]
pub(crate) use loom::thread;

#[cfg(not(loom))]
pub(crate) use std::sync::{Arc, Condvar, Mutex, MutexGuard};
#[cfg(not(loom))]
pub(crate) use std::thread;

#[cfg(loom)]
pub(crate) use loom::sync::atomic::AtomicBool;

#[cfg(all(not(loom), feature = "portable_atomic"))]
pub(crate) use portable_atomic::AtomicBool;

#[cfg(all(not(loom), not(feature = "portable_atomic")))]
pub(crate) use std::sync::atomic::AtomicBool;

#[cfg(feature = "web_time")]
pub(crate) use web_time::Instant;

#[cfg(not(feature = "web_time"))]
pub(crate) use std::time::Instant;

use std::sync::{LockResult, PoisonError};

/// Lifecycle data is only mutated in short sections that never call user
/// code, so a poisoned lock still holds consistent data.
pub(crate) fn relock<G>(result: LockResult<G>) -> G {
    result.unwrap_or_else(PoisonError::into_inner)
}

#[cfg(not(loom))]
pub(crate) fn spawn<F>(
    name: Option<&str>,
    stack_size: Option<usize>,
    f: F,
) -> std::io::Result<thread::JoinHandle<()>>
where
    F: FnOnce() + Send + 'static,
{
    let mut builder = thread::Builder::new();
    if let Some(name) = name {
        builder = builder.name(name.to_string());
    }
    if let Some(size) = stack_size {
        builder = builder.stack_size(size);
    }
    builder.spawn(f)
}

#[cfg(loom)]
pub(crate) fn spawn<F>(
    _name: Option<&str>,
    _stack_size: Option<usize>,
    f: F,
) -> std::io::Result<thread::JoinHandle<()>>
where
    F: FnOnce() + Send + 'static,
{
    Ok(thread::spawn(f))
}
