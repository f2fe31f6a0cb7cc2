//! Fixed-size pool of store handles
//!
//! Handles are created once and only ever move between the idle list and
//! the caller holding a `PooledHandle`. Dropping the guard returns the
//! handle, whatever the outcome of the operation it was used for.

use parking_lot::{Condvar, Mutex};
use std::ops::{Deref, DerefMut};
use std::time::{Duration, Instant};
use thiserror::Error;

/// No handle became free within the acquire timeout
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("no pooled connection available after {0:?}")]
pub struct PoolTimeout(pub Duration);

/// Bounded pool with blocking, time-limited checkout
pub struct ConnectionPool<S> {
    idle: Mutex<Vec<S>>,
    available: Condvar,
    size: usize,
}

impl<S> ConnectionPool<S> {
    /// Create a pool owning `handles`; its membership never changes afterwards
    pub fn new(handles: Vec<S>) -> Self {
        let size = handles.len();
        Self {
            idle: Mutex::new(handles),
            available: Condvar::new(),
            size,
        }
    }

    /// Total number of handles
    pub fn size(&self) -> usize {
        self.size
    }

    /// Handles currently checked in
    pub fn idle(&self) -> usize {
        self.idle.lock().len()
    }

    /// Check out a handle, waiting at most `timeout` for one to be released
    pub fn acquire(&self, timeout: Duration) -> Result<PooledHandle<'_, S>, PoolTimeout> {
        let deadline = Instant::now() + timeout;
        let mut idle = self.idle.lock();
        loop {
            if let Some(handle) = idle.pop() {
                return Ok(PooledHandle {
                    pool: self,
                    handle: Some(handle),
                });
            }
            if self.available.wait_until(&mut idle, deadline).timed_out() {
                return match idle.pop() {
                    Some(handle) => Ok(PooledHandle {
                        pool: self,
                        handle: Some(handle),
                    }),
                    None => Err(PoolTimeout(timeout)),
                };
            }
        }
    }

    fn release(&self, handle: S) {
        self.idle.lock().push(handle);
        self.available.notify_one();
    }
}

/// RAII guard returning its handle to the pool on drop
pub struct PooledHandle<'a, S> {
    pool: &'a ConnectionPool<S>,
    handle: Option<S>,
}

impl<S> Deref for PooledHandle<'_, S> {
    type Target = S;

    fn deref(&self) -> &S {
        self.handle.as_ref().expect("handle present until drop")
    }
}

impl<S> DerefMut for PooledHandle<'_, S> {
    fn deref_mut(&mut self) -> &mut S {
        self.handle.as_mut().expect("handle present until drop")
    }
}

impl<S> Drop for PooledHandle<'_, S> {
    fn drop(&mut self) {
        if let Some(handle) = self.handle.take() {
            self.pool.release(handle);
        }
    }
}
