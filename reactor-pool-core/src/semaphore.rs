//! The counting semaphore that blocks workers when the submission queue is
//! empty and backs the admission check on submission.
//!
//! Built directly on `Mutex`/`Condvar` rather than a dedicated semaphore
//! crate, the same way `rayon-core::latch` builds `LockLatch`/`CountLatch`/
//! `SpinLatch` straight from the standard library's own primitives.

use std::sync::{Condvar, Mutex};

/// A standard counting semaphore, safe under concurrent `post`/`wait` from
/// any number of threads.
pub struct Semaphore {
    count: Mutex<i64>,
    condvar: Condvar,
}

impl Semaphore {
    pub fn new() -> Self {
        Semaphore {
            count: Mutex::new(0),
            condvar: Condvar::new(),
        }
    }

    /// Blocks until the count is greater than zero, then decrements it.
    ///
    /// Only fails if the internal mutex is poisoned, treated as a
    /// programming error fatal to the calling worker thread.
    pub fn wait(&self) -> Result<(), SemaphoreError> {
        let mut count = self.count.lock().map_err(|_| SemaphoreError)?;
        while *count <= 0 {
            count = self.condvar.wait(count).map_err(|_| SemaphoreError)?;
        }
        *count -= 1;
        Ok(())
    }

    /// Increments the count and wakes exactly one waiter.
    pub fn post(&self) -> Result<(), SemaphoreError> {
        let mut count = self.count.lock().map_err(|_| SemaphoreError)?;
        *count += 1;
        self.condvar.notify_one();
        Ok(())
    }

    /// Observes the current count without modifying it.
    pub fn get_value(&self) -> Result<i64, SemaphoreError> {
        let count = self.count.lock().map_err(|_| SemaphoreError)?;
        Ok(*count)
    }

    /// The admission check performed before linking a task into the
    /// submission queue: fails (soft, racy-by-design) if the observed
    /// count is already at or above `max_queue`. Does not modify the
    /// count -- the actual increment happens in the matching `post()`
    /// after the task is linked in.
    pub fn try_admit(&self, max_queue: u32) -> Result<(), SemaphoreError> {
        let depth = self.get_value()?;
        if depth >= max_queue as i64 {
            return Err(SemaphoreError);
        }
        Ok(())
    }
}

impl Default for Semaphore {
    fn default() -> Self {
        Self::new()
    }
}

/// The semaphore's own internal mutex was poisoned by a panicking holder.
/// Recoverable at the submission call site (returned as
/// `AdmissionError::SemaphoreError`) but fatal to a worker thread's run
/// loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SemaphoreError;

impl std::fmt::Display for SemaphoreError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "semaphore operation failed (lock poisoned)")
    }
}

impl std::error::Error for SemaphoreError {}
