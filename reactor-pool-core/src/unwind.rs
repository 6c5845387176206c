//! Panic containment for the small number of user callbacks the pool
//! invokes outside of a task handler (the `PoolHooks` start/exit
//! lifecycle hooks from `registry.rs`).
//!
//! Mirrors `rayon_core::unwind`, referenced throughout
//! `rayon-core/src/registry.rs` as `unwind::AbortIfPanic` and
//! `unwind::halt_unwinding` around its own `start_handler`/`exit_handler`.
//! Task handlers and completion callbacks are explicitly *not* run
//! through this: handler panics are not caught anywhere in this crate,
//! by design -- a panicking handler corrupts whatever it was touching,
//! and the only safe response is to abort.

use std::panic::{self, AssertUnwindSafe};
use std::thread::Result;

/// Aborts the process on drop unless [`std::mem::forget`]-ed first.
///
/// Used as a guard around code that must not unwind: if it does anyway
/// (because something we called panicked without us catching it), we
/// abort rather than let a worker thread unwind through state that other
/// threads depend on being consistent.
pub struct AbortIfPanic;

impl Drop for AbortIfPanic {
    fn drop(&mut self) {
        eprintln!("reactor-pool: internal panic, aborting process");
        std::process::abort();
    }
}

/// Catches a panic from `func`, returning it as an `Err` instead of
/// unwinding further. Used for user-supplied start/exit handlers so that a
/// panicking callback doesn't take the whole worker thread down with it.
pub fn halt_unwinding<F, R>(func: F) -> Result<R>
where
    F: FnOnce() -> R,
{
    panic::catch_unwind(AssertUnwindSafe(func))
}
