//! `Task`, its embedded `event`, and the ownership contract around `ctx`.
//!
//! `ctx` is shared between the submitting thread (before submission), the
//! worker (during execution), and the reactor (after completion), and the
//! caller is allowed to re-submit the same task once it is no longer
//! active. That rules out a `Box<Task<C>>` moved permanently into the
//! queue: the caller needs to keep a live handle to read back `ctx` and to
//! attempt a re-submission. `Task<C>` is therefore a cheap `Arc`-backed
//! handle, cloned once into the submission queue and once more kept by
//! the caller -- the same shape `rayon-core::job::JobRef` gives a job (a
//! handle usable from more than one place at a time, with the exclusivity
//! contract enforced by protocol rather than by the borrow checker).

use std::cell::UnsafeCell;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use crate::log::ThreadLog;

/// The embedded completion record, `event`. `active` is true from the
/// instant submission succeeds until the reactor is about to invoke
/// `completion`; `complete` is true only after that invocation.
#[derive(Debug, Clone, Copy, Default)]
pub struct TaskEvent {
    pub active: bool,
    pub complete: bool,
}

/// Object-safe, `C`-erased view of a task, used so the lock-free queues
/// can hold tasks of heterogeneous context types in one `SegQueue`.
///
/// Not part of the public API: callers only ever see `Task<C>`.
pub(crate) trait AnyTask: Send {
    fn id(&self) -> u64;
    fn set_id(&self, id: u64);
    fn event(&self) -> TaskEvent;
    fn mark_active(&self);
    /// Runs `handler(ctx, log)` on a worker thread.
    fn execute(&self, log: &ThreadLog);
    /// Sets `complete`/`active` and invokes the completion callback on the
    /// reactor thread.
    fn deliver(&self);
}

struct TaskInner<C: Send> {
    id: AtomicU64,
    ctx: UnsafeCell<C>,
    handler: UnsafeCell<Box<dyn FnMut(&mut C, &ThreadLog) + Send>>,
    completion: UnsafeCell<Box<dyn FnMut(&TaskEvent, &mut C) + Send>>,
    active: AtomicBool,
    complete: AtomicBool,
}

// SAFETY: `ctx`, `handler`, and `completion` are never touched from two
// places at once even though `Task<C>` is cloned and shared across
// threads. The protocol that guarantees this: the submitting thread
// writes `ctx` only before `task_post` succeeds, the worker touches it
// only between dequeue and the release fence after `execute`, and the
// reactor touches it only inside `deliver`, after the acquire implied by
// draining the completion queue. `active`/`complete` exist precisely so
// this window never overlaps; violating that contract (re-entering
// `execute` while already active) is a caller bug.
unsafe impl<C: Send> Sync for TaskInner<C> {}

/// A unit of deferred work: a caller-owned context `ctx`, a blocking
/// `handler` that runs on a worker thread, and a `completion` callback
/// that runs on the reactor thread once the handler returns.
///
/// Cheap to clone -- an `Arc` underneath -- so the caller can keep a
/// handle across submission, inspect `ctx`/`event` after completion, and
/// attempt a later re-submission once `event().active` is false again.
pub struct Task<C: Send> {
    inner: Arc<TaskInner<C>>,
}

impl<C: Send> Clone for Task<C> {
    fn clone(&self) -> Self {
        Task {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<C: Send + 'static> Task<C> {
    /// Builds a task around a caller-owned `ctx`. `handler` must be the
    /// part of the work that's safe to run on a worker thread (it must
    /// not touch reactor-owned state); `completion` runs on the reactor
    /// thread and must not block.
    pub fn new<H, E>(ctx: C, handler: H, completion: E) -> Task<C>
    where
        H: FnMut(&mut C, &ThreadLog) + Send + 'static,
        E: FnMut(&TaskEvent, &mut C) + Send + 'static,
    {
        Task {
            inner: Arc::new(TaskInner {
                id: AtomicU64::new(0),
                ctx: UnsafeCell::new(ctx),
                handler: UnsafeCell::new(Box::new(handler)),
                completion: UnsafeCell::new(Box::new(completion)),
                active: AtomicBool::new(false),
                complete: AtomicBool::new(false),
            }),
        }
    }

    /// The pool-scoped, monotonically increasing identifier assigned at
    /// submission. Zero before first submission.
    pub fn id(&self) -> u64 {
        self.inner.id.load(Ordering::Acquire)
    }

    /// Reads the current `ctx`. Only meaningful when `event().active` is
    /// false -- i.e. before submission or after the completion callback
    /// has returned.
    pub fn with_ctx<R>(&self, read: impl FnOnce(&C) -> R) -> R {
        // SAFETY: see `TaskInner`'s `Sync` impl: callers are expected to
        // only call this outside the active window.
        read(unsafe { &*self.inner.ctx.get() })
    }

    pub fn event(&self) -> TaskEvent {
        TaskEvent {
            active: self.inner.active.load(Ordering::Acquire),
            complete: self.inner.complete.load(Ordering::Acquire),
        }
    }
}

impl<C: Send> AnyTask for Task<C> {
    fn id(&self) -> u64 {
        self.inner.id.load(Ordering::Acquire)
    }

    fn set_id(&self, id: u64) {
        self.inner.id.store(id, Ordering::Release);
    }

    fn event(&self) -> TaskEvent {
        TaskEvent {
            active: self.inner.active.load(Ordering::Acquire),
            complete: self.inner.complete.load(Ordering::Acquire),
        }
    }

    fn mark_active(&self) {
        self.inner.active.store(true, Ordering::Release);
        self.inner.complete.store(false, Ordering::Release);
    }

    fn execute(&self, log: &ThreadLog) {
        // SAFETY: exclusive access guaranteed by `active` (see above).
        unsafe {
            let ctx = &mut *self.inner.ctx.get();
            let handler = &mut *self.inner.handler.get();
            handler(ctx, log);
        }
    }

    fn deliver(&self) {
        let event = TaskEvent {
            active: false,
            complete: true,
        };
        self.inner.complete.store(true, Ordering::Release);
        self.inner.active.store(false, Ordering::Release);
        // SAFETY: exclusive access guaranteed by `active`/`complete` (see
        // above) -- the worker that ran `execute` has already released
        // the task back via the completion queue's happens-before edge.
        unsafe {
            let ctx = &mut *self.inner.ctx.get();
            let completion = &mut *self.inner.completion.get();
            completion(&event, ctx);
        }
    }
}
