//! The submission queue (MPMC, reactor threads -> workers) and the
//! completion queue (MPSC, workers -> reactor).
//!
//! A raw `first`/`last_p` atomic-pointer intrusive FIFO -- the classic
//! single-producer-appends-a-link, CAS-the-tail design -- is the textbook
//! way to build this, but it only pays for itself when you can't depend on
//! anything else. `crossbeam_queue::SegQueue` gives the same lock-free,
//! segment-chunked MPMC FIFO guarantee (and the same relaxed
//! cross-producer ordering) without hand-rolling the pointer-publication
//! and aliasing concerns that design carries, the way `rayon-core` reaches
//! for `crossbeam-deque`'s `Injector` for its own unordered job-injection
//! queue (`registry.rs`'s `injected_jobs: Injector<JobRef, C>`) instead of
//! writing its own.

use crossbeam_queue::SegQueue;

use crate::task::AnyTask;

/// Producers: reactor threads submitting tasks. Consumers: worker threads.
/// FIFO with respect to a single producer; fairness among consumers is not
/// guaranteed.
pub(crate) struct SubmissionQueue {
    inner: SegQueue<Box<dyn AnyTask + Send>>,
}

impl SubmissionQueue {
    pub(crate) fn new() -> Self {
        SubmissionQueue {
            inner: SegQueue::new(),
        }
    }

    pub(crate) fn push(&self, task: Box<dyn AnyTask + Send>) {
        self.inner.push(task);
    }

    pub(crate) fn pop(&self) -> Option<Box<dyn AnyTask + Send>> {
        self.inner.pop()
    }
}

/// Producers: worker threads, after a handler returns. Consumer: the
/// reactor thread alone, from inside the completion handler.
pub(crate) struct CompletionQueue {
    inner: SegQueue<Box<dyn AnyTask + Send>>,
}

impl CompletionQueue {
    pub(crate) fn new() -> Self {
        CompletionQueue {
            inner: SegQueue::new(),
        }
    }

    pub(crate) fn push(&self, task: Box<dyn AnyTask + Send>) {
        self.inner.push(task);
    }

    pub(crate) fn pop(&self) -> Option<Box<dyn AnyTask + Send>> {
        self.inner.pop()
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }
}
