//! Structured, closure-gated event logging.
//!
//! Mirrors the pattern `rayon-core` uses for its own internal instrumentation
//! (`registry.rs` calls `self.log(|| JobsInjected { .. })` throughout): the
//! closure is only invoked -- and the `Event` only built -- when logging is
//! actually enabled, so a disabled `Logger` costs nothing but a branch at
//! every call site.

use std::fmt;
use std::sync::Arc;

/// One structured log event. Built lazily inside the closure passed to
/// [`Logger::log`].
pub enum Event<'a> {
    TaskSubmitted { pool: &'a str, task_id: u64 },
    TaskDequeued { pool: &'a str, task_id: u64, worker: usize },
    TaskCompleted { pool: &'a str, task_id: u64, worker: usize },
    TaskDelivered { pool: &'a str, task_id: u64 },
    QueueOverflow { pool: &'a str, depth: i64 },
    WorkerStarted { pool: &'a str, worker: usize },
    WorkerTerminated { pool: &'a str, worker: usize, reason: &'a str },
    NotifyArmFailed { pool: &'a str },
    HookPanicked { pool: &'a str, worker: usize, hook: &'a str },
}

impl fmt::Display for Event<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Event::TaskSubmitted { pool, task_id } => {
                write!(f, "task #{} added to thread pool \"{}\"", task_id, pool)
            }
            Event::TaskDequeued { pool, task_id, worker } => write!(
                f,
                "run task #{} in thread pool \"{}\" (worker {})",
                task_id, pool, worker
            ),
            Event::TaskCompleted { pool, task_id, worker } => write!(
                f,
                "complete task #{} in thread pool \"{}\" (worker {})",
                task_id, pool, worker
            ),
            Event::TaskDelivered { pool, task_id } => write!(
                f,
                "run completion handler for task #{} in thread pool \"{}\"",
                task_id, pool
            ),
            Event::QueueOverflow { pool, depth } => write!(
                f,
                "thread pool \"{}\" queue overflow: {} tasks waiting",
                pool, depth
            ),
            Event::WorkerStarted { pool, worker } => {
                write!(f, "thread {} of thread pool \"{}\" started", worker, pool)
            }
            Event::WorkerTerminated { pool, worker, reason } => write!(
                f,
                "thread {} of thread pool \"{}\" terminated: {}",
                worker, pool, reason
            ),
            Event::NotifyArmFailed { pool } => write!(
                f,
                "failed to re-arm notify handle for thread pool \"{}\"",
                pool
            ),
            Event::HookPanicked { pool, worker, hook } => write!(
                f,
                "{} hook panicked on thread {} of thread pool \"{}\"",
                hook, worker, pool
            ),
        }
    }
}

/// Per-pool logging sink. Cheap to clone (an `Arc<str>` and a bool).
///
/// The pool never owns the actual sink -- logging is an external
/// collaborator. `Logger` just carries the pool's name and an enabled
/// flag through to every call site; swapping `eprintln!` below for a real
/// sink (syslog, journald, a tracing subscriber) is the only change a
/// caller embedding this crate needs to make.
#[derive(Clone)]
pub struct Logger {
    pool_name: Arc<str>,
    enabled: bool,
}

impl Logger {
    pub fn new(pool_name: impl Into<Arc<str>>) -> Self {
        let enabled = std::env::var_os("REACTOR_POOL_LOG").is_some();
        Logger {
            pool_name: pool_name.into(),
            enabled,
        }
    }

    pub fn pool_name(&self) -> &str {
        &self.pool_name
    }

    #[inline]
    pub fn log(&self, event: impl FnOnce() -> Event<'_>) {
        if self.enabled {
            eprintln!("[reactor-pool] {}", event());
        }
    }

    /// Clones this logger and stamps it with a worker-thread index, for use
    /// inside a single worker's run loop.
    pub fn for_thread(&self, thread_index: usize) -> ThreadLog {
        ThreadLog {
            logger: self.clone(),
            thread_index,
        }
    }
}

/// A [`Logger`] stamped with the registry-wide index of the worker thread
/// that owns it. Passed to `task.handler` alongside `ctx` on every
/// invocation.
#[derive(Clone)]
pub struct ThreadLog {
    logger: Logger,
    thread_index: usize,
}

impl ThreadLog {
    pub fn thread_index(&self) -> usize {
        self.thread_index
    }

    pub fn pool_name(&self) -> &str {
        self.logger.pool_name()
    }

    #[inline]
    pub fn log(&self, event: impl FnOnce() -> Event<'_>) {
        self.logger.log(event)
    }
}
