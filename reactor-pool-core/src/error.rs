use std::error::Error;
use std::fmt;

/// Fatal at config-parse / finalize time: duplicate names, missing
/// `threads`, invalid integers, unresolved pool references, or a reactor
/// that cannot support thread pools at all.
#[derive(Debug)]
pub enum ConfigError {
    DuplicatePool {
        name: String,
    },
    MissingThreads {
        name: String,
    },
    InvalidInteger {
        name: String,
        field: &'static str,
        value: String,
    },
    UnresolvedPool {
        name: String,
        file: String,
        line: u32,
    },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::DuplicatePool { name } => {
                write!(f, "duplicate thread pool \"{}\"", name)
            }
            ConfigError::MissingThreads { name } => {
                write!(f, "\"{}\" must have \"threads\" parameter", name)
            }
            ConfigError::InvalidInteger { name, field, value } => write!(
                f,
                "invalid {} value \"{}\" for thread pool \"{}\"",
                field, value, name
            ),
            ConfigError::UnresolvedPool { name, file, line } => write!(
                f,
                "unknown thread pool \"{}\" in {}:{}",
                name, file, line
            ),
        }
    }
}

impl Error for ConfigError {}

/// Fatal at worker process startup: the worker process aborts rather than
/// run with a partially-initialized pool.
#[derive(Debug)]
pub enum ResourceError {
    SemaphoreInit(String),
    ThreadSpawn { pool: String, cause: String },
    NotifyCreate { pool: String },
}

impl fmt::Display for ResourceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResourceError::SemaphoreInit(cause) => {
                write!(f, "semaphore initialization failed: {}", cause)
            }
            ResourceError::ThreadSpawn { pool, cause } => write!(
                f,
                "pthread_create() failed for thread pool \"{}\": {}",
                pool, cause
            ),
            ResourceError::NotifyCreate { pool } => write!(
                f,
                "the configured event method cannot be used with thread pools (pool \"{}\")",
                pool
            ),
        }
    }
}

impl Error for ResourceError {}

/// Recoverable, returned synchronously from `task_post`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdmissionError {
    /// `task.event.active` was already true: the caller tried to
    /// re-submit a task still in flight.
    AlreadyActive { task_id: u64 },
    /// The admission check observed the semaphore count at or above
    /// `max_queue`.
    QueueOverflow { depth: i64 },
    /// The semaphore `post`/`wait` protocol itself failed.
    SemaphoreError,
}

impl fmt::Display for AdmissionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AdmissionError::AlreadyActive { task_id } => {
                write!(f, "task #{} already active", task_id)
            }
            AdmissionError::QueueOverflow { depth } => {
                write!(f, "thread pool queue overflow: {} tasks waiting", depth)
            }
            AdmissionError::SemaphoreError => write!(f, "semaphore operation failed"),
        }
    }
}

impl Error for AdmissionError {}
