//! Core implementation of the reactor-integrated thread pool: a lock-free
//! submission/completion queue pair, a counting semaphore, a worker run
//! loop, and the registry that binds named pools to a reactor's wake-up
//! mechanism.
//!
//! Split out from the facade crate the way `rayon-core` is split out from
//! `rayon`: this crate carries the whole engine and the dependency stack it
//! needs, so the facade can stay a thin, stable re-export surface.

mod config;
mod error;
mod log;
mod queue;
mod reactor;
mod registry;
mod semaphore;
mod task;
mod unwind;
mod worker;

pub use config::{parse_config, parse_directive, ParsedDirective};
pub use error::{AdmissionError, ConfigError, ResourceError};
pub use log::{Event, Logger, ThreadLog};
pub use reactor::{ChannelNotify, ChannelReactor, NotifyCallback, Reactor};
pub use registry::{ConfigRegistry, Pool, PoolConfig, PoolHooks, PoolRegistry, DEFAULT_POOL_NAME};
pub use task::{Task, TaskEvent};
