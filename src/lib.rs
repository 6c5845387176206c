//! Reactor-integrated worker thread pool for offloading blocking work.
//!
//! This crate is a thin facade over [`reactor_pool_core`], the same split
//! `rayon` uses over `rayon-core`: the facade stays small and stable while
//! the engine underneath can gain internals without breaking downstream
//! version pins.
//!
//! ```no_run
//! use reactor_pool::{ChannelReactor, ConfigRegistry, PoolRegistry, Task};
//!
//! let mut config = ConfigRegistry::new();
//! config.declare("io", 4, None, ("example.conf".to_owned(), 1))?;
//! let pools = config.finalize()?;
//!
//! let registry = PoolRegistry::start(pools, ChannelReactor::new())?;
//! let pool = registry.pool_get("io").expect("just declared");
//!
//! let task = Task::new(
//!     0u32,
//!     |ctx: &mut u32, _log| *ctx += 1,
//!     |_event, ctx: &mut u32| assert_eq!(*ctx, 1),
//! );
//! pool.task_post(&task).expect("queue has room");
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub use reactor_pool_core::{
    parse_config, parse_directive, AdmissionError, ChannelNotify, ChannelReactor, ConfigError,
    ConfigRegistry, Event, Logger, NotifyCallback, ParsedDirective, Pool, PoolConfig, PoolHooks,
    PoolRegistry, Reactor, ResourceError, Task, TaskEvent, ThreadLog, DEFAULT_POOL_NAME,
};
