//! The pool registry and its config-time / finalize-time /
//! worker-startup-time phases, plus the `Pool` handle that realizes the
//! public API surface (`pool_add`/`pool_get`/`task_post`).
//!
//! Structured after `rayon_core::registry::Registry`: an `Arc`-shared inner
//! struct, one constructor that does all the expensive setup up front and
//! tears everything down on failure, and a thin public handle wrapping the
//! `Arc`. Generalized from "one registry, one thread pool" to "one
//! registry, many named pools."

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, OnceLock};

use crate::error::{AdmissionError, ConfigError, ResourceError};
use crate::log::{Event, Logger};
use crate::queue::{CompletionQueue, SubmissionQueue};
use crate::reactor::{CompletionHandler, Reactor};
use crate::semaphore::Semaphore;
use crate::task::{AnyTask, Task};
use crate::worker;

pub const DEFAULT_POOL_NAME: &str = "default";
const DEFAULT_THREADS: u32 = 32;
const DEFAULT_MAX_QUEUE: u32 = 65536;

/// Worker-process lifecycle hooks for one pool: invoked on the worker
/// thread itself, once at the top and once at the bottom of its run loop.
/// Optional -- a pool with no hooks registered runs its loop with no
/// extra steps.
///
/// A panicking hook is caught with [`crate::unwind::halt_unwinding`] and
/// logged rather than allowed to bring the worker thread down, the same
/// way `rayon-core::registry::Registry` shields its own
/// `start_handler`/`exit_handler` from a panicking user callback.
#[derive(Clone, Default)]
pub struct PoolHooks {
    pub start: Option<Arc<dyn Fn(&str, usize) + Send + Sync>>,
    pub exit: Option<Arc<dyn Fn(&str, usize) + Send + Sync>>,
}

impl PoolHooks {
    pub fn new() -> Self {
        PoolHooks::default()
    }

    pub fn with_start(mut self, f: impl Fn(&str, usize) + Send + Sync + 'static) -> Self {
        self.start = Some(Arc::new(f));
        self
    }

    pub fn with_exit(mut self, f: impl Fn(&str, usize) + Send + Sync + 'static) -> Self {
        self.exit = Some(Arc::new(f));
        self
    }
}

/// One `thread_pool` declaration, config-time or lazily-referenced.
/// `threads.is_none()` means the pool has been referenced (via
/// [`ConfigRegistry::pool_add`]) but never explicitly declared with a
/// `thread_pool` directive -- resolved at [`ConfigRegistry::finalize`].
#[derive(Debug, Clone)]
pub struct PoolConfig {
    pub name: String,
    pub threads: Option<u32>,
    pub max_queue: u32,
    /// Source file/line of the first reference to this name, used for the
    /// "unknown thread pool" diagnostic at finalize time.
    pub declared_at: (String, u32),
}

/// Config-time collection of pool descriptors. A subsystem may reference
/// a pool name before any `thread_pool` directive declares it; the
/// reference creates a placeholder that the directive (or the
/// default-pool fallback) fills in later.
#[derive(Debug, Default)]
pub struct ConfigRegistry {
    pools: Vec<PoolConfig>,
}

impl ConfigRegistry {
    pub fn new() -> Self {
        ConfigRegistry { pools: Vec::new() }
    }

    /// Returns the existing descriptor for `name` (default `"default"`),
    /// creating an unresolved placeholder if this is the first reference.
    /// Safe to call before any `thread_pool` directive for this name has
    /// been parsed.
    pub fn pool_add(&mut self, name: Option<&str>, site: (String, u32)) -> usize {
        let name = name.unwrap_or(DEFAULT_POOL_NAME).to_string();
        if let Some(idx) = self.pools.iter().position(|p| p.name == name) {
            return idx;
        }
        self.pools.push(PoolConfig {
            name,
            threads: None,
            max_queue: DEFAULT_MAX_QUEUE,
            declared_at: site,
        });
        self.pools.len() - 1
    }

    pub fn pool_by_name(&self, name: &str) -> Option<&PoolConfig> {
        self.pools.iter().find(|p| p.name == name)
    }

    /// Binds an explicit `thread_pool <name> threads=<N> [max_queue=<M>];`
    /// declaration. `threads` must already be validated non-zero by the
    /// caller (see `config.rs`); a second declaration of the same name is
    /// rejected.
    pub fn declare(
        &mut self,
        name: &str,
        threads: u32,
        max_queue: Option<u32>,
        site: (String, u32),
    ) -> Result<(), ConfigError> {
        let idx = self.pool_add(Some(name), site);
        let entry = &mut self.pools[idx];
        if entry.threads.is_some() {
            return Err(ConfigError::DuplicatePool {
                name: name.to_owned(),
            });
        }
        entry.threads = Some(threads);
        entry.max_queue = max_queue.unwrap_or(DEFAULT_MAX_QUEUE);
        Ok(())
    }

    /// Default-fills `"default"` if referenced but never declared;
    /// everything else unresolved is a fatal diagnostic naming the
    /// referencing source location.
    pub fn finalize(self) -> Result<Vec<PoolConfig>, ConfigError> {
        let mut pools = self.pools;
        for pool in &mut pools {
            if pool.threads.is_some() {
                continue;
            }
            if pool.name == DEFAULT_POOL_NAME {
                pool.threads = Some(DEFAULT_THREADS);
                pool.max_queue = DEFAULT_MAX_QUEUE;
                continue;
            }
            return Err(ConfigError::UnresolvedPool {
                name: pool.name.clone(),
                file: pool.declared_at.0.clone(),
                line: pool.declared_at.1,
            });
        }
        Ok(pools)
    }
}

/// Everything a pool owns: a named set of workers sharing one semaphore,
/// one submission queue, one completion queue, and one wake-up source.
pub(crate) struct PoolInner<R: Reactor> {
    pub(crate) name: String,
    pub(crate) threads: u32,
    pub(crate) max_queue: u32,
    pub(crate) semaphore: Semaphore,
    pub(crate) submission: SubmissionQueue,
    pub(crate) completion: Arc<CompletionQueue>,
    pub(crate) notify: Arc<OnceLock<R::Notify>>,
    pub(crate) reactor: Arc<R>,
    next_id: AtomicU64,
    pub(crate) logger: Logger,
    pub(crate) hooks: PoolHooks,
}

/// A live, named pool. Cheap to clone (an `Arc` underneath), the way a
/// `rayon::ThreadPool` handle is.
pub struct Pool<R: Reactor> {
    inner: Arc<PoolInner<R>>,
}

impl<R: Reactor> Clone for Pool<R> {
    fn clone(&self) -> Self {
        Pool {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<R: Reactor> Pool<R> {
    pub fn name(&self) -> &str {
        &self.inner.name
    }

    pub fn threads(&self) -> u32 {
        self.inner.threads
    }

    pub fn max_queue(&self) -> u32 {
        self.inner.max_queue
    }

    /// Approximates queue occupancy -- an advisory admission signal. Not
    /// load-bearing for correctness, only for diagnostics.
    pub fn queue_depth(&self) -> i64 {
        self.inner.semaphore.get_value().unwrap_or(0)
    }

    /// Performs the admission check, assigns `id`, links the task into
    /// the submission queue, and wakes a worker.
    ///
    /// Takes `task` by shared reference: `Task<C>` is already a cheap
    /// `Arc` handle, and the caller keeps their own copy regardless of
    /// whether this call succeeds.
    pub fn task_post<C: Send + 'static>(&self, task: &Task<C>) -> Result<(), AdmissionError> {
        if task.event().active {
            return Err(AdmissionError::AlreadyActive { task_id: task.id() });
        }

        if self.inner.semaphore.try_admit(self.inner.max_queue).is_err() {
            let depth = self.inner.semaphore.get_value().unwrap_or(self.inner.max_queue as i64);
            let pool = self.inner.name.clone();
            self.inner.logger.log(|| Event::QueueOverflow { pool: &pool, depth });
            return Err(AdmissionError::QueueOverflow { depth });
        }

        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed) + 1;
        task.set_id(id);
        task.mark_active();

        let pool = self.inner.name.clone();
        self.inner.logger.log(|| Event::TaskSubmitted { pool: &pool, task_id: id });

        let any_task: Box<dyn AnyTask + Send> = Box::new(task.clone());
        self.inner.submission.push(any_task);

        if self.inner.semaphore.post().is_err() {
            return Err(AdmissionError::SemaphoreError);
        }

        Ok(())
    }
}

/// The runtime registry: the result of [`ConfigRegistry::finalize`]
/// materialized into live pools, one per worker process. Worker threads
/// are spawned as part of construction; they are not joined on drop (see
/// DESIGN.md).
pub struct PoolRegistry<R: Reactor> {
    pools: HashMap<String, Pool<R>>,
    reactor: Arc<R>,
    // Kept so the registry owns the thread handles even though it never
    // joins them; dropping a `JoinHandle` without joining is fine in Rust
    // (the thread simply detaches), unlike an explicit pthread_join.
    _worker_threads: Vec<std::thread::JoinHandle<()>>,
}

impl<R: Reactor> PoolRegistry<R> {
    /// Spins up every pool named in `configs`: initializes its semaphore,
    /// registers a wake-up source with `reactor`, and spawns its worker
    /// threads. Fails fatally if any pool can't be initialized -- the
    /// worker process should abort rather than run with a partially
    /// initialized pool, so no partially-started registry is returned.
    pub fn start(configs: Vec<PoolConfig>, reactor: R) -> Result<Self, ResourceError> {
        Self::start_with_hooks(configs, reactor, HashMap::new())
    }

    /// Same as [`PoolRegistry::start`], but with per-pool lifecycle hooks
    /// keyed by pool name. A pool name with no entry in `hooks` gets
    /// none.
    pub fn start_with_hooks(
        configs: Vec<PoolConfig>,
        reactor: R,
        mut hooks: HashMap<String, PoolHooks>,
    ) -> Result<Self, ResourceError> {
        let reactor = Arc::new(reactor);
        let mut pools = HashMap::with_capacity(configs.len());
        let mut worker_threads = Vec::new();

        for config in configs {
            let logger = Logger::new(config.name.clone());
            let completion = Arc::new(CompletionQueue::new());
            let notify_slot: Arc<OnceLock<R::Notify>> = Arc::new(OnceLock::new());

            let handler = Arc::new(CompletionHandler::new(
                Arc::clone(&reactor),
                Arc::clone(&notify_slot),
                Arc::clone(&completion),
                logger.clone(),
            ));
            let handler_for_closure = Arc::clone(&handler);
            let on_notify: crate::reactor::NotifyCallback = Arc::new(move || handler_for_closure.drain());

            let notify = reactor
                .create_notify(logger.clone(), on_notify)
                .map_err(|_| ResourceError::NotifyCreate {
                    pool: config.name.clone(),
                })?;
            notify_slot
                .set(notify)
                .unwrap_or_else(|_| panic!("notify slot set twice for pool \"{}\"", config.name));

            let threads = config.threads.expect("finalize() guarantees threads is resolved");
            let pool_hooks = hooks.remove(&config.name).unwrap_or_default();

            let inner = Arc::new(PoolInner {
                name: config.name.clone(),
                threads,
                max_queue: config.max_queue,
                semaphore: Semaphore::new(),
                submission: SubmissionQueue::new(),
                completion,
                notify: notify_slot,
                reactor: Arc::clone(&reactor),
                next_id: AtomicU64::new(0),
                logger,
                hooks: pool_hooks,
            });

            let handles = worker::spawn_workers(Arc::clone(&inner)).map_err(|e| ResourceError::ThreadSpawn {
                pool: config.name.clone(),
                cause: e.to_string(),
            })?;
            worker_threads.extend(handles);

            pools.insert(config.name.clone(), Pool { inner });
        }

        Ok(PoolRegistry {
            pools,
            reactor,
            _worker_threads: worker_threads,
        })
    }

    pub fn pool_get(&self, name: &str) -> Option<Pool<R>> {
        self.pools.get(name).cloned()
    }

    pub fn reactor(&self) -> &R {
        &self.reactor
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reactor::ChannelReactor;
    use std::sync::atomic::AtomicUsize;
    use std::time::Duration;

    #[test]
    fn start_hook_runs_once_per_worker_thread() {
        let mut config = ConfigRegistry::new();
        config
            .declare("hooked", 3, Some(4), ("hooks.conf".to_owned(), 1))
            .unwrap();
        let pools = config.finalize().unwrap();

        let starts = Arc::new(AtomicUsize::new(0));
        let starts_for_hook = Arc::clone(&starts);
        let hooks = PoolHooks::new().with_start(move |pool, _worker| {
            assert_eq!(pool, "hooked");
            starts_for_hook.fetch_add(1, Ordering::SeqCst);
        });

        let mut hook_map = HashMap::new();
        hook_map.insert("hooked".to_owned(), hooks);

        let _registry = PoolRegistry::start_with_hooks(pools, ChannelReactor::new(), hook_map).unwrap();

        std::thread::sleep(Duration::from_millis(100));
        assert_eq!(starts.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn pool_with_no_hooks_starts_normally() {
        let mut config = ConfigRegistry::new();
        config
            .declare("plain", 1, None, ("plain.conf".to_owned(), 1))
            .unwrap();
        let pools = config.finalize().unwrap();

        let registry = PoolRegistry::start(pools, ChannelReactor::new()).unwrap();
        assert!(registry.pool_get("plain").is_some());
    }

    /// A reactor whose event method can't support wake-up sources at all --
    /// stands in for, e.g., a `select()`-based reactor that never implemented
    /// one. `create_notify` always fails, so pool startup must fail fatally
    /// rather than run with a pool that can never signal completions.
    struct NoNotifyReactor;

    impl crate::reactor::Reactor for NoNotifyReactor {
        type Notify = ();

        fn create_notify(
            &self,
            _log: Logger,
            _on_notify: crate::reactor::NotifyCallback,
        ) -> Result<Self::Notify, ResourceError> {
            Err(ResourceError::NotifyCreate {
                pool: "unused".to_owned(),
            })
        }

        fn signal_notify(&self, _notify: &Self::Notify) {}

        fn handle_notify(&self, _notify: &Self::Notify) -> bool {
            true
        }
    }

    #[test]
    fn reactor_without_notify_support_fails_pool_startup() {
        let mut config = ConfigRegistry::new();
        config
            .declare("img", 2, None, ("app.conf".to_owned(), 7))
            .unwrap();
        let pools = config.finalize().unwrap();

        let err = PoolRegistry::start(pools, NoNotifyReactor).unwrap_err();
        match &err {
            ResourceError::NotifyCreate { pool } => assert_eq!(pool, "img"),
            other => panic!("expected NotifyCreate, got {:?}", other),
        }
        assert!(err.to_string().contains("cannot be used with thread pools"));
    }
}
