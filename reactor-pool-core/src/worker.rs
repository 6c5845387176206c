//! The worker run loop. Each worker thread dequeues one task from the
//! submission queue, executes its handler, enqueues it onto the
//! completion queue, and signals the reactor.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;

use crate::log::Event;
use crate::reactor::Reactor;
use crate::registry::PoolInner;
use crate::unwind::{halt_unwinding, AbortIfPanic};

/// Incremented across all workers of all pools in a process, in the
/// spirit of `rayon-core`'s own process-wide `XorShift64Star` seed
/// counter: a private static, no singleton registry required.
static NEXT_THREAD_INDEX: AtomicUsize = AtomicUsize::new(1);

/// Spawns `pool.threads` OS threads, each running [`run_loop`]. Returns
/// immediately; threads are not joined (see DESIGN.md's resolution of the
/// worker-shutdown open question).
pub(crate) fn spawn_workers<R: Reactor>(pool: Arc<PoolInner<R>>) -> std::io::Result<Vec<thread::JoinHandle<()>>> {
    let mut handles = Vec::with_capacity(pool.threads as usize);
    for _ in 0..pool.threads {
        let pool = Arc::clone(&pool);
        let thread_index = NEXT_THREAD_INDEX.fetch_add(1, Ordering::Relaxed);
        let name = format!("reactor-pool-{}-{}", pool.name, thread_index);
        let handle = thread::Builder::new().name(name).spawn(move || run_loop(pool, thread_index))?;
        handles.push(handle);
    }
    Ok(handles)
}

/// The per-thread body. Blocks on the semaphore, dequeues, executes,
/// enqueues the completion, fires the wake-up -- then loops forever.
///
/// A `semaphore.wait()` failure is fatal to this thread alone (it logs
/// and returns), not to the process. This reduces pool capacity rather
/// than aborting -- see DESIGN.md's open-question resolution.
fn run_loop<R: Reactor>(pool: Arc<PoolInner<R>>, thread_index: usize) {
    let log = pool.logger.for_thread(thread_index);
    block_all_signals(&log);

    log.log(|| Event::WorkerStarted {
        pool: log.pool_name(),
        worker: thread_index,
    });

    if let Some(ref start) = pool.hooks.start {
        let pool_name = log.pool_name().to_owned();
        if halt_unwinding(|| start(&pool_name, thread_index)).is_err() {
            log.log(|| Event::HookPanicked {
                pool: log.pool_name(),
                worker: thread_index,
                hook: "start",
            });
        }
    }

    loop {
        if let Err(_err) = pool.semaphore.wait() {
            log.log(|| Event::WorkerTerminated {
                pool: log.pool_name(),
                worker: thread_index,
                reason: "semaphore wait failed",
            });
            break;
        }

        let task = match dequeue(&pool) {
            Some(task) => task,
            None => {
                // The semaphore said a task exists but the registry was
                // torn down from under us (or the process is exiting).
                // Nothing sane to do but stop.
                log.log(|| Event::WorkerTerminated {
                    pool: log.pool_name(),
                    worker: thread_index,
                    reason: "submission queue unexpectedly empty",
                });
                break;
            }
        };

        let task_id = task.id();
        log.log(|| Event::TaskDequeued {
            pool: log.pool_name(),
            task_id,
            worker: thread_index,
        });

        // Handler panics are not caught here by design: an uncaught panic
        // means the handler corrupted whatever it was touching, and the
        // only safe response is to abort the process rather than let a
        // worker thread unwind through state other threads depend on.
        let abort_guard = AbortIfPanic;
        task.execute(&log);
        std::mem::forget(abort_guard);

        log.log(|| Event::TaskCompleted {
            pool: log.pool_name(),
            task_id,
            worker: thread_index,
        });

        // Publish the handler's writes to `ctx` before the task becomes
        // observable on the completion queue.
        std::sync::atomic::fence(Ordering::Release);

        pool.completion.push(task);

        if let Some(notify) = pool.notify.get() {
            pool.reactor.signal_notify(notify);
        }
    }

    if let Some(ref exit) = pool.hooks.exit {
        let pool_name = log.pool_name().to_owned();
        if halt_unwinding(|| exit(&pool_name, thread_index)).is_err() {
            log.log(|| Event::HookPanicked {
                pool: log.pool_name(),
                worker: thread_index,
                hook: "exit",
            });
        }
    }
}

/// Retries a short bounded spin, then yields. Guards against the
/// transient window where the semaphore count has been posted but the
/// producer's link write hasn't landed yet; a pure spin loop risks
/// livelock on single-core systems, so it backs off to a real yield.
fn dequeue<R: Reactor>(pool: &PoolInner<R>) -> Option<Box<dyn crate::task::AnyTask + Send>> {
    const SPIN_ATTEMPTS: u32 = 64;

    for attempt in 0..SPIN_ATTEMPTS {
        if let Some(task) = pool.submission.pop() {
            return Some(task);
        }
        if attempt >= 8 {
            thread::yield_now();
        } else {
            std::hint::spin_loop();
        }
    }

    // One last attempt after yielding repeatedly; beyond this point we
    // assume the registry is shutting down.
    pool.submission.pop()
}

#[cfg(unix)]
fn block_all_signals(log: &crate::log::ThreadLog) {
    unsafe {
        let mut set: libc::sigset_t = std::mem::zeroed();
        libc::sigfillset(&mut set);
        let err = libc::pthread_sigmask(libc::SIG_BLOCK, &set, std::ptr::null_mut());
        if err != 0 {
            log.log(|| Event::WorkerTerminated {
                pool: log.pool_name(),
                worker: log.thread_index(),
                reason: "pthread_sigmask() failed",
            });
        }
    }
}

#[cfg(not(unix))]
fn block_all_signals(_log: &crate::log::ThreadLog) {
    // Signal masking is a POSIX-specific integration requirement.
    // Platforms without a signal model have nothing to do here; the
    // contract ("signal handlers run only on the reactor thread") is
    // vacuously true.
}
