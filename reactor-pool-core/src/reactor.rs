//! The reactor-side half of the contract: the environment coupling
//! (`create_notify` / `signal_notify` / `handle_notify`) and the
//! completion handler that drains the completion queue when the reactor
//! observes a wake-up.
//!
//! The reactor itself -- the epoll/kqueue/IOCP readiness loop -- is out of
//! scope; this module only defines the narrow interface the core depends
//! on, plus a [`ChannelReactor`] reference implementation (backed by
//! `crossbeam_channel`) used by this crate's own tests and as a worked
//! example for anyone wiring a real reactor against the trait.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, OnceLock};
use std::thread;

use crate::error::ResourceError;
use crate::log::Logger;
use crate::queue::CompletionQueue;

/// Callback invoked by the reactor when a wake-up source becomes
/// observable. Registered once, at `create_notify` time.
pub type NotifyCallback = Arc<dyn Fn() + Send + Sync>;

/// The two operations a reactor must provide, plus the registration call
/// that returns a handle for them to act on.
///
/// A reactor whose event method can't support registering a wake-up
/// source should fail `create_notify` with
/// [`ResourceError::NotifyCreate`].
pub trait Reactor: Send + Sync + 'static {
    /// Opaque handle to a registered wake-up source.
    type Notify: Send + Sync + 'static;

    fn create_notify(
        &self,
        log: Logger,
        on_notify: NotifyCallback,
    ) -> Result<Self::Notify, ResourceError>;

    /// Triggers the wake-up source exactly once. Called by a worker thread
    /// after pushing a finished task into the completion queue.
    fn signal_notify(&self, notify: &Self::Notify);

    /// Re-arms the wake-up source for the next notification. Called by the
    /// completion handler before draining. Returns `false` on failure;
    /// this is not fatal -- the queue will simply be drained on some
    /// later wake-up instead.
    fn handle_notify(&self, notify: &Self::Notify) -> bool;
}

/// Owns the re-arm-then-drain protocol; constructed once per pool and
/// invoked (indirectly, through the `NotifyCallback` closure registered
/// with the reactor) every time a worker signals completion.
pub(crate) struct CompletionHandler<R: Reactor> {
    reactor: Arc<R>,
    notify: Arc<OnceLock<R::Notify>>,
    completion: Arc<CompletionQueue>,
    logger: Logger,
}

impl<R: Reactor> CompletionHandler<R> {
    pub(crate) fn new(
        reactor: Arc<R>,
        notify: Arc<OnceLock<R::Notify>>,
        completion: Arc<CompletionQueue>,
        logger: Logger,
    ) -> Self {
        CompletionHandler {
            reactor,
            notify,
            completion,
            logger,
        }
    }

    pub(crate) fn drain(&self) {
        if let Some(notify) = self.notify.get() {
            if !self.reactor.handle_notify(notify) {
                let pool = self.logger.pool_name().to_string();
                self.logger
                    .log(|| crate::log::Event::NotifyArmFailed { pool: &pool });
            }
        }

        while let Some(task) = self.completion.pop() {
            let task_id = task.id();
            task.deliver();
            let pool = self.logger.pool_name().to_string();
            self.logger
                .log(|| crate::log::Event::TaskDelivered { pool: &pool, task_id });
        }
    }
}

/// A minimal, real, in-process reactor backed by an unbounded
/// `crossbeam_channel`. Every notify created from one `ChannelReactor`
/// shares a single dedicated background thread that plays the role of
/// "the reactor thread" -- all registered handlers run serialized on it,
/// single-threaded with respect to all other reactor callbacks.
///
/// Not a production reactor: it exists so this crate's own tests (and
/// anyone evaluating the `Reactor` trait) have a real, runnable
/// implementation to point pools at, the way a real epoll/kqueue reactor
/// would be provided by the surrounding application.
pub struct ChannelReactor {
    sender: crossbeam_channel::Sender<u64>,
    handlers: Arc<Mutex<HashMap<u64, NotifyCallback>>>,
    next_id: AtomicU64,
    // Kept alive for the reactor's lifetime; deliberately never joined,
    // matching the worker-thread shutdown policy decided in DESIGN.md.
    _reactor_thread: thread::JoinHandle<()>,
}

impl ChannelReactor {
    pub fn new() -> Self {
        let (sender, receiver) = crossbeam_channel::unbounded::<u64>();
        let handlers: Arc<Mutex<HashMap<u64, NotifyCallback>>> = Arc::new(Mutex::new(HashMap::new()));
        let handlers_for_thread = Arc::clone(&handlers);

        let reactor_thread = thread::Builder::new()
            .name("channel-reactor".to_owned())
            .spawn(move || {
                for id in receiver.iter() {
                    let handler = handlers_for_thread.lock().expect("handlers mutex poisoned").get(&id).cloned();
                    if let Some(handler) = handler {
                        handler();
                    }
                }
            })
            .expect("failed to spawn channel reactor thread");

        ChannelReactor {
            sender,
            handlers,
            next_id: AtomicU64::new(0),
            _reactor_thread: reactor_thread,
        }
    }
}

impl Default for ChannelReactor {
    fn default() -> Self {
        Self::new()
    }
}

/// Opaque handle returned by [`ChannelReactor::create_notify`].
pub struct ChannelNotify {
    id: u64,
    sender: crossbeam_channel::Sender<u64>,
    fail_next_rearm: AtomicBool,
}

impl ChannelNotify {
    /// Test knob: makes the next `handle_notify` call report failure,
    /// exercising the re-arm-failure path without needing a reactor that
    /// can genuinely fail to re-arm.
    pub fn fail_next_rearm(&self) {
        self.fail_next_rearm.store(true, Ordering::SeqCst);
    }
}

impl Reactor for ChannelReactor {
    type Notify = ChannelNotify;

    fn create_notify(
        &self,
        _log: Logger,
        on_notify: NotifyCallback,
    ) -> Result<Self::Notify, ResourceError> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.handlers
            .lock()
            .expect("handlers mutex poisoned")
            .insert(id, on_notify);
        Ok(ChannelNotify {
            id,
            sender: self.sender.clone(),
            fail_next_rearm: AtomicBool::new(false),
        })
    }

    fn signal_notify(&self, notify: &Self::Notify) {
        // An unbounded channel never blocks; a disconnected receiver (the
        // reactor thread panicked) means there's nothing left to notify.
        let _ = notify.sender.send(notify.id);
    }

    fn handle_notify(&self, notify: &Self::Notify) -> bool {
        !notify.fail_next_rearm.swap(false, Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::task::{AnyTask, Task};
    use std::sync::atomic::AtomicUsize;
    use std::sync::OnceLock;

    // If re-arming the wake-up source fails, subsequent completions still
    // accumulate in the completion queue; they get delivered the next
    // time any wake-up fires. A failed re-arm must not stop the current
    // drain from delivering what's already queued, and must not be
    // treated as fatal.
    #[test]
    fn drain_still_delivers_when_rearm_fails() {
        let reactor = Arc::new(ChannelReactor::new());
        let logger = Logger::new("rearm-test".to_owned());
        let completion = Arc::new(CompletionQueue::new());
        let notify_slot: Arc<OnceLock<ChannelNotify>> = Arc::new(OnceLock::new());

        let handler = CompletionHandler::new(
            Arc::clone(&reactor),
            Arc::clone(&notify_slot),
            Arc::clone(&completion),
            logger,
        );

        let notify = reactor
            .create_notify(Logger::new("rearm-test".to_owned()), Arc::new(|| {}))
            .unwrap();
        notify.fail_next_rearm();
        notify_slot.set(notify).unwrap();

        let delivered = Arc::new(AtomicUsize::new(0));
        let delivered_for_task = Arc::clone(&delivered);
        let task: Task<()> = Task::new(
            (),
            |_ctx, _log| {},
            move |_event, _ctx| {
                delivered_for_task.fetch_add(1, Ordering::SeqCst);
            },
        );
        let any_task: Box<dyn AnyTask + Send> = Box::new(task.clone());
        completion.push(any_task);

        handler.drain();

        assert_eq!(delivered.load(Ordering::SeqCst), 1);
        assert!(task.event().complete);

        // The next drain's re-arm is no longer forced to fail.
        assert!(!notify_slot.get().unwrap().fail_next_rearm.swap(false, Ordering::SeqCst));
    }
}
