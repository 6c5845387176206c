//! End-to-end scenario 2: a pool at capacity rejects new submissions with
//! `QueueOverflow` until a worker frees up room.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Condvar, Mutex};
use std::time::Duration;

use reactor_pool_core::{AdmissionError, ChannelReactor, ConfigRegistry, PoolRegistry, Task};

struct Gate {
    lock: Mutex<bool>,
    condvar: Condvar,
}

impl Gate {
    fn new() -> Self {
        Gate {
            lock: Mutex::new(false),
            condvar: Condvar::new(),
        }
    }

    fn wait(&self) {
        let mut open = self.lock.lock().unwrap();
        while !*open {
            open = self.condvar.wait(open).unwrap();
        }
    }

    fn open(&self) {
        *self.lock.lock().unwrap() = true;
        self.condvar.notify_all();
    }
}

#[test]
fn third_submission_overflows_then_drains() {
    let mut config = ConfigRegistry::new();
    config
        .declare("single", 1, Some(2), ("overflow.conf".to_owned(), 1))
        .unwrap();
    let pools = config.finalize().unwrap();

    let registry = PoolRegistry::start(pools, ChannelReactor::new()).unwrap();
    let pool = registry.pool_get("single").unwrap();

    let gate = Arc::new(Gate::new());
    let completed = Arc::new(AtomicUsize::new(0));

    let make_task = |gate: &Arc<Gate>, completed: &Arc<AtomicUsize>| {
        let gate = Arc::clone(gate);
        let completed = Arc::clone(completed);
        Task::new(
            (),
            move |_ctx, _log| gate.wait(),
            move |_event, _ctx| {
                completed.fetch_add(1, Ordering::SeqCst);
            },
        )
    };

    let first = make_task(&gate, &completed);
    let second = make_task(&gate, &completed);
    let third = make_task(&gate, &completed);

    assert!(pool.task_post(&first).is_ok());
    assert!(pool.task_post(&second).is_ok());
    assert_eq!(
        pool.task_post(&third),
        Err(AdmissionError::QueueOverflow { depth: 2 })
    );

    gate.open();
    std::thread::sleep(Duration::from_millis(300));

    assert_eq!(completed.load(Ordering::SeqCst), 2);
}
