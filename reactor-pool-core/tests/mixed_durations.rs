//! End-to-end scenario 3: with multiple workers, wall time for a batch of
//! randomly-sleeping tasks is well below the serial sum -- proof that tasks
//! actually run in parallel rather than being serialized somewhere.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use rand::Rng;
use reactor_pool_core::{ChannelReactor, ConfigRegistry, PoolRegistry, Task};

#[test]
fn hundred_tasks_run_in_parallel() {
    let mut config = ConfigRegistry::new();
    config
        .declare("mixed", 4, Some(128), ("mixed.conf".to_owned(), 1))
        .unwrap();
    let pools = config.finalize().unwrap();

    let registry = PoolRegistry::start(pools, ChannelReactor::new()).unwrap();
    let pool = registry.pool_get("mixed").unwrap();

    let mut rng = rand::thread_rng();
    let durations: Vec<u64> = (0..100).map(|_| rng.gen_range(1..=50)).collect();
    let serial_sum: u64 = durations.iter().sum();

    let completed = Arc::new(AtomicUsize::new(0));
    let start = Instant::now();

    for ms in &durations {
        let completed = Arc::clone(&completed);
        let task = Task::new(
            *ms,
            |ctx: &mut u64, _log| std::thread::sleep(Duration::from_millis(*ctx)),
            move |_event, _ctx| {
                completed.fetch_add(1, Ordering::SeqCst);
            },
        );
        pool.task_post(&task).expect("queue has room");
    }

    while completed.load(Ordering::SeqCst) < 100 {
        std::thread::sleep(Duration::from_millis(5));
        assert!(start.elapsed() < Duration::from_secs(10), "tasks never completed");
    }

    let wall = start.elapsed();
    assert!(
        wall < Duration::from_millis(serial_sum),
        "wall time {:?} did not beat serial sum {}ms",
        wall,
        serial_sum
    );
}
