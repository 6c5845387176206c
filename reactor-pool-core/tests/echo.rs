//! End-to-end scenario 1: every submitted task's completion fires exactly
//! once, carrying the handler's result back to the submitter.

use std::sync::{Arc, Mutex};

use reactor_pool_core::{ChannelReactor, ConfigRegistry, PoolRegistry, Task};

#[test]
fn echo_ten_tasks() {
    let mut config = ConfigRegistry::new();
    config
        .declare("default", 2, Some(4), ("echo.conf".to_owned(), 1))
        .unwrap();
    let pools = config.finalize().unwrap();

    let registry = PoolRegistry::start(pools, ChannelReactor::new()).unwrap();
    let pool = registry.pool_get("default").unwrap();

    let observed = Arc::new(Mutex::new(Vec::new()));
    let mut tasks = Vec::new();

    for n in 0..10u32 {
        let observed = Arc::clone(&observed);
        let task = Task::new(
            (n, 0u32),
            |ctx: &mut (u32, u32), _log| ctx.1 = ctx.0 * ctx.0,
            move |_event, ctx: &mut (u32, u32)| {
                observed.lock().unwrap().push(ctx.1);
            },
        );
        pool.task_post(&task).expect("queue has room");
        tasks.push(task);
    }

    // The completion handler runs on the reactor's dedicated thread; give
    // it a moment to drain every notification.
    std::thread::sleep(std::time::Duration::from_millis(200));

    let mut out = observed.lock().unwrap().clone();
    out.sort_unstable();
    assert_eq!(out, vec![0, 1, 4, 9, 16, 25, 36, 49, 64, 81]);

    for task in &tasks {
        assert!(task.event().complete);
        assert!(!task.event().active);
    }
}
