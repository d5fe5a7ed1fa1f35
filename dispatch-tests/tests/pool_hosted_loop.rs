//! An `EventLoop` whose dispatch thread is borrowed from a `ThreadPool` rather
//! than owned outright.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use dispatch_core::{Event, EventHandler, EventLoop, HandlerBase};
use dispatch_executor::ThreadPool;

fn init_logging() {
    use std::sync::Once;
    static LOG_INIT: Once = Once::new();
    LOG_INIT.call_once(env_logger::init);
}

struct Counter {
    base: HandlerBase,
    count: AtomicU32,
}

impl EventHandler for Counter {
    fn dispatch(&self, event: Event) {
        if event.downcast::<u32>().is_ok() {
            self.count.fetch_add(1, Ordering::SeqCst);
        }
    }
}

#[test]
fn pool_hosted_loop_dispatches_posted_events() {
    init_logging();
    let pool = ThreadPool::new();
    let mut event_loop = EventLoop::on_pool(&pool).expect("pool should spawn a worker");

    let handler = event_loop.spawn_handler(|base| Counter {
        base,
        count: AtomicU32::new(0),
    });
    for i in 0..5u32 {
        handler.base.post(i);
    }

    let deadline = std::time::Instant::now() + Duration::from_secs(1);
    while handler.count.load(Ordering::SeqCst) < 5 && std::time::Instant::now() < deadline {
        std::thread::sleep(Duration::from_millis(5));
    }
    assert_eq!(handler.count.load(Ordering::SeqCst), 5);

    event_loop.stop(true);
}

#[test]
fn stopping_a_pool_hosted_loop_frees_the_worker_for_reuse() {
    init_logging();
    let pool = ThreadPool::new();

    let mut first = EventLoop::on_pool(&pool).expect("pool should spawn a worker");
    let first_handler = first.spawn_handler(|base| Counter {
        base,
        count: AtomicU32::new(0),
    });
    first_handler.base.post(1u32);
    std::thread::sleep(Duration::from_millis(20));
    first.stop(true);

    // The worker that drove `first`'s dispatch should now be idle and reused
    // rather than a fresh one spawned, exercising the pool's idle-list reuse.
    let ran_on_new_worker = Arc::new(AtomicU32::new(0));
    let r = ran_on_new_worker.clone();
    pool.spawn(move || {
        r.fetch_add(1, Ordering::SeqCst);
    })
    .expect("spawning a plain task should succeed")
    .join();
    assert_eq!(ran_on_new_worker.load(Ordering::SeqCst), 1);
}

#[test]
fn two_loops_sharing_a_pool_dispatch_independently() {
    init_logging();
    let pool = ThreadPool::new();
    let mut a = EventLoop::on_pool(&pool).expect("pool should spawn a worker for a");
    let mut b = EventLoop::on_pool(&pool).expect("pool should spawn a worker for b");

    let handler_a = a.spawn_handler(|base| Counter {
        base,
        count: AtomicU32::new(0),
    });
    let handler_b = b.spawn_handler(|base| Counter {
        base,
        count: AtomicU32::new(0),
    });

    for i in 0..3u32 {
        handler_a.base.post(i);
        handler_b.base.post(i);
    }

    let deadline = std::time::Instant::now() + Duration::from_secs(1);
    while (handler_a.count.load(Ordering::SeqCst) < 3 || handler_b.count.load(Ordering::SeqCst) < 3)
        && std::time::Instant::now() < deadline
    {
        std::thread::sleep(Duration::from_millis(5));
    }
    assert_eq!(handler_a.count.load(Ordering::SeqCst), 3);
    assert_eq!(handler_b.count.load(Ordering::SeqCst), 3);

    a.stop(true);
    b.stop(true);
}
