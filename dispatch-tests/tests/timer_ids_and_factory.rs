//! Timer id uniqueness and monotonicity, and the `invoker_factory` seam driven
//! from a pool-hosted loop.

use std::collections::HashSet;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use dispatch_core::{make_invoker_from_factory, Event, EventHandler, EventLoop, HandlerBase};
use dispatch_executor::ThreadPool;

struct Inert {
    base: HandlerBase,
}

impl EventHandler for Inert {
    fn dispatch(&self, _event: Event) {}
}

#[test]
fn timer_ids_are_unique_and_strictly_increasing() {
    let event_loop = EventLoop::threadless();
    let handler = event_loop.spawn_handler(|base| Inert { base });

    let mut ids = Vec::new();
    for _ in 0..50 {
        let id = handler.base.add_timer(Duration::from_secs(60), true);
        assert!(id.is_valid());
        ids.push(id);
    }

    let unique: HashSet<_> = ids.iter().collect();
    assert_eq!(unique.len(), ids.len(), "timer ids must be unique");

    let values: Vec<u64> = ids.iter().map(|id| id.as_u64()).collect();
    for pair in values.windows(2) {
        assert!(pair[1] > pair[0], "timer ids must be strictly increasing: {values:?}");
    }
}

#[test]
fn invoker_factory_reaches_a_pool_hosted_loop() {
    let pool = ThreadPool::new();
    let mut event_loop = EventLoop::on_pool(&pool).expect("pool should spawn a worker");
    // Exercise the `EventLoop::invoker_factory()` method entry point directly,
    // rather than the equivalent free function `invoker_factory_for`.
    let factory = event_loop.invoker_factory();

    let counter = Arc::new(AtomicU32::new(0));
    let c = counter.clone();
    let invoke = make_invoker_from_factory(factory, move |n: u32| {
        c.fetch_add(n, Ordering::SeqCst);
    });

    invoke(1);
    invoke(2);
    invoke(3);

    let deadline = std::time::Instant::now() + Duration::from_secs(1);
    while counter.load(Ordering::SeqCst) < 6 && std::time::Instant::now() < deadline {
        std::thread::sleep(Duration::from_millis(5));
    }
    assert_eq!(counter.load(Ordering::SeqCst), 6);

    event_loop.stop(true);
}
