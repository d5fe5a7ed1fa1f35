use std::sync::Arc;

use crate::event::Event;
use crate::event_loop::EventLoop;
use crate::handler::{EventHandler, HandlerBase};

/// Boxed zero-arg thunk carried by the invoker's carrier event: a type-erased
/// payload boxed as `Box<dyn Any + Send>` under the hood, same as any other event.
struct InvokerThunk(Box<dyn FnOnce() + Send>);

struct InvokerHandler {
    base: HandlerBase,
}

impl EventHandler for InvokerHandler {
    fn dispatch(&self, event: Event) {
        if let Ok(thunk) = event.downcast::<InvokerThunk>() {
            (thunk.0)();
        }
    }
}

/// A thread-safe callable that reschedules invocations of the wrapped function onto
/// its bound loop's dispatch thread.
///
/// Invocations from a single thread are delivered in call order; invocations from
/// distinct threads are interleaved in whatever order the loop's lock admits their
/// posts.
pub struct Invoker<Args> {
    handler: Arc<InvokerHandler>,
    f: Arc<dyn Fn(Args) + Send + Sync>,
}

impl<Args> Clone for Invoker<Args> {
    fn clone(&self) -> Self {
        Self {
            handler: self.handler.clone(),
            f: self.f.clone(),
        }
    }
}

impl<Args: Send + 'static> Invoker<Args> {
    /// Packages `args` into a one-shot carrier event and posts it to the bound loop;
    /// the wrapped function runs on the loop's dispatch thread.
    pub fn call(&self, args: Args) {
        let f = self.f.clone();
        self.handler.base.post(InvokerThunk(Box::new(move || f(args))));
    }
}

impl Invoker<()> {
    /// Convenience for the common zero-argument case.
    pub fn call0(&self) {
        self.call(());
    }
}

/// Wraps `f`, bound to `event_loop`, as a thread-safe, re-entering callable.
pub fn make_invoker<Args, F>(event_loop: &EventLoop, f: F) -> Invoker<Args>
where
    Args: Send + 'static,
    F: Fn(Args) + Send + Sync + 'static,
{
    let handler = event_loop.spawn_handler(|base| InvokerHandler { base });
    Invoker {
        handler,
        f: Arc::new(f),
    }
}

/// The generic capability a foreign event system exposes in place of a loop: "post
/// this thunk to run on my own dispatch thread." Preserves the seam so an invoker
/// can be built without assuming the loop behind it is one of this crate's own.
pub type InvokerFactory = Arc<dyn Fn(Box<dyn FnOnce() + Send>) + Send + Sync>;

/// Builds an [`InvokerFactory`] backed by `event_loop`.
///
/// Foreign event systems (a GUI toolkit, a hosted runtime) provide their own
/// factory with the same contract instead of this one; `make_invoker_from_factory`
/// doesn't care which kind it was given.
pub fn invoker_factory_for(event_loop: &EventLoop) -> InvokerFactory {
    let handler = event_loop.spawn_handler(|base| InvokerHandler { base });
    Arc::new(move |thunk: Box<dyn FnOnce() + Send>| {
        handler.base.post(InvokerThunk(thunk));
    })
}

/// Like [`make_invoker`], but built from a factory rather than a concrete loop.
/// Slower than `make_invoker` because the factory indirection is dynamic.
pub fn make_invoker_from_factory<Args, F>(
    factory: InvokerFactory,
    f: F,
) -> impl Fn(Args) + Send + Sync + Clone + 'static
where
    Args: Send + 'static,
    F: Fn(Args) + Send + Sync + 'static,
{
    let f = Arc::new(f);
    move |args: Args| {
        let f = f.clone();
        factory(Box::new(move || f(args)));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::{Condvar, Mutex};
    use std::time::Duration;

    #[test]
    fn basic_invoker_runs_on_loop_thread_and_is_recallable() {
        let event_loop = EventLoop::new().unwrap();
        let state = Arc::new((Mutex::new(0u32), Condvar::new()));
        let s = state.clone();
        let inv = make_invoker(&event_loop, move |()| {
            *s.0.lock().unwrap() += 1;
            s.1.notify_all();
        });

        inv.call0();
        {
            let (lock, cond) = &*state;
            let mut c = lock.lock().unwrap();
            while *c == 0 {
                let (guard, timeout) = cond.wait_timeout(c, Duration::from_secs(1)).unwrap();
                c = guard;
                assert!(!timeout.timed_out(), "invoker never ran");
            }
            assert_eq!(*c, 1);
            *c = 0;
        }

        inv.call0();
        {
            let (lock, cond) = &*state;
            let mut c = lock.lock().unwrap();
            while *c == 0 {
                let (guard, timeout) = cond.wait_timeout(c, Duration::from_secs(1)).unwrap();
                c = guard;
                assert!(!timeout.timed_out(), "invoker never ran the second time");
            }
            assert_eq!(*c, 1);
        }
    }

    #[test]
    fn invoker_from_factory_reaches_the_same_loop() {
        let event_loop = EventLoop::new().unwrap();
        let factory = invoker_factory_for(&event_loop);
        let counter = Arc::new(AtomicU32::new(0));
        let c = counter.clone();
        let inv = make_invoker_from_factory(factory, move |()| {
            c.fetch_add(1, Ordering::SeqCst);
        });
        inv(());
        inv(());
        std::thread::sleep(Duration::from_millis(50));
        assert_eq!(counter.load(Ordering::SeqCst), 2);
    }
}
