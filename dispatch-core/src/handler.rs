use std::any::Any;
use std::sync::Arc;
use std::time::Duration;

use crate::event::Event;
use crate::event_loop::LoopCore;
use crate::timer::TimerId;

slotmap::new_key_type! {
    /// Stable identity of a handler registered with an [`crate::EventLoop`].
    ///
    /// Stands in for a raw back-pointer to the handler object: the loop never holds
    /// a strong reference to a handler, only a `Weak` keyed by this id, so a
    /// handler's normal `Drop` is enough to make the loop stop seeing it.
    pub struct HandlerId;
}

/// Implemented by types that want to receive events dispatched by a loop.
///
/// Typically implemented on a type that embeds a [`HandlerBase`] field for the
/// `post`/`add_timer`/`stop_timer`/`remove_handler` forwarding API.
pub trait EventHandler: Send + Sync + 'static {
    /// Invoked on the loop's dispatch thread with an event addressed to this
    /// handler. Runs with the loop's lock released; may freely call back into the
    /// loop (post more events, add timers, even remove itself).
    fn dispatch(&self, event: Event);
}

/// Binds a handler to exactly one loop at construction and forwards the loop's
/// handler-facing operations.
///
/// A well-behaved [`EventHandler`] implementation embeds one of these and lets its
/// `Drop` impl run: `HandlerBase`'s own `Drop` calls `remove_handler()` as a safety
/// net, so a handler that is simply dropped without an explicit call still gets
/// scrubbed out of the loop's queues before anything is freed.
pub struct HandlerBase {
    core: Arc<LoopCore>,
    id: HandlerId,
}

impl HandlerBase {
    pub(crate) fn new(core: Arc<LoopCore>, id: HandlerId) -> Self {
        Self { core, id }
    }

    /// This handler's stable identity within its loop.
    pub fn id(&self) -> HandlerId {
        self.id
    }

    /// Forwards to `loop.post(self, event)`.
    pub fn post<T: Any + Send>(&self, payload: T) {
        self.core.post(self.id, Event::new(payload));
    }

    /// Forwards to `loop.add_timer(self, interval, one_shot)`.
    pub fn add_timer(&self, interval: Duration, one_shot: bool) -> TimerId {
        self.core.add_timer(self.id, interval, one_shot)
    }

    /// Forwards to `loop.stop_timer(id)`.
    pub fn stop_timer(&self, id: TimerId) {
        self.core.stop_timer(id);
    }

    /// Triggers the loop's removal protocol for this handler. Idempotent, callable
    /// from any thread.
    pub fn remove_handler(&self) {
        self.core.remove_handler(self.id);
    }
}

impl Drop for HandlerBase {
    fn drop(&mut self) {
        self.remove_handler();
    }
}
