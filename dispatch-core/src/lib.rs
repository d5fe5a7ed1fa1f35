//! A threaded event dispatch core: an [`EventLoop`] that serialises delivery of
//! typed [`Event`]s and expiring timers to registered handlers, plus an
//! [`Invoker`]/[`make_invoker`] facility for turning arbitrary callables into safe
//! cross-thread schedulings onto a loop.
//!
//! The hard part is concentrated in three tightly-coupled concerns: serialising
//! event delivery inside a loop-owned thread while permitting enqueue from any
//! thread, safely removing a handler whose code may currently be running on the
//! loop, and fusing a timer collection with an event queue under a single condition
//! variable so both wake correctly. See `event_loop` for the dispatch algorithm and
//! removal protocol.

mod error;
mod event;
mod event_loop;
mod handler;
mod invoker;
mod timer;

pub use error::SpawnError;
pub use event::Event;
pub use event_loop::EventLoop;
pub use handler::{EventHandler, HandlerBase, HandlerId};
pub use invoker::{make_invoker, make_invoker_from_factory, invoker_factory_for, Invoker, InvokerFactory};
pub use timer::{TimerEvent, TimerId};

pub use dispatch_executor::ThreadPool;
