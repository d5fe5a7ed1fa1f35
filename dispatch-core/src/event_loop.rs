use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Condvar, Mutex, Weak};
use std::thread::ThreadId;
use std::time::{Duration, Instant};

use log::trace;
use slotmap::SlotMap;

use dispatch_executor::{AsyncTask, OwnedThread, SpawnError, ThreadPool};

use crate::event::Event;
use crate::handler::{EventHandler, HandlerBase, HandlerId};
use crate::timer::{TimerEvent, TimerId, TimerRecord};

struct HandlerSlot {
    handler: Weak<dyn EventHandler>,
    removing: bool,
}

struct State {
    handlers: SlotMap<HandlerId, HandlerSlot>,
    pending: VecDeque<(HandlerId, Event)>,
    timers: Vec<TimerRecord>,
    next_deadline: Option<Instant>,
    next_timer_id: u64,
    active_handler: Option<HandlerId>,
    quit: bool,
    loop_thread: Option<ThreadId>,
}

impl State {
    fn new() -> Self {
        Self {
            handlers: SlotMap::with_key(),
            pending: VecDeque::new(),
            timers: Vec::new(),
            next_deadline: None,
            next_timer_id: 1,
            active_handler: None,
            quit: false,
            loop_thread: None,
        }
    }

    fn recompute_next_deadline(&mut self) {
        self.next_deadline = self.timers.iter().map(|t| t.deadline).min();
    }
}

/// The mutex-and-condvar-protected core shared by an [`EventLoop`] and every
/// [`HandlerBase`] bound to it.
///
/// Deliberately does not own the dispatch thread: handlers hold a strong `Arc` to
/// this, so the queue/timer bookkeeping must be able to outlive the `EventLoop`
/// facade without keeping its OS thread running.
pub(crate) struct LoopCore {
    state: Mutex<State>,
    cond: Condvar,
}

impl LoopCore {
    fn new() -> Arc<Self> {
        Arc::new(Self {
            state: Mutex::new(State::new()),
            cond: Condvar::new(),
        })
    }

    pub(crate) fn register(&self, handler: Weak<dyn EventHandler>) -> HandlerId {
        let mut state = self.state.lock().unwrap();
        state.handlers.insert(HandlerSlot {
            handler,
            removing: false,
        })
    }

    pub(crate) fn post(&self, handler: HandlerId, event: Event) {
        let mut state = self.state.lock().unwrap();
        let Some(slot) = state.handlers.get(handler) else {
            return;
        };
        if slot.removing {
            return; // destroy the event immediately; no-op
        }
        let was_empty = state.pending.is_empty();
        state.pending.push_back((handler, event));
        if was_empty {
            self.cond.notify_all();
        }
    }

    pub(crate) fn add_timer(&self, handler: HandlerId, interval: Duration, one_shot: bool) -> TimerId {
        let mut state = self.state.lock().unwrap();
        let Some(slot) = state.handlers.get(handler) else {
            return TimerId::INVALID;
        };
        if slot.removing {
            return TimerId::INVALID;
        }
        let id = TimerId(state.next_timer_id);
        state.next_timer_id += 1;
        let deadline = Instant::now() + interval;
        let earlier = state.next_deadline.is_none_or(|d| deadline < d);
        state.timers.push(TimerRecord {
            id,
            handler,
            deadline,
            interval: if one_shot { None } else { Some(interval) },
        });
        if earlier {
            state.next_deadline = Some(deadline);
            self.cond.notify_all();
        }
        id
    }

    pub(crate) fn stop_timer(&self, id: TimerId) {
        if !id.is_valid() {
            return;
        }
        let mut state = self.state.lock().unwrap();
        if let Some(pos) = state.timers.iter().position(|t| t.id == id) {
            state.timers.remove(pos);
            if state.timers.is_empty() {
                state.next_deadline = None;
            }
            // Deliberately not recomputed in the general case: a stale earlier
            // next_deadline causes at most one spurious wakeup, never a missed
            // fire. Mirrors libfilezilla's event_loop::stop_timer.
        }
    }

    pub(crate) fn filter_events(&self, mut pred: impl FnMut(&HandlerId, &mut Event) -> bool) {
        let mut state = self.state.lock().unwrap();
        state.pending.retain_mut(|(handler, event)| !pred(handler, event));
    }

    pub(crate) fn remove_handler(&self, id: HandlerId) {
        let calling_thread = std::thread::current().id();
        let mut state = self.state.lock().unwrap();
        match state.handlers.get_mut(id) {
            // Unknown id, or a removal is already in flight from another caller:
            // idempotent no-op.
            None => return,
            Some(slot) if slot.removing => return,
            Some(slot) => slot.removing = true,
        }
        state.pending.retain(|(h, _)| *h != id);
        let had_timers = !state.timers.is_empty();
        state.timers.retain(|t| t.handler != id);
        if had_timers && state.timers.is_empty() {
            state.next_deadline = None;
        }

        if state.active_handler == Some(id) && state.loop_thread != Some(calling_thread) {
            // Cross-thread: spin until the in-flight dispatch to H completes. No
            // lock is held while yielding, so the dispatch thread can actually
            // progress.
            loop {
                drop(state);
                std::thread::yield_now();
                state = self.state.lock().unwrap();
                if state.active_handler != Some(id) {
                    break;
                }
            }
        }
        // H is re-entrantly removing itself from within its own dispatch (the
        // dispatch frame unwinds through the loop normally once we return), or
        // any in-flight dispatch to it elsewhere has completed. Either way the
        // slot can be reclaimed now, so a loop with heavy handler churn (e.g. one
        // invoker handler per call site) doesn't leak registry slots.
        state.handlers.remove(id);
    }

    fn request_stop(&self) {
        let mut state = self.state.lock().unwrap();
        state.quit = true;
        self.cond.notify_all();
    }

    fn take_expired_timer(&self, state: &mut State) -> Option<(HandlerId, TimerId)> {
        let deadline = state.next_deadline?;
        let now = Instant::now();
        if now < deadline {
            return None;
        }
        let pos = state.timers.iter().position(|t| t.deadline <= now)?;
        let handler = state.timers[pos].handler;
        let id = state.timers[pos].id;
        if let Some(interval) = state.timers[pos].interval {
            state.timers[pos].deadline = now + interval;
        } else {
            state.timers.remove(pos);
        }
        state.recompute_next_deadline();
        state.active_handler = Some(handler);
        Some((handler, id))
    }

    fn take_pending_event(&self, state: &mut State) -> Option<(HandlerId, Event)> {
        let (handler, event) = state.pending.pop_front()?;
        state.active_handler = Some(handler);
        Some((handler, event))
    }

    /// Runs the dispatch loop on the calling thread until `stop` is observed.
    fn entry(&self) {
        {
            let mut state = self.state.lock().unwrap();
            state.loop_thread = Some(std::thread::current().id());
        }
        trace!("event loop dispatch starting on {:?}", std::thread::current().id());

        let mut state = self.state.lock().unwrap();
        loop {
            if state.quit {
                break;
            }

            if let Some((handler_id, timer_id)) = self.take_expired_timer(&mut state) {
                let handler = state.handlers.get(handler_id).and_then(|s| s.handler.upgrade());
                drop(state);
                if let Some(handler) = handler {
                    handler.dispatch(Event::new(TimerEvent { id: timer_id }));
                }
                state = self.state.lock().unwrap();
                state.active_handler = None;
                continue;
            }

            if let Some((handler_id, event)) = self.take_pending_event(&mut state) {
                let handler = state.handlers.get(handler_id).and_then(|s| s.handler.upgrade());
                drop(state);
                if let Some(handler) = handler {
                    handler.dispatch(event);
                }
                state = self.state.lock().unwrap();
                state.active_handler = None;
                continue;
            }

            state = match state.next_deadline {
                Some(deadline) => {
                    let now = Instant::now();
                    if deadline > now {
                        self.cond.wait_timeout(state, deadline - now).unwrap().0
                    } else {
                        state
                    }
                }
                None => self.cond.wait(state).unwrap(),
            };
        }

        // stop(true) semantics: destroy whatever pending events/timers remain.
        state.pending.clear();
        state.timers.clear();
        state.next_deadline = None;
        trace!("event loop dispatch stopped");
    }
}

enum Mode {
    Owned(Mutex<Option<OwnedThread>>),
    Pool(Mutex<Option<AsyncTask>>),
    Threadless(AtomicBool),
}

/// A serialised event-and-timer dispatcher.
///
/// Construct with [`EventLoop::new`] (owns a dedicated thread), [`EventLoop::on_pool`]
/// (borrows a worker from a [`ThreadPool`]), or [`EventLoop::threadless`] (caller
/// drives dispatch later via [`EventLoop::run`]). Dropping an `EventLoop` stops it
/// and joins its dispatch thread, exactly as an explicit `stop(true)` would.
pub struct EventLoop {
    pub(crate) core: Arc<LoopCore>,
    mode: Mode,
}

impl EventLoop {
    /// Spawns a dedicated OS thread that runs this loop's dispatch.
    pub fn new() -> Result<Self, SpawnError> {
        Self::with_name("dispatch-loop")
    }

    /// Like [`EventLoop::new`], naming the owned OS thread.
    pub fn with_name(name: impl Into<String>) -> Result<Self, SpawnError> {
        let core = LoopCore::new();
        let entry_core = core.clone();
        let thread = OwnedThread::spawn(name, move || entry_core.entry())?;
        Ok(Self {
            core,
            mode: Mode::Owned(Mutex::new(Some(thread))),
        })
    }

    /// Borrows a worker thread from `pool` to run this loop's dispatch.
    ///
    /// Returns `None` if the pool needed a new worker and spawning it failed.
    pub fn on_pool(pool: &ThreadPool) -> Option<Self> {
        let core = LoopCore::new();
        let entry_core = core.clone();
        let task = pool.spawn(move || entry_core.entry())?;
        Some(Self {
            core,
            mode: Mode::Pool(Mutex::new(Some(task))),
        })
    }

    /// Creates a loop with no dispatch thread of its own. The caller must later
    /// drive it with [`EventLoop::run`] from whichever thread should own dispatch.
    pub fn threadless() -> Self {
        Self {
            core: LoopCore::new(),
            mode: Mode::Threadless(AtomicBool::new(false)),
        }
    }

    /// Drives dispatch on the calling thread. Valid only for a threadless loop, and
    /// only once; otherwise a no-op.
    pub fn run(&self) {
        if let Mode::Threadless(ran) = &self.mode {
            if ran.swap(true, Ordering::SeqCst) {
                return;
            }
            self.core.entry();
        }
    }

    /// Registers a new handler bound to this loop. `build` receives the
    /// [`HandlerBase`] to embed in the handler type it constructs.
    pub fn spawn_handler<H, F>(&self, build: F) -> Arc<H>
    where
        H: EventHandler,
        F: FnOnce(HandlerBase) -> H,
    {
        let core = self.core.clone();
        Arc::new_cyclic(move |weak: &Weak<H>| {
            let weak_dyn: Weak<dyn EventHandler> = weak.clone();
            let id = core.register(weak_dyn);
            build(HandlerBase::new(core, id))
        })
    }

    /// Enqueues `payload` for delivery to `handler`. Non-blocking; silently a no-op
    /// if `handler` is already removing.
    pub fn post<T: std::any::Any + Send>(&self, handler: HandlerId, payload: T) {
        self.core.post(handler, Event::new(payload));
    }

    /// Arms a timer owned by `handler`. Returns `TimerId::INVALID` if `handler` is
    /// already removing.
    pub fn add_timer(&self, handler: HandlerId, interval: Duration, one_shot: bool) -> TimerId {
        self.core.add_timer(handler, interval, one_shot)
    }

    /// Cancels a timer by id. A no-op for `TimerId::INVALID` or an unknown id.
    pub fn stop_timer(&self, id: TimerId) {
        self.core.stop_timer(id);
    }

    /// Walks the pending queue, dropping every `(handler, event)` pair for which
    /// `pred` returns `true`. Blocks the dispatch thread while running; `pred` must
    /// not call back into the loop.
    pub fn filter_events(&self, pred: impl FnMut(&HandlerId, &mut Event) -> bool) {
        self.core.filter_events(pred);
    }

    /// Triggers the removal protocol for `handler`. Idempotent, callable from any
    /// thread; blocks until an in-flight dispatch to `handler` on another thread
    /// completes.
    pub fn remove_handler(&self, handler: HandlerId) {
        self.core.remove_handler(handler);
    }

    /// Returns an [`crate::InvokerFactory`] backed by this loop.
    ///
    /// Equivalent to the free function [`crate::invoker_factory_for`]; kept as a
    /// method too so a caller holding only an `&EventLoop` has it as a direct entry
    /// point.
    pub fn invoker_factory(&self) -> crate::InvokerFactory {
        crate::invoker::invoker_factory_for(self)
    }

    /// Signals the dispatch thread to quit. If `join` is true, blocks until it has
    /// terminated and all remaining pending events/timers have been destroyed.
    pub fn stop(&mut self, join: bool) {
        self.core.request_stop();
        if join {
            self.join_dispatch_thread();
        }
    }

    fn join_dispatch_thread(&mut self) {
        match &mut self.mode {
            Mode::Owned(thread) => {
                thread.take();
            }
            Mode::Pool(task) => {
                if let Some(task) = task.take() {
                    task.join();
                }
            }
            Mode::Threadless(_) => {}
        }
    }
}

impl Drop for EventLoop {
    fn drop(&mut self) {
        self.core.request_stop();
        self.join_dispatch_thread();
    }
}
