use std::time::{Duration, Instant};

use crate::handler::HandlerId;

/// Opaque identifier for a live timer within one loop.
///
/// Unique and strictly increasing within a loop's lifetime. `TimerId::INVALID` (the
/// sentinel zero value) is returned by `add_timer` when the target handler is
/// already removing, and is always a no-op target for `stop_timer`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TimerId(pub(crate) u64);

impl TimerId {
    pub const INVALID: TimerId = TimerId(0);

    pub fn is_valid(self) -> bool {
        self.0 != 0
    }

    /// The raw numeric value of this id.
    pub fn as_u64(self) -> u64 {
        self.0
    }
}

/// Delivered to a handler when one of its timers fires.
#[derive(Debug, Clone, Copy)]
pub struct TimerEvent {
    pub id: TimerId,
}

pub(crate) struct TimerRecord {
    pub(crate) id: TimerId,
    pub(crate) handler: HandlerId,
    pub(crate) deadline: Instant,
    /// `None` means one-shot; `Some(interval)` means re-arm at `now + interval` on
    /// every fire (no catch-up, by design).
    pub(crate) interval: Option<Duration>,
}
