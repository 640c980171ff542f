#![forbid(unsafe_code)]

//! Non-blocking timer scheduling for a single-threaded host.
//!
//! The background controller never sleeps. It asks a [`Scheduler`] for a
//! repeating timer (library readiness poll) or a one-shot timer (the one-tick
//! deferral after a surface swap), and the host calls back into the controller
//! with the [`TimerId`] when the timer fires.
//!
//! # Implementations
//!
//! - [`DeterministicScheduler`]: host-driven clock; the host advances time
//!   explicitly and drains due timers one at a time. Used by tests and the
//!   native demo.
//! - `BrowserScheduler` (in `backdrop-web`): `setInterval` / `setTimeout`.
//!
//! # Cancellation
//!
//! A cancelled timer is never delivered again, even if it was already due when
//! it was cancelled. [`DeterministicScheduler::pop_due`] yields a single timer
//! per call, so a callback that cancels another due timer (or itself) takes
//! effect before the next delivery.

use std::fmt;
use std::time::Duration;

/// Shortest interval a repeating timer may use. Zero would re-fire forever
/// within a single clock advance.
pub const MIN_REPEAT_INTERVAL: Duration = Duration::from_millis(1);

/// Identifier for a scheduled timer. Never reused within one scheduler.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TimerId(u64);

impl TimerId {
    /// Wrap a raw id. Schedulers allocate these; hosts only echo them back.
    #[inline]
    #[must_use]
    pub const fn from_raw(raw: u64) -> Self {
        Self(raw)
    }

    /// The raw id.
    #[inline]
    #[must_use]
    pub const fn as_raw(self) -> u64 {
        self.0
    }
}

impl fmt::Display for TimerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "timer#{}", self.0)
    }
}

/// Source of scheduled callbacks.
///
/// Implementations must not invoke the controller synchronously from inside
/// `schedule_*`; delivery always happens on a later host turn.
pub trait Scheduler {
    /// Fire every `interval` until cancelled.
    fn schedule_repeating(&mut self, interval: Duration) -> TimerId;

    /// Fire once after `delay`. `Duration::ZERO` means "next host turn".
    fn schedule_once(&mut self, delay: Duration) -> TimerId;

    /// Cancel a timer. Returns `false` if it was unknown or already finished.
    fn cancel(&mut self, id: TimerId) -> bool;

    /// Whether `id` is still pending.
    fn is_scheduled(&self, id: TimerId) -> bool;
}

/// Deterministic monotonic clock controlled by the host.
#[derive(Debug, Default, Clone)]
pub struct DeterministicClock {
    now: Duration,
}

impl DeterministicClock {
    /// Create a clock starting at `0`.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            now: Duration::ZERO,
        }
    }

    /// Current monotonic time.
    #[inline]
    #[must_use]
    pub const fn now(&self) -> Duration {
        self.now
    }

    /// Advance monotonic time by `dt`.
    pub fn advance(&mut self, dt: Duration) {
        self.now = self.now.saturating_add(dt);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TimerKind {
    Once,
    Repeating(Duration),
}

#[derive(Debug, Clone)]
struct PendingTimer {
    id: TimerId,
    due: Duration,
    kind: TimerKind,
}

/// Host-driven scheduler with an explicit clock.
///
/// # Example
///
/// ```
/// use backdrop_runtime::scheduler::{DeterministicScheduler, Scheduler};
/// use std::time::Duration;
///
/// let mut sched = DeterministicScheduler::new();
/// let poll = sched.schedule_repeating(Duration::from_millis(100));
/// sched.advance(Duration::from_millis(250));
/// assert_eq!(sched.pop_due(), Some(poll));
/// assert_eq!(sched.pop_due(), Some(poll));
/// assert_eq!(sched.pop_due(), None);
/// ```
#[derive(Debug, Default)]
pub struct DeterministicScheduler {
    clock: DeterministicClock,
    timers: Vec<PendingTimer>,
    next_id: u64,
    delivered: u64,
}

impl DeterministicScheduler {
    /// Create a scheduler whose clock starts at zero.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Current clock reading.
    #[inline]
    #[must_use]
    pub fn now(&self) -> Duration {
        self.clock.now()
    }

    /// Advance the clock. Does not deliver anything; drain with [`pop_due`](Self::pop_due).
    pub fn advance(&mut self, dt: Duration) {
        self.clock.advance(dt);
    }

    /// Take the next due timer, earliest deadline first (ties by id).
    ///
    /// Repeating timers are re-armed one interval past their previous
    /// deadline, so advancing by several intervals yields the timer once per
    /// elapsed interval.
    pub fn pop_due(&mut self) -> Option<TimerId> {
        let now = self.clock.now();
        let idx = self
            .timers
            .iter()
            .enumerate()
            .filter(|(_, t)| t.due <= now)
            .min_by_key(|(_, t)| (t.due, t.id))
            .map(|(idx, _)| idx)?;

        let id = self.timers[idx].id;
        match self.timers[idx].kind {
            TimerKind::Once => {
                self.timers.swap_remove(idx);
            }
            TimerKind::Repeating(interval) => {
                self.timers[idx].due = self.timers[idx].due.saturating_add(interval);
            }
        }
        self.delivered += 1;
        Some(id)
    }

    /// Number of pending timers.
    #[must_use]
    pub fn pending_count(&self) -> usize {
        self.timers.len()
    }

    /// Total deliveries made by [`pop_due`](Self::pop_due).
    #[must_use]
    pub fn delivered_count(&self) -> u64 {
        self.delivered
    }

    fn allocate(&mut self, due: Duration, kind: TimerKind) -> TimerId {
        self.next_id += 1;
        let id = TimerId(self.next_id);
        self.timers.push(PendingTimer { id, due, kind });
        id
    }
}

impl Scheduler for DeterministicScheduler {
    fn schedule_repeating(&mut self, interval: Duration) -> TimerId {
        let interval = interval.max(MIN_REPEAT_INTERVAL);
        let due = self.clock.now().saturating_add(interval);
        self.allocate(due, TimerKind::Repeating(interval))
    }

    fn schedule_once(&mut self, delay: Duration) -> TimerId {
        let due = self.clock.now().saturating_add(delay);
        self.allocate(due, TimerKind::Once)
    }

    fn cancel(&mut self, id: TimerId) -> bool {
        let before = self.timers.len();
        self.timers.retain(|t| t.id != id);
        self.timers.len() != before
    }

    fn is_scheduled(&self, id: TimerId) -> bool {
        self.timers.iter().any(|t| t.id == id)
    }
}
