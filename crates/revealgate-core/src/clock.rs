//! Clock sources and timer scheduling.
//!
//! Timers never hold closures. Each one carries a small task value `T` and
//! the owner of the clock pulls fired timers out with [`ClockSource::fire_next`]
//! and dispatches them itself, one at a time. Cancelling a handle is the only
//! way to stop a pending fire.
//!
//! ## Ordering
//!
//! Timers fire in deadline order. Timers sharing a deadline fire in the order
//! their handles were created; a repeating timer keeps its original handle,
//! so it keeps its priority across re-arms.
//!
//! ## Implementations
//!
//! - [`ManualClock`]: virtual time, moved forward explicitly. Deterministic.
//! - [`SystemClock`]: real monotonic time from [`Instant`].

use std::collections::{BTreeSet, HashMap};
use std::time::{Duration, Instant};

use chrono::{DateTime, TimeDelta, Utc};
use tracing::trace;

use crate::error::ClockError;

/// Opaque id of a scheduled timer. Unique per clock.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TimerHandle(u64);

impl TimerHandle {
    pub fn id(self) -> u64 {
        self.0
    }
}

/// A timer that came due.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fired<T> {
    pub handle: TimerHandle,
    pub task: T,
    /// Deadline the timer was due at, relative to the clock origin.
    pub deadline: Duration,
}

/// Wall-clock scheduling: schedule-once, schedule-repeating, cancel.
pub trait ClockSource<T> {
    /// Monotonic time since the clock origin.
    fn elapsed(&self) -> Duration;

    /// Origin wall time plus [`elapsed`](Self::elapsed).
    fn wall_time(&self) -> DateTime<Utc>;

    /// Fire `task` once, `delay` from now.
    fn schedule_once(&mut self, delay: Duration, task: T) -> Result<TimerHandle, ClockError>;

    /// Fire `task` every `interval`, first one `interval` from now.
    fn schedule_repeating(&mut self, interval: Duration, task: T)
        -> Result<TimerHandle, ClockError>;

    /// Remove a pending timer. Returns `false` if it was not pending.
    fn cancel(&mut self, handle: TimerHandle) -> bool;

    fn is_pending(&self, handle: TimerHandle) -> bool;

    fn pending_count(&self) -> usize;

    /// Earliest pending deadline.
    fn next_deadline(&self) -> Option<Duration>;

    /// Pop the earliest timer due at or before `until`.
    fn fire_next(&mut self, until: Duration) -> Option<Fired<T>>;

    /// Move time forward to `at`. Only meaningful for virtual clocks.
    fn advance_to(&mut self, _at: Duration) {}
}

#[derive(Debug, Clone)]
struct TimerEntry<T> {
    deadline: Duration,
    interval: Option<Duration>,
    task: T,
}

/// Deadline-ordered timer bookkeeping shared by every clock.
#[derive(Debug, Clone)]
pub(crate) struct TimerQueue<T> {
    next_id: u64,
    order: BTreeSet<(Duration, u64)>,
    entries: HashMap<u64, TimerEntry<T>>,
}

impl<T> Default for TimerQueue<T> {
    fn default() -> Self {
        Self {
            next_id: 1,
            order: BTreeSet::new(),
            entries: HashMap::new(),
        }
    }
}

impl<T: Clone> TimerQueue<T> {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Queue `task` at `now + delay`. Deadlines past `Duration::MAX` are refused.
    pub(crate) fn insert(
        &mut self,
        now: Duration,
        delay: Duration,
        interval: Option<Duration>,
        task: T,
    ) -> Result<TimerHandle, ClockError> {
        let deadline = now
            .checked_add(delay)
            .ok_or(ClockError::DeadlineOverflow { delay })?;
        let id = self.next_id;
        self.next_id += 1;
        self.order.insert((deadline, id));
        self.entries.insert(
            id,
            TimerEntry {
                deadline,
                interval,
                task,
            },
        );
        Ok(TimerHandle(id))
    }

    pub(crate) fn remove(&mut self, handle: TimerHandle) -> bool {
        match self.entries.remove(&handle.0) {
            Some(entry) => {
                self.order.remove(&(entry.deadline, handle.0));
                true
            }
            None => false,
        }
    }

    pub(crate) fn contains(&self, handle: TimerHandle) -> bool {
        self.entries.contains_key(&handle.0)
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }

    pub(crate) fn next_deadline(&self) -> Option<Duration> {
        self.order.first().map(|(deadline, _)| *deadline)
    }

    /// Pop the earliest entry due at or before `limit`, re-arming repeating ones.
    ///
    /// A repeating entry whose next deadline would overflow fires one last time.
    pub(crate) fn pop_due(&mut self, limit: Duration) -> Option<Fired<T>> {
        let &(deadline, id) = self.order.first()?;
        if deadline > limit {
            return None;
        }
        self.order.remove(&(deadline, id));

        let rearm = self
            .entries
            .get(&id)
            .and_then(|entry| entry.interval)
            .and_then(|interval| deadline.checked_add(interval));

        let task = match rearm {
            Some(next) => {
                let entry = self.entries.get_mut(&id)?;
                entry.deadline = next;
                self.order.insert((next, id));
                entry.task.clone()
            }
            None => self.entries.remove(&id)?.task,
        };

        Some(Fired {
            handle: TimerHandle(id),
            task,
            deadline,
        })
    }
}

fn offset_wall_time(origin: DateTime<Utc>, elapsed: Duration) -> DateTime<Utc> {
    let millis = i64::try_from(elapsed.as_millis()).unwrap_or(i64::MAX);
    origin
        .checked_add_signed(TimeDelta::milliseconds(millis))
        .unwrap_or(origin)
}

/// Virtual clock. Time only moves when a timer fires or on [`advance_to`].
///
/// [`advance_to`]: ClockSource::advance_to
#[derive(Debug, Clone)]
pub struct ManualClock<T> {
    now: Duration,
    origin: DateTime<Utc>,
    queue: TimerQueue<T>,
}

impl<T: Clone> ManualClock<T> {
    pub fn new() -> Self {
        Self::with_origin(DateTime::<Utc>::UNIX_EPOCH)
    }

    pub fn with_origin(origin: DateTime<Utc>) -> Self {
        Self {
            now: Duration::ZERO,
            origin,
            queue: TimerQueue::new(),
        }
    }
}

impl<T: Clone> Default for ManualClock<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Clone> ClockSource<T> for ManualClock<T> {
    fn elapsed(&self) -> Duration {
        self.now
    }

    fn wall_time(&self) -> DateTime<Utc> {
        offset_wall_time(self.origin, self.now)
    }

    fn schedule_once(&mut self, delay: Duration, task: T) -> Result<TimerHandle, ClockError> {
        let handle = self.queue.insert(self.now, delay, None, task)?;
        trace!(handle = handle.id(), ?delay, "scheduled one-shot timer");
        Ok(handle)
    }

    fn schedule_repeating(
        &mut self,
        interval: Duration,
        task: T,
    ) -> Result<TimerHandle, ClockError> {
        if interval.is_zero() {
            return Err(ClockError::ZeroInterval);
        }
        let handle = self.queue.insert(self.now, interval, Some(interval), task)?;
        trace!(handle = handle.id(), ?interval, "scheduled repeating timer");
        Ok(handle)
    }

    fn cancel(&mut self, handle: TimerHandle) -> bool {
        self.queue.remove(handle)
    }

    fn is_pending(&self, handle: TimerHandle) -> bool {
        self.queue.contains(handle)
    }

    fn pending_count(&self) -> usize {
        self.queue.len()
    }

    fn next_deadline(&self) -> Option<Duration> {
        self.queue.next_deadline()
    }

    fn fire_next(&mut self, until: Duration) -> Option<Fired<T>> {
        let fired = self.queue.pop_due(until)?;
        self.now = self.now.max(fired.deadline);
        Some(fired)
    }

    fn advance_to(&mut self, at: Duration) {
        self.now = self.now.max(at);
    }
}

/// Real-time clock. Deadlines are measured against [`Instant::now`].
#[derive(Debug, Clone)]
pub struct SystemClock<T> {
    started: Instant,
    origin: DateTime<Utc>,
    queue: TimerQueue<T>,
}

impl<T: Clone> SystemClock<T> {
    pub fn new() -> Self {
        Self {
            started: Instant::now(),
            origin: Utc::now(),
            queue: TimerQueue::new(),
        }
    }

    /// The instant a deadline corresponds to, for async sleeps.
    ///
    /// `None` when the deadline is beyond what [`Instant`] can represent.
    pub fn instant_at(&self, deadline: Duration) -> Option<Instant> {
        self.started.checked_add(deadline)
    }
}

impl<T: Clone> Default for SystemClock<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Clone> ClockSource<T> for SystemClock<T> {
    fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }

    fn wall_time(&self) -> DateTime<Utc> {
        offset_wall_time(self.origin, self.elapsed())
    }

    fn schedule_once(&mut self, delay: Duration, task: T) -> Result<TimerHandle, ClockError> {
        self.queue.insert(self.elapsed(), delay, None, task)
    }

    fn schedule_repeating(
        &mut self,
        interval: Duration,
        task: T,
    ) -> Result<TimerHandle, ClockError> {
        if interval.is_zero() {
            return Err(ClockError::ZeroInterval);
        }
        self.queue.insert(self.elapsed(), interval, Some(interval), task)
    }

    fn cancel(&mut self, handle: TimerHandle) -> bool {
        self.queue.remove(handle)
    }

    fn is_pending(&self, handle: TimerHandle) -> bool {
        self.queue.contains(handle)
    }

    fn pending_count(&self) -> usize {
        self.queue.len()
    }

    fn next_deadline(&self) -> Option<Duration> {
        self.queue.next_deadline()
    }

    fn fire_next(&mut self, until: Duration) -> Option<Fired<T>> {
        let limit = until.min(self.elapsed());
        self.queue.pop_due(limit)
    }
}
