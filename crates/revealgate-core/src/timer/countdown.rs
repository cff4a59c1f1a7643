//! Cosmetic per-second countdown.
//!
//! Runs on its own repeating timer, independent of the unlock. A tick first
//! looks at the remaining count: above zero it reports the value and then
//! decrements, at zero it cancels the timer and expires without reporting a
//! zero. Started at 15 this reports 15, 14, ..., 1.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::clock::{ClockSource, TimerHandle};
use crate::error::ClockError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CountdownStatus {
    Idle,
    Running,
    Expired,
    Stopped,
}

/// Outcome of a delivered tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CountdownStep {
    /// Value to display. Already decremented internally.
    Tick(u32),
    /// Reached zero; the timer is cancelled.
    Expired,
}

#[derive(Debug, Clone)]
pub struct Countdown {
    remaining: u32,
    status: CountdownStatus,
    handle: Option<TimerHandle>,
}

impl Default for Countdown {
    fn default() -> Self {
        Self {
            remaining: 0,
            status: CountdownStatus::Idle,
            handle: None,
        }
    }
}

impl Countdown {
    pub fn new() -> Self {
        Self::default()
    }

    // ── Queries ──────────────────────────────────────────────────────

    pub fn remaining(&self) -> u32 {
        self.remaining
    }

    pub fn status(&self) -> CountdownStatus {
        self.status
    }

    pub fn is_running(&self) -> bool {
        self.status == CountdownStatus::Running
    }

    pub fn handle(&self) -> Option<TimerHandle> {
        self.handle
    }

    // ── Commands ─────────────────────────────────────────────────────

    /// Arm a repeating timer for `task`. A running countdown is stopped first.
    pub fn start<T, C>(
        &mut self,
        clock: &mut C,
        initial: u32,
        interval: Duration,
        task: T,
    ) -> Result<(), ClockError>
    where
        C: ClockSource<T>,
    {
        self.stop(clock);
        let handle = clock.schedule_repeating(interval, task)?;
        self.remaining = initial;
        self.status = CountdownStatus::Running;
        self.handle = Some(handle);
        debug!(initial, ?interval, "countdown started");
        Ok(())
    }

    /// Handle a firing of the countdown timer.
    ///
    /// Returns `None` when `handle` is not this countdown's live timer.
    pub fn on_tick<T, C>(&mut self, clock: &mut C, handle: TimerHandle) -> Option<CountdownStep>
    where
        C: ClockSource<T>,
    {
        if !self.is_running() || self.handle != Some(handle) {
            return None;
        }
        if self.remaining > 0 {
            let shown = self.remaining;
            self.remaining -= 1;
            return Some(CountdownStep::Tick(shown));
        }
        clock.cancel(handle);
        self.handle = None;
        self.status = CountdownStatus::Expired;
        debug!("countdown expired");
        Some(CountdownStep::Expired)
    }

    /// Cancel the timer. Idempotent; does nothing after expiry.
    pub fn stop<T, C>(&mut self, clock: &mut C)
    where
        C: ClockSource<T>,
    {
        if let Some(handle) = self.handle.take() {
            clock.cancel(handle);
        }
        if self.status == CountdownStatus::Running {
            self.status = CountdownStatus::Stopped;
            debug!(remaining = self.remaining, "countdown stopped");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;

    fn drive(
        countdown: &mut Countdown,
        clock: &mut ManualClock<()>,
        until: Duration,
    ) -> Vec<(Duration, CountdownStep)> {
        let mut steps = Vec::new();
        while let Some(fired) = clock.fire_next(until) {
            if let Some(step) = countdown.on_tick(clock, fired.handle) {
                steps.push((fired.deadline, step));
            }
        }
        steps
    }

    #[test]
    fn reports_fifteen_down_to_one_then_expires() {
        let mut clock = ManualClock::new();
        let mut countdown = Countdown::new();
        countdown.start(&mut clock, 15, Duration::from_secs(1), ()).unwrap();

        let steps = drive(&mut countdown, &mut clock, Duration::from_secs(60));
        let ticks: Vec<u32> = steps
            .iter()
            .filter_map(|(_, step)| match step {
                CountdownStep::Tick(n) => Some(*n),
                CountdownStep::Expired => None,
            })
            .collect();

        assert_eq!(ticks, (1..=15).rev().collect::<Vec<_>>());
        assert_eq!(steps[0].0, Duration::from_secs(1));
        assert_eq!(steps.last(), Some(&(Duration::from_secs(16), CountdownStep::Expired)));
        assert_eq!(countdown.status(), CountdownStatus::Expired);
        assert_eq!(countdown.remaining(), 0);
        assert_eq!(clock.pending_count(), 0);
    }

    #[test]
    fn stop_mid_sequence_silences_ticks_and_expiry() {
        let mut clock = ManualClock::new();
        let mut countdown = Countdown::new();
        countdown.start(&mut clock, 15, Duration::from_secs(1), ()).unwrap();

        let steps = drive(&mut countdown, &mut clock, Duration::from_secs(6));
        assert_eq!(steps.last().map(|(_, s)| *s), Some(CountdownStep::Tick(10)));

        countdown.stop(&mut clock);
        countdown.stop(&mut clock);
        assert!(drive(&mut countdown, &mut clock, Duration::from_secs(60)).is_empty());
        assert_eq!(countdown.status(), CountdownStatus::Stopped);
        assert_eq!(countdown.remaining(), 9);
    }

    #[test]
    fn stale_tick_is_ignored() {
        let mut clock = ManualClock::new();
        let mut countdown = Countdown::new();
        countdown.start(&mut clock, 3, Duration::from_secs(1), ()).unwrap();
        let old = countdown.handle().unwrap();
        countdown.start(&mut clock, 3, Duration::from_secs(1), ()).unwrap();

        assert_eq!(countdown.on_tick(&mut clock, old), None);
        assert_eq!(countdown.remaining(), 3);
    }

    #[test]
    fn zero_start_expires_on_first_tick() {
        let mut clock = ManualClock::new();
        let mut countdown = Countdown::new();
        countdown.start(&mut clock, 0, Duration::from_secs(1), ()).unwrap();
        let steps = drive(&mut countdown, &mut clock, Duration::from_secs(5));
        assert_eq!(steps, vec![(Duration::from_secs(1), CountdownStep::Expired)]);
    }
}
