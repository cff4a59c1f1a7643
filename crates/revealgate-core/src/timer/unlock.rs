//! Single-fire delayed unlock.
//!
//! Simulates a fixed-latency external "decryption" step: after the delay the
//! payload becomes available exactly once. There is no retry or backoff.

use std::time::Duration;

use tracing::debug;

use crate::clock::{ClockSource, TimerHandle};
use crate::error::ClockError;

#[derive(Debug, Clone)]
struct PendingUnlock {
    handle: TimerHandle,
    payload: String,
}

/// One pending unlock at a time.
#[derive(Debug, Clone, Default)]
pub struct UnlockTimer {
    pending: Option<PendingUnlock>,
}

impl UnlockTimer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Schedule `task` to fire once after `delay`, carrying `payload`.
    ///
    /// A pending unlock from an earlier call is cancelled first.
    pub fn start<T, C>(
        &mut self,
        clock: &mut C,
        delay: Duration,
        payload: impl Into<String>,
        task: T,
    ) -> Result<TimerHandle, ClockError>
    where
        C: ClockSource<T>,
    {
        if let Some(previous) = self.pending.take() {
            clock.cancel(previous.handle);
        }
        let handle = clock.schedule_once(delay, task)?;
        debug!(handle = handle.id(), ?delay, "unlock scheduled");
        self.pending = Some(PendingUnlock {
            handle,
            payload: payload.into(),
        });
        Ok(handle)
    }

    /// Prevent a pending fire. No-op for fired, cancelled or unknown handles.
    pub fn cancel<T, C>(&mut self, clock: &mut C, handle: TimerHandle)
    where
        C: ClockSource<T>,
    {
        if self.pending.as_ref().is_some_and(|p| p.handle == handle) {
            self.pending = None;
            clock.cancel(handle);
            debug!(handle = handle.id(), "unlock cancelled");
        }
    }

    /// Cancel whatever is pending.
    pub fn cancel_pending<T, C>(&mut self, clock: &mut C)
    where
        C: ClockSource<T>,
    {
        if let Some(handle) = self.handle() {
            self.cancel(clock, handle);
        }
    }

    /// Consume the payload when `handle` is the pending unlock.
    pub fn take_fired(&mut self, handle: TimerHandle) -> Option<String> {
        if self.pending.as_ref()?.handle != handle {
            return None;
        }
        self.pending.take().map(|p| p.payload)
    }

    pub fn handle(&self) -> Option<TimerHandle> {
        self.pending.as_ref().map(|p| p.handle)
    }

    pub fn is_pending(&self) -> bool {
        self.pending.is_some()
    }
}
