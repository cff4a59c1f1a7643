//! One-time code issuance and verification.
//!
//! A [`CodeChallenge`] holds at most one active [`Code`]. Issuing a new one
//! replaces the old one. The code is shown for a fixed display window and
//! then hidden, but hiding never invalidates it: it stays valid for
//! comparison until it is replaced or the session ends.

use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};
use rand::Rng;
use rand::SeedableRng;
use rand_pcg::Mcg128Xsl64;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::clock::{ClockSource, TimerHandle};
use crate::error::{ClockError, VerifyError};

/// Longest code that still fits the `u32` draw range.
pub const MAX_CODE_DIGITS: u8 = 9;

/// Source of the numbers codes are made from.
pub trait CodeSource {
    /// A value in `[0, upper)`. Larger values are reduced modulo `upper`.
    fn draw(&mut self, upper: u32) -> u32;
}

impl<F> CodeSource for F
where
    F: FnMut(u32) -> u32,
{
    fn draw(&mut self, upper: u32) -> u32 {
        self(upper)
    }
}

/// Uniform draws from a PCG generator.
#[derive(Debug, Clone)]
pub struct SeededCodeSource {
    rng: Mcg128Xsl64,
}

impl SeededCodeSource {
    /// Reproducible source when `seed` is set, OS entropy otherwise.
    pub fn new(seed: Option<u64>) -> Self {
        let rng = match seed {
            Some(seed) => Mcg128Xsl64::seed_from_u64(seed),
            None => Mcg128Xsl64::from_entropy(),
        };
        Self { rng }
    }
}

impl CodeSource for SeededCodeSource {
    fn draw(&mut self, upper: u32) -> u32 {
        self.rng.gen_range(0..upper)
    }
}

/// An issued code.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Code {
    value: String,
    issued_at: DateTime<Utc>,
    visible_until: DateTime<Utc>,
}

impl Code {
    pub fn value(&self) -> &str {
        &self.value
    }

    pub fn issued_at(&self) -> DateTime<Utc> {
        self.issued_at
    }

    pub fn visible_until(&self) -> DateTime<Utc> {
        self.visible_until
    }
}

/// Zero-pad `value` to exactly `digits` characters.
pub fn format_code(value: u32, digits: u8) -> String {
    format!("{:0width$}", value, width = usize::from(digits))
}

fn code_space(digits: u8) -> u32 {
    10u32.pow(u32::from(digits.clamp(1, MAX_CODE_DIGITS)))
}

/// Issues and verifies the session's one-time code.
pub struct CodeChallenge {
    source: Box<dyn CodeSource + Send>,
    digits: u8,
    display_window: Duration,
    active: Option<Code>,
    visible: bool,
    hide_timer: Option<TimerHandle>,
}

impl std::fmt::Debug for CodeChallenge {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CodeChallenge")
            .field("digits", &self.digits)
            .field("display_window", &self.display_window)
            .field("active", &self.active)
            .field("visible", &self.visible)
            .field("hide_timer", &self.hide_timer)
            .finish_non_exhaustive()
    }
}

impl CodeChallenge {
    /// `digits` is clamped to `1..=MAX_CODE_DIGITS`.
    pub fn new(source: impl CodeSource + Send + 'static, digits: u8, display_window: Duration) -> Self {
        Self {
            source: Box::new(source),
            digits: digits.clamp(1, MAX_CODE_DIGITS),
            display_window,
            active: None,
            visible: false,
            hide_timer: None,
        }
    }

    pub fn active(&self) -> Option<&Code> {
        self.active.as_ref()
    }

    pub fn is_visible(&self) -> bool {
        self.visible && self.active.is_some()
    }

    pub fn hide_timer(&self) -> Option<TimerHandle> {
        self.hide_timer
    }

    /// Issue a fresh code and schedule `hide_task` after the display window.
    ///
    /// Any previous code is replaced and its pending hide timer cancelled.
    /// Nothing changes when the hide timer cannot be scheduled.
    pub fn issue<T, C>(&mut self, clock: &mut C, hide_task: T) -> Result<&Code, ClockError>
    where
        C: ClockSource<T>,
    {
        let hide_timer = clock.schedule_once(self.display_window, hide_task)?;
        self.cancel_hide(clock);

        let upper = code_space(self.digits);
        let value = self.source.draw(upper) % upper;
        let issued_at = clock.wall_time();
        let window = TimeDelta::from_std(self.display_window).unwrap_or(TimeDelta::zero());

        self.hide_timer = Some(hide_timer);
        self.visible = true;
        debug!(digits = self.digits, "issued code");

        Ok(self.active.insert(Code {
            value: format_code(value, self.digits),
            issued_at,
            visible_until: issued_at + window,
        }))
    }

    /// Hide the code. It remains valid for [`verify`](Self::verify).
    ///
    /// Returns `true` if the code was visible.
    pub fn hide(&mut self) -> bool {
        self.hide_timer = None;
        std::mem::replace(&mut self.visible, false)
    }

    /// Cancel a pending hide timer without touching visibility.
    pub fn cancel_hide<T, C>(&mut self, clock: &mut C)
    where
        C: ClockSource<T>,
    {
        if let Some(handle) = self.hide_timer.take() {
            clock.cancel(handle);
        }
    }

    /// Exact byte-for-byte comparison against the active code.
    pub fn check(&self, candidate: &str) -> Result<(), VerifyError> {
        match &self.active {
            None => Err(VerifyError::NoActiveCode),
            Some(code) if code.value.as_bytes() == candidate.as_bytes() => Ok(()),
            Some(_) => Err(VerifyError::Mismatch),
        }
    }

    pub fn verify(&self, candidate: &str) -> bool {
        self.check(candidate).is_ok()
    }
}
