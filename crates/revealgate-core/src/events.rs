use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::VerifyError;
use crate::session::SessionState;

/// Every state change in a session produces an Event.
/// Presenters render them; the CLI prints them as JSON.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Event {
    CodeIssued {
        code: String,
        visible_until: DateTime<Utc>,
        at: DateTime<Utc>,
    },
    CodeHidden {
        at: DateTime<Utc>,
    },
    VerificationAccepted {
        at: DateTime<Utc>,
    },
    VerificationFailed {
        reason: FailureReason,
        at: DateTime<Utc>,
    },
    CountdownTick {
        remaining: u32,
        at: DateTime<Utc>,
    },
    /// The countdown ran out before the unlock arrived.
    CountdownExpired {
        at: DateTime<Utc>,
    },
    Revealed {
        message: String,
        at: DateTime<Utc>,
    },
    Cleared {
        at: DateTime<Utc>,
    },
    /// The waiting view went away while counting; the unlock was cancelled.
    WaitingDismissed {
        at: DateTime<Utc>,
    },
    SessionDisposed {
        cancelled_timers: usize,
        at: DateTime<Utc>,
    },
    StateSnapshot {
        session_id: Uuid,
        state: SessionState,
        code_visible: bool,
        countdown_remaining: Option<u32>,
        message: String,
        pending_timers: usize,
        at: DateTime<Utc>,
    },
}

/// Serializable form of [`VerifyError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureReason {
    Mismatch,
    NoActiveCode,
}

impl From<VerifyError> for FailureReason {
    fn from(err: VerifyError) -> Self {
        match err {
            VerifyError::Mismatch => FailureReason::Mismatch,
            VerifyError::NoActiveCode => FailureReason::NoActiveCode,
        }
    }
}

impl From<FailureReason> for VerifyError {
    fn from(reason: FailureReason) -> Self {
        match reason {
            FailureReason::Mismatch => VerifyError::Mismatch,
            FailureReason::NoActiveCode => VerifyError::NoActiveCode,
        }
    }
}

impl Event {
    pub fn at(&self) -> DateTime<Utc> {
        match self {
            Event::CodeIssued { at, .. }
            | Event::CodeHidden { at }
            | Event::VerificationAccepted { at }
            | Event::VerificationFailed { at, .. }
            | Event::CountdownTick { at, .. }
            | Event::CountdownExpired { at }
            | Event::Revealed { at, .. }
            | Event::Cleared { at }
            | Event::WaitingDismissed { at }
            | Event::SessionDisposed { at, .. }
            | Event::StateSnapshot { at, .. } => *at,
        }
    }

    /// The `type` tag this event serializes with.
    pub fn kind(&self) -> &'static str {
        match self {
            Event::CodeIssued { .. } => "code_issued",
            Event::CodeHidden { .. } => "code_hidden",
            Event::VerificationAccepted { .. } => "verification_accepted",
            Event::VerificationFailed { .. } => "verification_failed",
            Event::CountdownTick { .. } => "countdown_tick",
            Event::CountdownExpired { .. } => "countdown_expired",
            Event::Revealed { .. } => "revealed",
            Event::Cleared { .. } => "cleared",
            Event::WaitingDismissed { .. } => "waiting_dismissed",
            Event::SessionDisposed { .. } => "session_disposed",
            Event::StateSnapshot { .. } => "state_snapshot",
        }
    }
}
