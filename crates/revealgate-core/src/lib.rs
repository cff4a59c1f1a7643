//! # Revealgate Core Library
//!
//! Coordination logic for a small interactive flow: the user is shown a
//! one-time code, re-enters it to pass a gate, waits through a countdown,
//! and then sees a hidden message that clears itself a few seconds later.
//!
//! ## Architecture
//!
//! - **Clock**: scheduling abstraction with a virtual [`ManualClock`] for
//!   deterministic runs and a real-time [`SystemClock`]
//! - **Challenge**: code issuance, display window and verification
//! - **Timers**: the single-fire [`UnlockTimer`] and the cosmetic [`Countdown`],
//!   deliberately independent of each other
//! - **Session**: the [`RevealController`] state machine that ties them
//!   together and reports to a [`Presenter`]
//!
//! Nothing runs on a background thread. The caller drives the session with
//! `advance`/`run_until`/`run_due`, and every fired timer is dispatched on
//! the caller's thread in deadline order.

pub mod challenge;
pub mod clock;
pub mod error;
pub mod events;
pub mod session;
pub mod storage;
pub mod timer;

pub use challenge::{Code, CodeChallenge, CodeSource, SeededCodeSource};
pub use clock::{ClockSource, Fired, ManualClock, SystemClock, TimerHandle};
pub use error::{ClockError, ConfigError, CoreError, SessionError, VerifyError};
pub use events::{Event, FailureReason};
pub use session::{
    EventRecorder, NullPresenter, Presenter, RevealController, SessionState, Submission, Timeout,
};
pub use storage::RevealConfig;
pub use timer::{Countdown, CountdownStatus, CountdownStep, UnlockTimer};
