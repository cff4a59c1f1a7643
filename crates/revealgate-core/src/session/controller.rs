//! Reveal session state machine.
//!
//! Owns the clock, the presenter and every timer-backed component, and is the
//! only thing that mutates them. Fired timers are dispatched one at a time,
//! so the unlock stopping the countdown can never interleave with a tick.
//!
//! ## State Transitions
//!
//! ```text
//! AwaitingCode -> CodeVisible -> AwaitingVerification -> Counting -> Revealed -> Cleared
//!                      ^                 |    ^              |
//!                      +---- reissue ----+    +-- dismiss ---+
//! ```
//!
//! ## Usage
//!
//! ```ignore
//! let mut session = RevealController::new(&config, ManualClock::new(), EventRecorder::new())?;
//! session.issue_code()?;
//! session.submit_code("0423")?;
//! session.advance(Duration::from_secs(18));
//! ```

use std::time::Duration;

use tracing::{debug, info, info_span, warn, Span};
use uuid::Uuid;

use super::presenter::Presenter;
use super::{SessionState, Submission, Timeout};
use crate::challenge::{CodeChallenge, CodeSource, SeededCodeSource};
use crate::clock::{ClockSource, Fired, TimerHandle};
use crate::error::{Result, SessionError};
use crate::events::Event;
use crate::storage::RevealConfig;
use crate::timer::{Countdown, CountdownStep, UnlockTimer};

pub struct RevealController<C, P> {
    id: Uuid,
    config: RevealConfig,
    clock: C,
    presenter: P,
    state: SessionState,
    challenge: CodeChallenge,
    countdown: Countdown,
    unlock: UnlockTimer,
    clear_timer: Option<TimerHandle>,
    message: String,
    disposed: bool,
    span: Span,
}

impl<C, P> std::fmt::Debug for RevealController<C, P> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RevealController")
            .field("id", &self.id)
            .field("state", &self.state)
            .field("challenge", &self.challenge)
            .field("countdown", &self.countdown)
            .field("unlock", &self.unlock)
            .field("clear_timer", &self.clear_timer)
            .field("disposed", &self.disposed)
            .finish_non_exhaustive()
    }
}

impl<C, P> RevealController<C, P>
where
    C: ClockSource<Timeout>,
    P: Presenter,
{
    /// Create a session whose codes come from `config.seed` (or entropy).
    pub fn new(config: &RevealConfig, clock: C, presenter: P) -> Result<Self> {
        let source = SeededCodeSource::new(config.seed);
        Self::with_code_source(config, source, clock, presenter)
    }

    pub fn with_code_source(
        config: &RevealConfig,
        source: impl CodeSource + Send + 'static,
        clock: C,
        presenter: P,
    ) -> Result<Self> {
        config.validate()?;
        let id = Uuid::new_v4();
        Ok(Self {
            id,
            config: config.clone(),
            clock,
            presenter,
            state: SessionState::AwaitingCode,
            challenge: CodeChallenge::new(source, config.code_digits, config.code_display()),
            countdown: Countdown::new(),
            unlock: UnlockTimer::new(),
            clear_timer: None,
            message: String::new(),
            disposed: false,
            span: info_span!("session", id = %id),
        })
    }

    // ── Queries ──────────────────────────────────────────────────────

    pub fn session_id(&self) -> Uuid {
        self.id
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn config(&self) -> &RevealConfig {
        &self.config
    }

    /// Currently displayed payload. Empty unless revealed.
    pub fn message(&self) -> &str {
        &self.message
    }

    /// The active code, visible or not.
    pub fn code(&self) -> Option<&str> {
        self.challenge.active().map(|c| c.value())
    }

    pub fn is_code_visible(&self) -> bool {
        self.challenge.is_visible()
    }

    /// Countdown value while counting.
    pub fn countdown_remaining(&self) -> Option<u32> {
        self.countdown.is_running().then(|| self.countdown.remaining())
    }

    pub fn is_disposed(&self) -> bool {
        self.disposed
    }

    pub fn next_deadline(&self) -> Option<Duration> {
        self.clock.next_deadline()
    }

    pub fn pending_timers(&self) -> usize {
        self.clock.pending_count()
    }

    pub fn clock(&self) -> &C {
        &self.clock
    }

    pub fn presenter(&self) -> &P {
        &self.presenter
    }

    pub fn presenter_mut(&mut self) -> &mut P {
        &mut self.presenter
    }

    pub fn into_presenter(self) -> P {
        self.presenter
    }

    /// Build a full state snapshot event.
    pub fn snapshot(&self) -> Event {
        Event::StateSnapshot {
            session_id: self.id,
            state: self.state,
            code_visible: self.is_code_visible(),
            countdown_remaining: self.countdown_remaining(),
            message: self.message.clone(),
            pending_timers: self.clock.pending_count(),
            at: self.clock.wall_time(),
        }
    }

    // ── Commands ─────────────────────────────────────────────────────

    /// Issue a fresh code and show it. Replaces any earlier code.
    pub fn issue_code(&mut self) -> Result<String> {
        let _enter = self.span.clone().entered();
        self.ensure_live()?;
        if !self.state.can_issue() {
            return Err(self.invalid("issue a code"));
        }

        let code = self
            .challenge
            .issue(&mut self.clock, Timeout::HideCode)?
            .clone();
        self.state = SessionState::CodeVisible;
        info!(state = ?self.state, "code issued");

        self.emit(Event::CodeIssued {
            code: code.value().to_string(),
            visible_until: code.visible_until(),
            at: code.issued_at(),
        });
        Ok(code.value().to_string())
    }

    /// Check `candidate` against the active code.
    ///
    /// A match starts the countdown and the unlock together. A miss is
    /// reported to the presenter and leaves the session ready for a retry.
    pub fn submit_code(&mut self, candidate: &str) -> Result<Submission> {
        let _enter = self.span.clone().entered();
        self.ensure_live()?;
        if !self.state.can_submit() {
            return Err(self.invalid("submit a code"));
        }

        if self.state == SessionState::CodeVisible {
            self.challenge.cancel_hide(&mut self.clock);
            self.hide_code();
        }

        match self.challenge.check(candidate) {
            Ok(()) => {
                self.begin_counting()?;
                Ok(Submission { accepted: true })
            }
            Err(reason) => {
                info!(%reason, "verification failed");
                let at = self.clock.wall_time();
                self.emit(Event::VerificationFailed {
                    reason: reason.into(),
                    at,
                });
                Ok(Submission { accepted: false })
            }
        }
    }

    /// The waiting view went away before the unlock arrived.
    ///
    /// Both timers are cancelled so the unlock can never fire unobserved.
    /// The code stays valid and may be submitted again.
    pub fn dismiss_waiting_view(&mut self) -> Result<()> {
        let _enter = self.span.clone().entered();
        self.ensure_live()?;
        if self.state != SessionState::Counting {
            return Err(self.invalid("dismiss the waiting view"));
        }

        self.countdown.stop(&mut self.clock);
        self.unlock.cancel_pending(&mut self.clock);
        self.state = SessionState::AwaitingVerification;
        info!("waiting view dismissed");

        let at = self.clock.wall_time();
        self.emit(Event::WaitingDismissed { at });
        Ok(())
    }

    /// Cancel every outstanding timer and refuse further commands.
    ///
    /// Idempotent. Returns how many timers were cancelled.
    pub fn dispose(&mut self) -> usize {
        let _enter = self.span.clone().entered();
        if self.disposed {
            return 0;
        }

        let before = self.clock.pending_count();
        self.challenge.cancel_hide(&mut self.clock);
        self.countdown.stop(&mut self.clock);
        self.unlock.cancel_pending(&mut self.clock);
        if let Some(handle) = self.clear_timer.take() {
            self.clock.cancel(handle);
        }
        let cancelled = before.saturating_sub(self.clock.pending_count());
        self.disposed = true;
        info!(cancelled, "session disposed");

        let at = self.clock.wall_time();
        self.emit(Event::SessionDisposed {
            cancelled_timers: cancelled,
            at,
        });
        cancelled
    }

    // ── Driving ──────────────────────────────────────────────────────

    /// Dispatch every timer due at or before `until`, in order.
    ///
    /// Returns the number of timers dispatched.
    pub fn run_until(&mut self, until: Duration) -> usize {
        let _enter = self.span.clone().entered();
        let mut dispatched = 0;
        while let Some(fired) = self.clock.fire_next(until) {
            self.dispatch(fired);
            dispatched += 1;
        }
        self.clock.advance_to(until);
        dispatched
    }

    /// Move the clock forward by `by` and dispatch what came due.
    pub fn advance(&mut self, by: Duration) -> usize {
        let until = self.clock.elapsed().saturating_add(by);
        self.run_until(until)
    }

    /// Dispatch whatever is due now.
    pub fn run_due(&mut self) -> usize {
        let now = self.clock.elapsed();
        self.run_until(now)
    }

    // ── Internal ─────────────────────────────────────────────────────

    fn dispatch(&mut self, fired: Fired<Timeout>) {
        debug!(task = ?fired.task, handle = fired.handle.id(), deadline = ?fired.deadline, "timer fired");
        match fired.task {
            Timeout::HideCode => {
                if self.challenge.hide_timer() == Some(fired.handle) {
                    self.hide_code();
                } else {
                    debug!("stale hide timer ignored");
                }
            }
            Timeout::CountdownTick => match self.countdown.on_tick(&mut self.clock, fired.handle) {
                Some(CountdownStep::Tick(remaining)) => {
                    let at = self.clock.wall_time();
                    self.emit(Event::CountdownTick { remaining, at });
                }
                Some(CountdownStep::Expired) => {
                    info!("countdown expired before unlock");
                    let at = self.clock.wall_time();
                    self.emit(Event::CountdownExpired { at });
                }
                None => debug!("stale countdown tick ignored"),
            },
            Timeout::Unlock => match self.unlock.take_fired(fired.handle) {
                Some(payload) => self.reveal(payload),
                None => warn!("unlock fired with no waiting view; dropped"),
            },
            Timeout::ClearMessage => {
                if self.clear_timer == Some(fired.handle) {
                    self.clear_message();
                } else {
                    debug!("stale clear timer ignored");
                }
            }
        }
    }

    fn hide_code(&mut self) {
        if self.challenge.hide() {
            let at = self.clock.wall_time();
            self.emit(Event::CodeHidden { at });
        }
        if self.state == SessionState::CodeVisible {
            self.state = SessionState::AwaitingVerification;
        }
    }

    fn begin_counting(&mut self) -> Result<()> {
        self.countdown.start(
            &mut self.clock,
            self.config.countdown_start,
            self.config.countdown_interval(),
            Timeout::CountdownTick,
        )?;
        if let Err(err) = self.unlock.start(
            &mut self.clock,
            self.config.unlock_delay(),
            self.config.payload.clone(),
            Timeout::Unlock,
        ) {
            self.countdown.stop(&mut self.clock);
            return Err(err.into());
        }
        self.state = SessionState::Counting;
        info!(state = ?self.state, "code accepted");

        let at = self.clock.wall_time();
        self.emit(Event::VerificationAccepted { at });
        Ok(())
    }

    fn reveal(&mut self, payload: String) {
        self.countdown.stop(&mut self.clock);
        self.message = payload;
        self.state = SessionState::Revealed;
        match self
            .clock
            .schedule_once(self.config.message_clear(), Timeout::ClearMessage)
        {
            Ok(handle) => self.clear_timer = Some(handle),
            Err(err) => warn!(%err, "clear timer not scheduled; clearing now"),
        }
        info!(state = ?self.state, "payload revealed");

        let at = self.clock.wall_time();
        self.emit(Event::Revealed {
            message: self.message.clone(),
            at,
        });
        if self.clear_timer.is_none() {
            self.clear_message();
        }
    }

    fn clear_message(&mut self) {
        self.clear_timer = None;
        self.message.clear();
        self.state = SessionState::Cleared;
        info!(state = ?self.state, "message cleared");
        let at = self.clock.wall_time();
        self.emit(Event::Cleared { at });
    }

    fn emit(&mut self, event: Event) {
        self.presenter.on_event(&event);
    }

    fn ensure_live(&self) -> Result<(), SessionError> {
        if self.disposed {
            Err(SessionError::Disposed)
        } else {
            Ok(())
        }
    }

    fn invalid(&self, operation: &'static str) -> crate::error::CoreError {
        SessionError::InvalidTransition {
            operation,
            state: self.state,
        }
        .into()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::error::CoreError;
    use crate::session::EventRecorder;

    type Session = RevealController<ManualClock<Timeout>, EventRecorder>;

    fn session(code: u32) -> Session {
        RevealController::with_code_source(
            &RevealConfig::default(),
            move |_: u32| code,
            ManualClock::new(),
            EventRecorder::new(),
        )
        .unwrap()
    }

    fn secs(n: u64) -> Duration {
        Duration::from_secs(n)
    }

    #[test]
    fn issue_shows_code_then_hides_after_two_seconds() {
        let mut s = session(423);
        assert_eq!(s.issue_code().unwrap(), "0423");
        assert_eq!(s.state(), SessionState::CodeVisible);
        assert!(s.is_code_visible());

        s.advance(secs(1));
        assert!(s.is_code_visible());
        s.advance(secs(1));
        assert!(!s.is_code_visible());
        assert_eq!(s.state(), SessionState::AwaitingVerification);
        assert_eq!(s.code(), Some("0423"));
        assert_eq!(s.presenter().kinds(), vec!["code_issued", "code_hidden"]);
    }

    #[test]
    fn submit_while_visible_hides_first() {
        let mut s = session(423);
        s.issue_code().unwrap();
        let result = s.submit_code("9999").unwrap();

        assert!(!result.accepted);
        assert_eq!(s.state(), SessionState::AwaitingVerification);
        assert_eq!(s.pending_timers(), 0);
        assert_eq!(
            s.presenter().kinds(),
            vec!["code_issued", "code_hidden", "verification_failed"]
        );
    }

    #[test]
    fn submit_before_issue_fails_closed() {
        let mut s = session(423);
        assert!(!s.submit_code("").unwrap().accepted);
        assert_eq!(s.state(), SessionState::AwaitingCode);
        assert!(matches!(
            s.presenter().events(),
            [Event::VerificationFailed {
                reason: crate::events::FailureReason::NoActiveCode,
                ..
            }]
        ));
    }

    #[test]
    fn unlock_stops_countdown_after_last_tick() {
        let mut s = session(423);
        s.issue_code().unwrap();
        s.advance(secs(2));
        assert!(s.submit_code("0423").unwrap().accepted);
        assert_eq!(s.countdown_remaining(), Some(15));

        s.advance(secs(15));
        assert_eq!(s.state(), SessionState::Revealed);
        assert_eq!(s.presenter().ticks(), (1..=15).rev().collect::<Vec<_>>());
        assert_eq!(s.countdown_remaining(), None);
        // only the clear timer is left
        assert_eq!(s.pending_timers(), 1);
    }

    #[test]
    fn submit_rejected_outside_entry_states() {
        let mut s = session(423);
        s.issue_code().unwrap();
        s.submit_code("0423").unwrap();

        let err = s.submit_code("0423").unwrap_err();
        assert!(matches!(
            err,
            CoreError::Session(SessionError::InvalidTransition {
                state: SessionState::Counting,
                ..
            })
        ));
        assert!(s.issue_code().is_err());
    }

    #[test]
    fn reissue_replaces_code() {
        let mut next = 0u32;
        let mut s: Session = RevealController::with_code_source(
            &RevealConfig::default(),
            move |_: u32| {
                next += 1;
                next
            },
            ManualClock::new(),
            EventRecorder::new(),
        )
        .unwrap();

        assert_eq!(s.issue_code().unwrap(), "0001");
        s.advance(secs(3));
        assert_eq!(s.issue_code().unwrap(), "0002");
        assert_eq!(s.state(), SessionState::CodeVisible);
        assert!(!s.submit_code("0001").unwrap().accepted);
        assert!(s.submit_code("0002").unwrap().accepted);
    }

    #[test]
    fn dismiss_cancels_unlock_and_allows_retry() {
        let mut s = session(423);
        s.issue_code().unwrap();
        s.submit_code("0423").unwrap();
        s.advance(secs(5));

        s.dismiss_waiting_view().unwrap();
        assert_eq!(s.state(), SessionState::AwaitingVerification);
        assert_eq!(s.pending_timers(), 0);

        s.advance(secs(30));
        assert!(s.presenter().revealed().is_empty());

        assert!(s.submit_code("0423").unwrap().accepted);
        s.advance(secs(15));
        assert_eq!(s.presenter().revealed(), vec!["I may be slightly autistic"]);
    }

    #[test]
    fn dispose_cancels_everything_and_is_idempotent() {
        let mut s = session(423);
        s.issue_code().unwrap();
        s.submit_code("0423").unwrap();
        assert_eq!(s.pending_timers(), 2);

        assert_eq!(s.dispose(), 2);
        assert_eq!(s.dispose(), 0);
        assert_eq!(s.pending_timers(), 0);
        assert_eq!(s.advance(secs(60)), 0);
        assert!(matches!(
            s.issue_code(),
            Err(CoreError::Session(SessionError::Disposed))
        ));
        assert!(matches!(
            s.submit_code("0423"),
            Err(CoreError::Session(SessionError::Disposed))
        ));
    }

    #[test]
    fn countdown_longer_than_unlock_never_expires() {
        let config = RevealConfig {
            countdown_start: 30,
            ..RevealConfig::default()
        };
        let mut s: Session = RevealController::with_code_source(
            &config,
            |_: u32| 423,
            ManualClock::new(),
            EventRecorder::new(),
        )
        .unwrap();
        s.issue_code().unwrap();
        s.submit_code("0423").unwrap();
        s.advance(secs(40));

        let kinds = s.presenter().kinds();
        assert!(!kinds.contains(&"countdown_expired"));
        assert_eq!(s.presenter().ticks().last(), Some(&16));
        assert_eq!(s.state(), SessionState::Cleared);
    }

    #[test]
    fn countdown_shorter_than_unlock_expires_first() {
        let config = RevealConfig {
            countdown_start: 5,
            ..RevealConfig::default()
        };
        let mut s: Session = RevealController::with_code_source(
            &config,
            |_: u32| 423,
            ManualClock::new(),
            EventRecorder::new(),
        )
        .unwrap();
        s.issue_code().unwrap();
        s.submit_code("0423").unwrap();
        s.advance(secs(15));

        let kinds = s.presenter().kinds();
        let expired = kinds.iter().position(|k| *k == "countdown_expired").unwrap();
        let revealed = kinds.iter().position(|k| *k == "revealed").unwrap();
        assert!(expired < revealed);
        assert_eq!(s.state(), SessionState::Revealed);
    }

    #[test]
    fn invalid_config_is_rejected() {
        let config = RevealConfig {
            code_digits: 0,
            ..RevealConfig::default()
        };
        let result: Result<Session> =
            RevealController::new(&config, ManualClock::new(), EventRecorder::new());
        assert!(matches!(result, Err(CoreError::Config(_))));
    }

    #[test]
    fn snapshot_reflects_state() {
        let mut s = session(423);
        s.issue_code().unwrap();
        match s.snapshot() {
            Event::StateSnapshot {
                session_id,
                state,
                code_visible,
                countdown_remaining,
                pending_timers,
                ..
            } => {
                assert_eq!(session_id, s.session_id());
                assert_eq!(state, SessionState::CodeVisible);
                assert!(code_visible);
                assert_eq!(countdown_remaining, None);
                assert_eq!(pending_timers, 1);
            }
            _ => panic!("Expected StateSnapshot"),
        }
    }
}
