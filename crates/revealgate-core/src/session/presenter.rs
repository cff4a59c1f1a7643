//! The seam between the session and whatever renders it.

use crate::error::VerifyError;
use crate::events::Event;

/// Receives session output. Every callback defaults to a no-op.
///
/// The controller only calls [`on_event`](Presenter::on_event); its default
/// routes each event to the narrower callbacks below, so implementors can
/// override either level.
pub trait Presenter {
    fn on_code_issued(&mut self, _code: &str) {}

    fn on_code_hidden(&mut self) {}

    fn on_verification_failed(&mut self, _reason: VerifyError) {}

    fn on_countdown_tick(&mut self, _remaining: u32) {}

    fn on_revealed(&mut self, _message: &str) {}

    fn on_cleared(&mut self) {}

    fn on_event(&mut self, event: &Event) {
        route_event(self, event);
    }
}

/// Forward `event` to the matching narrow callback of `presenter`.
///
/// Events without a narrow callback are dropped.
pub fn route_event<P: Presenter + ?Sized>(presenter: &mut P, event: &Event) {
    match event {
        Event::CodeIssued { code, .. } => presenter.on_code_issued(code),
        Event::CodeHidden { .. } => presenter.on_code_hidden(),
        Event::VerificationFailed { reason, .. } => {
            presenter.on_verification_failed((*reason).into());
        }
        Event::CountdownTick { remaining, .. } => presenter.on_countdown_tick(*remaining),
        Event::Revealed { message, .. } => presenter.on_revealed(message),
        Event::Cleared { .. } => presenter.on_cleared(),
        _ => {}
    }
}

/// Discards everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullPresenter;

impl Presenter for NullPresenter {}

/// Keeps every event in order.
#[derive(Debug, Clone, Default)]
pub struct EventRecorder {
    events: Vec<Event>,
}

impl EventRecorder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> &[Event] {
        &self.events
    }

    pub fn kinds(&self) -> Vec<&'static str> {
        self.events.iter().map(Event::kind).collect()
    }

    pub fn ticks(&self) -> Vec<u32> {
        self.events
            .iter()
            .filter_map(|e| match e {
                Event::CountdownTick { remaining, .. } => Some(*remaining),
                _ => None,
            })
            .collect()
    }

    pub fn revealed(&self) -> Vec<&str> {
        self.events
            .iter()
            .filter_map(|e| match e {
                Event::Revealed { message, .. } => Some(message.as_str()),
                _ => None,
            })
            .collect()
    }
}

impl Presenter for EventRecorder {
    fn on_event(&mut self, event: &Event) {
        self.events.push(event.clone());
    }
}
