//! Terminal rendering of session events.

use revealgate_core::session::route_event;
use revealgate_core::{Event, Presenter, VerifyError};

/// Prints events to stdout, either as JSON lines or as plain text.
#[derive(Debug, Clone, Copy)]
pub struct TerminalPresenter {
    json: bool,
}

impl TerminalPresenter {
    pub fn new(json: bool) -> Self {
        Self { json }
    }
}

impl Presenter for TerminalPresenter {
    fn on_code_issued(&mut self, code: &str) {
        println!("Your code: {code}");
    }

    fn on_code_hidden(&mut self) {
        println!("(code hidden) Enter code:");
    }

    fn on_verification_failed(&mut self, reason: VerifyError) {
        println!("Error: {reason}");
    }

    fn on_countdown_tick(&mut self, remaining: u32) {
        println!("{remaining}");
    }

    fn on_revealed(&mut self, message: &str) {
        println!("{message}");
    }

    fn on_cleared(&mut self) {
        println!("(message cleared)");
    }

    fn on_event(&mut self, event: &Event) {
        if !self.json {
            match event {
                Event::WaitingDismissed { .. } => println!("(waiting cancelled) Enter code:"),
                Event::SessionDisposed { .. } => println!("(session closed)"),
                other => route_event(self, other),
            }
            return;
        }
        match serde_json::to_string(event) {
            Ok(line) => println!("{line}"),
            Err(err) => tracing::warn!(%err, kind = event.kind(), "failed to encode event"),
        }
    }
}
