mod controller;
mod presenter;

pub use controller::RevealController;
pub use presenter::{route_event, EventRecorder, NullPresenter, Presenter};

use serde::{Deserialize, Serialize};

/// Which view the presentation layer should show.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    AwaitingCode,
    CodeVisible,
    AwaitingVerification,
    Counting,
    Revealed,
    /// Terminal. The payload has been wiped.
    Cleared,
}

impl SessionState {
    /// States from which a code may be (re)issued.
    pub fn can_issue(self) -> bool {
        matches!(
            self,
            SessionState::AwaitingCode | SessionState::CodeVisible | SessionState::AwaitingVerification
        )
    }

    /// States from which a candidate may be submitted.
    pub fn can_submit(self) -> bool {
        self.can_issue()
    }

    pub fn is_terminal(self) -> bool {
        self == SessionState::Cleared
    }
}

/// Task carried by every timer a session schedules.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Timeout {
    HideCode,
    CountdownTick,
    Unlock,
    ClearMessage,
}

/// Answer to a submitted candidate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Submission {
    pub accepted: bool,
}
