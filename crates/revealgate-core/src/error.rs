//! Core error types for revealgate-core.
//!
//! Every failure in this crate is local and recoverable. The hierarchy is
//! built with thiserror and folded into [`CoreError`] for callers that do not
//! care which layer failed.

use std::path::PathBuf;
use thiserror::Error;

use crate::session::SessionState;

/// Core error type for revealgate-core.
#[derive(Error, Debug)]
pub enum CoreError {
    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Session state machine errors
    #[error("Session error: {0}")]
    Session(#[from] SessionError),

    /// Timer scheduling errors
    #[error("Clock error: {0}")]
    Clock(#[from] ClockError),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Why a submitted code was not accepted.
///
/// Neither case is fatal: the presenter is told and the user may retry.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum VerifyError {
    /// The candidate differs from the issued code.
    #[error("Incorrect code")]
    Mismatch,

    /// Nothing has been issued yet. Fails closed.
    #[error("No code has been issued")]
    NoActiveCode,
}

/// State machine errors.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SessionError {
    /// The operation is not valid from the current state.
    #[error("Cannot {operation} while {state:?}")]
    InvalidTransition {
        operation: &'static str,
        state: SessionState,
    },

    /// The session was disposed and accepts no further commands.
    #[error("Session has been disposed")]
    Disposed,
}

/// Timer scheduling errors.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ClockError {
    /// A repeating timer needs a non-zero period.
    #[error("Repeating timer interval must be greater than zero")]
    ZeroInterval,

    /// The deadline does not fit on the clock.
    #[error("Timer delay {delay:?} overflows the clock")]
    DeadlineOverflow { delay: std::time::Duration },
}

/// Configuration-specific errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Failed to load configuration
    #[error("Failed to load configuration from {path}: {message}")]
    LoadFailed { path: PathBuf, message: String },

    /// Failed to save configuration
    #[error("Failed to save configuration to {path}: {message}")]
    SaveFailed { path: PathBuf, message: String },

    /// Invalid configuration value
    #[error("Invalid configuration value for '{key}': {message}")]
    InvalidValue { key: String, message: String },

    /// Key does not exist in the configuration tree
    #[error("Unknown configuration key: {0}")]
    UnknownKey(String),

    /// Failed to parse configuration
    #[error("Failed to parse configuration: {0}")]
    ParseFailed(String),
}

/// Result type alias for CoreError
pub type Result<T, E = CoreError> = std::result::Result<T, E>;
