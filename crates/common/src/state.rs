//! Common state machine error types
//!
//! Shared by the request-review and test-session state machines.

use thiserror::Error;

/// Errors that can occur during state transitions
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StateError {
    #[error("Invalid transition: cannot apply {event} from {from}")]
    InvalidTransition { from: String, event: String },

    #[error("Guard condition failed: {0}")]
    GuardFailed(String),

    #[error("Terminal state: {0} is a terminal state and cannot transition")]
    TerminalState(String),
}

impl StateError {
    pub fn invalid(from: impl std::fmt::Display, event: impl std::fmt::Display) -> Self {
        Self::InvalidTransition {
            from: from.to_string(),
            event: event.to_string(),
        }
    }

    /// Whether the rejection happened because the entity already finished
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::TerminalState(_))
    }
}
