//! Access request review state machine
//!
//! ```text
//! PENDING --approve--> APPROVED   [terminal]
//! PENDING --deny-----> DENIED     [terminal]
//! ```

use serde::{Deserialize, Serialize};
use skillgate_common::StateError;

/// Access request status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "request_status", rename_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RequestStatus {
    Pending,
    Approved,
    Denied,
}

impl RequestStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Approved | Self::Denied)
    }
}

impl std::fmt::Display for RequestStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Pending => write!(f, "PENDING"),
            Self::Approved => write!(f, "APPROVED"),
            Self::Denied => write!(f, "DENIED"),
        }
    }
}

/// Admin decisions on a request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestEvent {
    Approve,
    Deny,
}

impl std::fmt::Display for RequestEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Approve => write!(f, "approve"),
            Self::Deny => write!(f, "deny"),
        }
    }
}

pub struct RequestReviewStateMachine;

impl RequestReviewStateMachine {
    pub fn transition(
        current: RequestStatus,
        event: RequestEvent,
    ) -> Result<RequestStatus, StateError> {
        if current.is_terminal() {
            return Err(StateError::TerminalState(current.to_string()));
        }

        match (current, event) {
            (RequestStatus::Pending, RequestEvent::Approve) => Ok(RequestStatus::Approved),
            (RequestStatus::Pending, RequestEvent::Deny) => Ok(RequestStatus::Denied),
            (from, event) => Err(StateError::invalid(from, event)),
        }
    }

    pub fn can_transition(current: RequestStatus, event: RequestEvent) -> bool {
        Self::transition(current, event).is_ok()
    }
}
