//! Test session state machine
//!
//! ```text
//! (none) --start--> STARTED --pause--> PAUSED --resume--> STARTED
//! STARTED --record_progress--> STARTED
//! STARTED --complete--> COMPLETED          [terminal]
//! STARTED/PAUSED --cancel--> CANCELLED     [terminal]
//! ```

use serde::{Deserialize, Serialize};
use skillgate_audit::AuditSessionStatus;
use skillgate_common::StateError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "session_status", rename_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SessionStatus {
    Started,
    Paused,
    Completed,
    Cancelled,
}

impl SessionStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Cancelled)
    }

    /// Counts toward the one-running-attempt rule
    pub fn is_active(&self) -> bool {
        matches!(self, Self::Started | Self::Paused)
    }

    pub fn valid_transitions(&self) -> &'static [SessionStatus] {
        match self {
            Self::Started => &[Self::Started, Self::Paused, Self::Completed, Self::Cancelled],
            Self::Paused => &[Self::Started, Self::Cancelled],
            Self::Completed | Self::Cancelled => &[],
        }
    }
}

impl std::fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Started => write!(f, "STARTED"),
            Self::Paused => write!(f, "PAUSED"),
            Self::Completed => write!(f, "COMPLETED"),
            Self::Cancelled => write!(f, "CANCELLED"),
        }
    }
}

impl From<SessionStatus> for AuditSessionStatus {
    fn from(status: SessionStatus) -> Self {
        match status {
            SessionStatus::Started => Self::Started,
            SessionStatus::Paused => Self::Paused,
            SessionStatus::Completed => Self::Completed,
            SessionStatus::Cancelled => Self::Cancelled,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEvent {
    Pause,
    Resume,
    RecordProgress,
    Complete,
    Cancel,
}

impl std::fmt::Display for SessionEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Pause => write!(f, "pause"),
            Self::Resume => write!(f, "resume"),
            Self::RecordProgress => write!(f, "record_progress"),
            Self::Complete => write!(f, "complete"),
            Self::Cancel => write!(f, "cancel"),
        }
    }
}

pub struct SessionStateMachine;

impl SessionStateMachine {
    pub fn transition(
        current: SessionStatus,
        event: SessionEvent,
    ) -> Result<SessionStatus, StateError> {
        if current.is_terminal() {
            return Err(StateError::TerminalState(current.to_string()));
        }

        let next = match (current, event) {
            (SessionStatus::Started, SessionEvent::Pause) => SessionStatus::Paused,
            (SessionStatus::Paused, SessionEvent::Resume) => SessionStatus::Started,
            (SessionStatus::Started, SessionEvent::RecordProgress) => SessionStatus::Started,
            (SessionStatus::Started, SessionEvent::Complete) => SessionStatus::Completed,
            (SessionStatus::Started | SessionStatus::Paused, SessionEvent::Cancel) => {
                SessionStatus::Cancelled
            }
            (from, event) => return Err(StateError::invalid(from, event)),
        };

        Ok(next)
    }

    pub fn can_transition(current: SessionStatus, event: SessionEvent) -> bool {
        Self::transition(current, event).is_ok()
    }
}
