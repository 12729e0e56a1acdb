//! Business-rule rejections for the sessions domain

use axum::http::StatusCode;
use serde_json::json;
use skillgate_common::{Error, Rejection};
use thiserror::Error;
use uuid::Uuid;

use crate::domain::state::{SessionEvent, SessionStatus};

#[derive(Debug, Error, Clone, PartialEq)]
pub enum SessionError {
    #[error("No access to a scored attempt of this test type")]
    AccessDenied,

    #[error("A test of this type is already in progress")]
    AlreadyActive { session_id: Option<Uuid> },

    #[error("Test is not active (status {status})")]
    NotActive { status: SessionStatus },

    #[error("Cannot {event} a test in status {status}")]
    InvalidState {
        status: SessionStatus,
        event: SessionEvent,
    },

    #[error("Invalid session state: {0}")]
    WorkingState(String),
}

impl SessionError {
    pub fn code(&self) -> &'static str {
        match self {
            Self::AccessDenied => "ACCESS_DENIED",
            Self::AlreadyActive { .. } => "ALREADY_ACTIVE",
            Self::NotActive { .. } => "NOT_ACTIVE",
            Self::InvalidState { .. } => "INVALID_STATE",
            Self::WorkingState(_) => "VALIDATION_ERROR",
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            Self::AccessDenied => StatusCode::FORBIDDEN,
            Self::WorkingState(_) => StatusCode::BAD_REQUEST,
            Self::AlreadyActive { .. } | Self::NotActive { .. } | Self::InvalidState { .. } => {
                StatusCode::CONFLICT
            }
        }
    }
}

impl From<SessionError> for Error {
    fn from(err: SessionError) -> Self {
        let err = match err {
            SessionError::WorkingState(msg) => return Error::Validation(msg),
            other => other,
        };

        let rejection = Rejection::new(err.code(), err.status(), err.to_string());
        let rejection = match &err {
            SessionError::AlreadyActive {
                session_id: Some(id),
            } => rejection.with_details(json!({ "session_id": id })),
            SessionError::NotActive { status } | SessionError::InvalidState { status, .. } => {
                rejection.with_details(json!({ "status": status }))
            }
            _ => rejection,
        };
        Error::Rejected(rejection)
    }
}
