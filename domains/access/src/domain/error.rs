//! Business-rule rejections for the access domain

use axum::http::StatusCode;
use serde_json::json;
use skillgate_common::{Error, Rejection};
use thiserror::Error;

use crate::domain::codes::CodeGenerationError;
use crate::domain::entities::AccessLevel;
use crate::domain::state::RequestStatus;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum AccessError {
    #[error("Code has already been used")]
    AlreadyUsed,

    #[error("Code has expired")]
    Expired,

    #[error("Already entitled to this test type with {level} access")]
    AlreadyEntitled { level: AccessLevel },

    #[error("No eligible test types: each already has a pending request or active access")]
    NoEligibleTypes,

    #[error("Request has already been processed ({status})")]
    AlreadyProcessed { status: RequestStatus },

    #[error("Code has been used or is attached to a test session")]
    CodeInUse,

    #[error("Code is already inactive")]
    CodeInactive,

    #[error("Could not generate a unique code after {attempts} attempts")]
    GenerationExhausted { attempts: u32 },
}

impl AccessError {
    pub fn code(&self) -> &'static str {
        match self {
            Self::AlreadyUsed => "ALREADY_USED",
            Self::Expired => "EXPIRED",
            Self::AlreadyEntitled { .. } => "ALREADY_ENTITLED",
            Self::NoEligibleTypes => "NO_ELIGIBLE_TYPES",
            Self::AlreadyProcessed { .. } => "ALREADY_PROCESSED",
            Self::CodeInUse => "CODE_IN_USE",
            Self::CodeInactive => "CODE_INACTIVE",
            Self::GenerationExhausted { .. } => "GENERATION_EXHAUSTED",
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            Self::Expired => StatusCode::GONE,
            Self::NoEligibleTypes => StatusCode::UNPROCESSABLE_ENTITY,
            Self::GenerationExhausted { .. } => StatusCode::INTERNAL_SERVER_ERROR,
            Self::AlreadyUsed
            | Self::AlreadyEntitled { .. }
            | Self::AlreadyProcessed { .. }
            | Self::CodeInUse
            | Self::CodeInactive => StatusCode::CONFLICT,
        }
    }
}

impl From<AccessError> for Error {
    fn from(err: AccessError) -> Self {
        let rejection = Rejection::new(err.code(), err.status(), err.to_string());
        let rejection = match &err {
            AccessError::AlreadyEntitled { level } => {
                rejection.with_details(json!({ "access_level": level }))
            }
            AccessError::AlreadyProcessed { status } => {
                rejection.with_details(json!({ "status": status }))
            }
            _ => rejection,
        };
        Error::Rejected(rejection)
    }
}

impl From<CodeGenerationError> for Error {
    fn from(err: CodeGenerationError) -> Self {
        match err {
            CodeGenerationError::Exhausted { attempts } => {
                tracing::error!(attempts, "Code generation exhausted its retry budget");
                AccessError::GenerationExhausted { attempts }.into()
            }
            CodeGenerationError::Store(e) => Error::Database(e),
        }
    }
}
