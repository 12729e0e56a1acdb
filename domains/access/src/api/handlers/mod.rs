//! HTTP handlers for the access domain

pub mod audit;
pub mod codes;
pub mod entitlements;
pub mod requests;
pub mod test_types;

use skillgate_common::{Error, Result};

use crate::api::middleware::AccessState;
use crate::domain::entities::{TestType, TestTypeKey};

/// Resolve a UUID-or-slug path/body value to a test type
pub(crate) async fn resolve_test_type(state: &AccessState, raw: &str) -> Result<TestType> {
    let key = TestTypeKey::parse(raw);
    state
        .repos
        .test_types
        .resolve(&key)
        .await?
        .ok_or_else(|| Error::NotFound(format!("Test type not found: {}", key)))
}

pub(crate) fn begin_failed(e: sqlx::Error) -> Error {
    Error::Internal(format!("Failed to begin transaction: {}", e))
}

pub(crate) fn commit_failed(e: sqlx::Error) -> Error {
    Error::Internal(format!("Failed to commit transaction: {}", e))
}
