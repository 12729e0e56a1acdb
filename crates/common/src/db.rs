//! Shared database types for Skillgate
//!
//! This module provides common database-related types used across domain repositories.

use crate::error::Error;
use sqlx::{PgPool, Postgres, Transaction};
use std::time::Duration;
use thiserror::Error;

/// Default bound on any single statement issued inside a transaction
pub const DEFAULT_STATEMENT_TIMEOUT: Duration = Duration::from_secs(15);

/// Database-specific error types
#[derive(Error, Debug)]
pub enum RepositoryError {
    #[error("Record not found")]
    NotFound,

    #[error("Record already exists")]
    AlreadyExists,

    #[error("Database connection error: {0}")]
    Connection(#[from] sqlx::Error),

    #[error("Invalid data: {0}")]
    InvalidData(String),
}

impl From<RepositoryError> for Error {
    fn from(err: RepositoryError) -> Self {
        match err {
            RepositoryError::NotFound => Error::NotFound("Record not found".to_string()),
            RepositoryError::AlreadyExists => Error::Conflict("Record already exists".to_string()),
            RepositoryError::Connection(e) => Error::Database(e),
            RepositoryError::InvalidData(msg) => Error::Validation(msg),
        }
    }
}

/// Begin a transaction whose statements are bounded by `statement_timeout`.
///
/// `SET LOCAL` scopes the timeout to this transaction, so pooled connections
/// return to the server default on commit or rollback.
pub async fn begin_bounded(
    pool: &PgPool,
    timeout: Duration,
) -> std::result::Result<Transaction<'static, Postgres>, sqlx::Error> {
    let mut tx = pool.begin().await?;
    // SET does not accept bind parameters; the value is a formatted integer.
    let statement = format!("SET LOCAL statement_timeout = {}", timeout.as_millis());
    sqlx::query(&statement).execute(&mut *tx).await?;
    Ok(tx)
}

/// Whether `err` is a unique-constraint violation on `constraint`
pub fn is_unique_violation(err: &sqlx::Error, constraint: &str) -> bool {
    match err {
        sqlx::Error::Database(db_err) => {
            db_err.is_unique_violation() && db_err.constraint() == Some(constraint)
        }
        _ => false,
    }
}
