//! Transactional free functions for the sessions domain
//!
//! Callers hold the transaction and commit; nothing here commits.

use skillgate_common::{is_unique_violation, Error, RepositoryError};
use sqlx::{Postgres, Transaction};
use uuid::Uuid;

use crate::domain::entities::{TestResult, TestSession};
use crate::domain::error::SessionError;
use crate::repository::results::RESULT_COLUMNS;
use crate::repository::sessions::SESSION_COLUMNS;

const ONE_ACTIVE_INDEX: &str = "test_sessions_one_active_idx";
const ONE_RESULT_CONSTRAINT: &str = "test_results_test_id_key";

pub async fn get_session_for_update_tx(
    transaction: &mut Transaction<'_, Postgres>,
    session_id: Uuid,
) -> std::result::Result<Option<TestSession>, sqlx::Error> {
    let query = format!(
        "SELECT {} FROM test_sessions WHERE id = $1 FOR UPDATE",
        SESSION_COLUMNS
    );
    sqlx::query_as::<_, TestSession>(&query)
        .bind(session_id)
        .fetch_optional(&mut **transaction)
        .await
}

/// The user's STARTED or PAUSED scored attempt for a test type, if any
pub async fn find_active_session_tx(
    transaction: &mut Transaction<'_, Postgres>,
    user_id: Uuid,
    test_type_id: Uuid,
) -> std::result::Result<Option<Uuid>, sqlx::Error> {
    sqlx::query_scalar::<_, Uuid>(
        r#"
        SELECT id FROM test_sessions
        WHERE user_id = $1 AND test_type_id = $2
          AND status IN ('STARTED', 'PAUSED') AND NOT is_practice
        "#,
    )
    .bind(user_id)
    .bind(test_type_id)
    .fetch_optional(&mut **transaction)
    .await
}

/// Insert a new attempt. Losing a race on the one-active index surfaces
/// as `ALREADY_ACTIVE`.
pub async fn insert_session_tx(
    transaction: &mut Transaction<'_, Postgres>,
    session: &TestSession,
) -> std::result::Result<TestSession, Error> {
    let query = format!(
        r#"
        INSERT INTO test_sessions
            (id, user_id, test_type_id, is_practice, status, time_limit_seconds, started_at,
             paused_at, completed_at, cancelled_at, cancel_reason, cancelled_by, score, state,
             code_id, created_at, updated_at)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17)
        RETURNING {}
        "#,
        SESSION_COLUMNS
    );

    sqlx::query_as::<_, TestSession>(&query)
        .bind(session.id)
        .bind(session.user_id)
        .bind(session.test_type_id)
        .bind(session.is_practice)
        .bind(session.status)
        .bind(session.time_limit_seconds)
        .bind(session.started_at)
        .bind(session.paused_at)
        .bind(session.completed_at)
        .bind(session.cancelled_at)
        .bind(&session.cancel_reason)
        .bind(session.cancelled_by)
        .bind(session.score)
        .bind(&session.state)
        .bind(session.code_id)
        .bind(session.created_at)
        .bind(session.updated_at)
        .fetch_one(&mut **transaction)
        .await
        .map_err(|e| {
            if is_unique_violation(&e, ONE_ACTIVE_INDEX) {
                SessionError::AlreadyActive { session_id: None }.into()
            } else {
                Error::Database(e)
            }
        })
}

/// Persist every mutable column of a locked session
pub async fn update_session_tx(
    transaction: &mut Transaction<'_, Postgres>,
    session: &TestSession,
) -> std::result::Result<TestSession, RepositoryError> {
    let query = format!(
        r#"
        UPDATE test_sessions SET
            status = $2,
            paused_at = $3,
            completed_at = $4,
            cancelled_at = $5,
            cancel_reason = $6,
            cancelled_by = $7,
            score = $8,
            state = $9,
            updated_at = $10
        WHERE id = $1
        RETURNING {}
        "#,
        SESSION_COLUMNS
    );

    sqlx::query_as::<_, TestSession>(&query)
        .bind(session.id)
        .bind(session.status)
        .bind(session.paused_at)
        .bind(session.completed_at)
        .bind(session.cancelled_at)
        .bind(&session.cancel_reason)
        .bind(session.cancelled_by)
        .bind(session.score)
        .bind(&session.state)
        .bind(session.updated_at)
        .fetch_optional(&mut **transaction)
        .await?
        .ok_or(RepositoryError::NotFound)
}

/// Insert the single result of a completed attempt
pub async fn insert_result_tx(
    transaction: &mut Transaction<'_, Postgres>,
    result: &TestResult,
) -> std::result::Result<TestResult, RepositoryError> {
    let query = format!(
        r#"
        INSERT INTO test_results
            (id, test_id, user_id, test_type_id, score, accuracy, raw_speed, weighted_speed,
             time_to_complete, questions_total, questions_correct, detailed_results, created_at)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)
        RETURNING {}
        "#,
        RESULT_COLUMNS
    );

    sqlx::query_as::<_, TestResult>(&query)
        .bind(result.id)
        .bind(result.test_id)
        .bind(result.user_id)
        .bind(result.test_type_id)
        .bind(result.score)
        .bind(result.accuracy)
        .bind(result.raw_speed)
        .bind(result.weighted_speed)
        .bind(result.time_to_complete)
        .bind(result.questions_total)
        .bind(result.questions_correct)
        .bind(&result.detailed_results)
        .bind(result.created_at)
        .fetch_one(&mut **transaction)
        .await
        .map_err(|e| {
            if is_unique_violation(&e, ONE_RESULT_CONSTRAINT) {
                RepositoryError::AlreadyExists
            } else {
                RepositoryError::Connection(e)
            }
        })
}

pub async fn result_exists_tx(
    transaction: &mut Transaction<'_, Postgres>,
    session_id: Uuid,
) -> std::result::Result<bool, sqlx::Error> {
    sqlx::query_scalar::<_, bool>("SELECT EXISTS(SELECT 1 FROM test_results WHERE test_id = $1)")
        .bind(session_id)
        .fetch_one(&mut **transaction)
        .await
}

/// Delete a session; its result goes with it through the cascade
pub async fn delete_session_tx(
    transaction: &mut Transaction<'_, Postgres>,
    session_id: Uuid,
) -> std::result::Result<(), RepositoryError> {
    let deleted = sqlx::query("DELETE FROM test_sessions WHERE id = $1")
        .bind(session_id)
        .execute(&mut **transaction)
        .await?
        .rows_affected();

    if deleted == 0 {
        return Err(RepositoryError::NotFound);
    }
    Ok(())
}
