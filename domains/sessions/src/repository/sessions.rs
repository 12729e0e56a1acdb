//! Test session read repository

use crate::domain::entities::TestSession;
use skillgate_common::{Pagination, Result};
use sqlx::PgPool;
use uuid::Uuid;

pub(crate) const SESSION_COLUMNS: &str = "id, user_id, test_type_id, is_practice, status, \
    time_limit_seconds, started_at, paused_at, completed_at, cancelled_at, cancel_reason, \
    cancelled_by, score, state, code_id, created_at, updated_at";

#[derive(Clone)]
pub struct SessionRepository {
    pool: PgPool,
}

impl SessionRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn get_by_id(&self, id: Uuid) -> Result<Option<TestSession>> {
        let query = format!("SELECT {} FROM test_sessions WHERE id = $1", SESSION_COLUMNS);
        let row = sqlx::query_as::<_, TestSession>(&query)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(row)
    }

    /// Unlocked lookup of the running scored attempt for a pair
    pub async fn find_active(&self, user_id: Uuid, test_type_id: Uuid) -> Result<Option<Uuid>> {
        let id = sqlx::query_scalar::<_, Uuid>(
            r#"
            SELECT id FROM test_sessions
            WHERE user_id = $1 AND test_type_id = $2
              AND status IN ('STARTED', 'PAUSED') AND NOT is_practice
            "#,
        )
        .bind(user_id)
        .bind(test_type_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(id)
    }

    /// A user's attempts, newest first
    pub async fn list_for_user(
        &self,
        user_id: Uuid,
        pagination: Pagination,
    ) -> Result<Vec<TestSession>> {
        let query = format!(
            "SELECT {} FROM test_sessions WHERE user_id = $1 \
             ORDER BY created_at DESC LIMIT $2 OFFSET $3",
            SESSION_COLUMNS
        );
        let rows = sqlx::query_as::<_, TestSession>(&query)
            .bind(user_id)
            .bind(pagination.limit())
            .bind(pagination.offset())
            .fetch_all(&self.pool)
            .await?;

        Ok(rows)
    }
}
