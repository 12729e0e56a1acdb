//! Access request read repository

use crate::domain::entities::TestRequest;
use crate::domain::state::RequestStatus;
use skillgate_common::{Pagination, Result};
use sqlx::PgPool;
use uuid::Uuid;

#[derive(Clone)]
pub struct RequestRepository {
    pool: PgPool,
}

impl RequestRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn get_by_id(&self, id: Uuid) -> Result<Option<TestRequest>> {
        let row = sqlx::query_as::<_, TestRequest>(
            r#"
            SELECT id, user_id, test_type_id, reason, status, access_level,
                   reviewed_by, reviewed_at, response, created_at
            FROM test_requests
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row)
    }

    pub async fn list_for_user(&self, user_id: Uuid) -> Result<Vec<TestRequest>> {
        let rows = sqlx::query_as::<_, TestRequest>(
            r#"
            SELECT id, user_id, test_type_id, reason, status, access_level,
                   reviewed_by, reviewed_at, response, created_at
            FROM test_requests
            WHERE user_id = $1
            ORDER BY created_at DESC
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows)
    }

    /// Oldest first, so reviewers work the queue in order
    pub async fn list_by_status(
        &self,
        status: RequestStatus,
        pagination: Pagination,
    ) -> Result<Vec<TestRequest>> {
        let rows = sqlx::query_as::<_, TestRequest>(
            r#"
            SELECT id, user_id, test_type_id, reason, status, access_level,
                   reviewed_by, reviewed_at, response, created_at
            FROM test_requests
            WHERE status = $1
            ORDER BY created_at, id
            LIMIT $2 OFFSET $3
            "#,
        )
        .bind(status)
        .bind(pagination.limit())
        .bind(pagination.offset())
        .fetch_all(&self.pool)
        .await?;

        Ok(rows)
    }
}
