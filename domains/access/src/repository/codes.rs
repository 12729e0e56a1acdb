//! One-time code read repository

use crate::domain::entities::OneTimeCode;
use serde::Deserialize;
use skillgate_common::{Pagination, Result};
use sqlx::PgPool;
use uuid::Uuid;

/// Admin listing filter
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CodeFilter {
    pub test_type_id: Option<Uuid>,
    /// `true` keeps only redeemable codes, `false` only spent/inactive/expired ones
    pub redeemable: Option<bool>,
}

#[derive(Clone)]
pub struct CodeRepository {
    pool: PgPool,
}

impl CodeRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn get_by_id(&self, id: Uuid) -> Result<Option<OneTimeCode>> {
        let row = sqlx::query_as::<_, OneTimeCode>(
            r#"
            SELECT id, code, test_type_id, created_by, created_at, expires_at,
                   is_active, used_by, used_at
            FROM one_time_codes
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row)
    }

    pub async fn list(&self, filter: &CodeFilter, pagination: Pagination) -> Result<Vec<OneTimeCode>> {
        let rows = sqlx::query_as::<_, OneTimeCode>(
            r#"
            SELECT id, code, test_type_id, created_by, created_at, expires_at,
                   is_active, used_by, used_at
            FROM one_time_codes
            WHERE ($1::uuid IS NULL OR test_type_id = $1)
              AND ($2::boolean IS NULL OR
                   (is_active AND used_by IS NULL AND (expires_at IS NULL OR expires_at > NOW())) = $2)
            ORDER BY created_at DESC, code
            LIMIT $3 OFFSET $4
            "#,
        )
        .bind(filter.test_type_id)
        .bind(filter.redeemable)
        .bind(pagination.limit())
        .bind(pagination.offset())
        .fetch_all(&self.pool)
        .await?;

        Ok(rows)
    }
}
