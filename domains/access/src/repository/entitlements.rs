//! Entitlement read repository
//!
//! Writes go through the transactional functions in `transactions.rs`.

use crate::domain::entities::Entitlement;
use skillgate_common::Result;
use sqlx::PgPool;
use uuid::Uuid;

#[derive(Clone)]
pub struct EntitlementRepository {
    pool: PgPool,
}

impl EntitlementRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn get(&self, user_id: Uuid, test_type_id: Uuid) -> Result<Option<Entitlement>> {
        let row = sqlx::query_as::<_, Entitlement>(
            r#"
            SELECT id, user_id, test_type_id, access_level, is_active,
                   granted_by, granted_at, source, source_code_id
            FROM entitlements
            WHERE user_id = $1 AND test_type_id = $2
            "#,
        )
        .bind(user_id)
        .bind(test_type_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row)
    }

    pub async fn list_for_user(&self, user_id: Uuid) -> Result<Vec<Entitlement>> {
        let rows = sqlx::query_as::<_, Entitlement>(
            r#"
            SELECT id, user_id, test_type_id, access_level, is_active,
                   granted_by, granted_at, source, source_code_id
            FROM entitlements
            WHERE user_id = $1
            ORDER BY granted_at DESC
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows)
    }
}
