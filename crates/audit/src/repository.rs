//! Audit log persistence

use crate::entities::{AuditDetail, AuditLogEntry};
use skillgate_common::{Pagination, Result};
use sqlx::types::Json;
use sqlx::{PgPool, Postgres, Transaction};
use uuid::Uuid;

/// Append an audit record within the transaction that performs the action.
pub async fn append_audit_tx(
    transaction: &mut Transaction<'_, Postgres>,
    actor_id: Uuid,
    target_id: Uuid,
    detail: &AuditDetail,
) -> std::result::Result<AuditLogEntry, sqlx::Error> {
    let entry = sqlx::query_as::<_, AuditLogEntry>(
        r#"
        INSERT INTO audit_logs (id, actor_id, action, target_id, detail, created_at)
        VALUES ($1, $2, $3, $4, $5, NOW())
        RETURNING id, actor_id, action, target_id, detail, created_at
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(actor_id)
    .bind(detail.action())
    .bind(target_id)
    .bind(Json(detail))
    .fetch_one(&mut **transaction)
    .await?;

    tracing::info!(
        actor_id = %actor_id,
        target_id = %target_id,
        action = detail.action(),
        "Audit record appended"
    );

    Ok(entry)
}

/// Read access to the audit log
#[derive(Clone)]
pub struct AuditRepository {
    pool: PgPool,
}

impl AuditRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Newest-first listing, optionally filtered by action kind or target
    pub async fn list(
        &self,
        action: Option<&str>,
        target_id: Option<Uuid>,
        pagination: Pagination,
    ) -> Result<Vec<AuditLogEntry>> {
        let rows = sqlx::query_as::<_, AuditLogEntry>(
            r#"
            SELECT id, actor_id, action, target_id, detail, created_at
            FROM audit_logs
            WHERE ($1::text IS NULL OR action = $1)
              AND ($2::uuid IS NULL OR target_id = $2)
            ORDER BY created_at DESC, id
            LIMIT $3 OFFSET $4
            "#,
        )
        .bind(action)
        .bind(target_id)
        .bind(pagination.limit())
        .bind(pagination.offset())
        .fetch_all(&self.pool)
        .await?;

        Ok(rows)
    }
}
