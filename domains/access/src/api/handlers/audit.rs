//! Audit log handlers

use axum::{
    extract::{Query, State},
    Json,
};
use serde::Deserialize;
use skillgate_audit::AuditLogEntry;
use skillgate_common::{Pagination, Result};
use uuid::Uuid;

use crate::api::middleware::{AccessState, AdminUser};

#[derive(Debug, Default, Deserialize)]
pub struct AuditQuery {
    pub action: Option<String>,
    pub target_id: Option<Uuid>,
}

/// List audit records, newest first
///
/// **GET /v1/admin/audit**
pub async fn list_audit_log(
    AdminUser(_admin): AdminUser,
    State(state): State<AccessState>,
    Query(query): Query<AuditQuery>,
    Query(pagination): Query<Pagination>,
) -> Result<Json<Vec<AuditLogEntry>>> {
    let entries = state
        .repos
        .audit
        .list(query.action.as_deref(), query.target_id, pagination)
        .await?;
    Ok(Json(entries))
}
