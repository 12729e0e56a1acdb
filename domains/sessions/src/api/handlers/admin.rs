//! Admin session handlers: cancel and hard delete, both audited

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use chrono::Utc;
use serde::Deserialize;
use skillgate_audit::{append_audit_tx, AuditDetail};
use skillgate_common::{Result, ValidatedJson};
use uuid::Uuid;
use validator::Validate;

use super::{begin_failed, commit_failed, session_not_found, SessionResponse};
use crate::api::middleware::{AdminUser, SessionsState};
use crate::repository::{
    delete_session_tx, get_session_for_update_tx, result_exists_tx, update_session_tx,
};

#[derive(Debug, Default, Deserialize, Validate)]
pub struct CancelTestRequest {
    #[serde(default)]
    #[validate(length(max = 500))]
    pub reason: Option<String>,
}

/// Cancel a STARTED or PAUSED attempt
///
/// **POST /v1/admin/tests/{id}/cancel**
pub async fn cancel_test(
    AdminUser(admin): AdminUser,
    State(state): State<SessionsState>,
    Path(session_id): Path<Uuid>,
    ValidatedJson(request): ValidatedJson<CancelTestRequest>,
) -> Result<Json<SessionResponse>> {
    let mut tx = state.repos.begin().await.map_err(begin_failed)?;

    let mut session = get_session_for_update_tx(&mut tx, session_id)
        .await?
        .ok_or_else(|| session_not_found(session_id))?;

    let previous_status = session.status;
    let reason = request
        .reason
        .map(|r| r.trim().to_string())
        .filter(|r| !r.is_empty());
    let now = Utc::now();
    session.cancel(reason.clone(), admin.actor_id(), now)?;

    let session = update_session_tx(&mut tx, &session).await?;

    append_audit_tx(
        &mut tx,
        admin.actor_id(),
        session.id,
        &AuditDetail::TestCancelled {
            user_id: session.user_id,
            test_type_id: session.test_type_id,
            previous_status: previous_status.into(),
            reason,
        },
    )
    .await?;

    tx.commit().await.map_err(commit_failed)?;

    tracing::info!(
        admin_id = %admin.actor_id(),
        session_id = %session.id,
        previous_status = %previous_status,
        "Test cancelled"
    );

    Ok(Json(SessionResponse::at(session, now)))
}

/// Delete an attempt in any status, with its result
///
/// **DELETE /v1/admin/tests/{id}**
pub async fn delete_test(
    AdminUser(admin): AdminUser,
    State(state): State<SessionsState>,
    Path(session_id): Path<Uuid>,
) -> Result<StatusCode> {
    let mut tx = state.repos.begin().await.map_err(begin_failed)?;

    let session = get_session_for_update_tx(&mut tx, session_id)
        .await?
        .ok_or_else(|| session_not_found(session_id))?;

    let had_result = result_exists_tx(&mut tx, session_id).await?;
    delete_session_tx(&mut tx, session_id).await?;

    append_audit_tx(
        &mut tx,
        admin.actor_id(),
        session_id,
        &AuditDetail::TestDeleted {
            user_id: session.user_id,
            test_type_id: session.test_type_id,
            status: session.status.into(),
            had_result,
        },
    )
    .await?;

    tx.commit().await.map_err(commit_failed)?;

    tracing::info!(
        admin_id = %admin.actor_id(),
        session_id = %session_id,
        had_result,
        "Test deleted"
    );

    Ok(StatusCode::NO_CONTENT)
}
