//! One-time code handlers
//!
//! Generation, redemption, deactivation and deletion. Each mutation runs in
//! one transaction with the code row locked, so two redemptions of the same
//! code serialize and the loser re-reads it as used.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use skillgate_audit::{append_audit_tx, AuditDetail};
use skillgate_common::{
    is_unique_violation, Error, Pagination, RepositoryError, Result, ValidatedJson,
};
use uuid::Uuid;
use validator::Validate;

use super::{begin_failed, commit_failed, resolve_test_type};
use crate::api::middleware::{AccessState, AdminUser, AuthUser};
use crate::domain::codes::{generate_unique_codes, normalize_code};
use crate::domain::entities::{effective_level, AccessLevel, EntitlementSource, OneTimeCode};
use crate::domain::error::AccessError;
use crate::repository::{
    code_attached_to_session_tx, consume_code_tx, deactivate_code_tx, delete_code_tx,
    get_code_by_id_for_update_tx, get_code_for_update_tx, get_test_type_tx, insert_codes_tx,
    lock_entitlement_tx, raise_entitlement_tx, CodeFilter, TxCodeAvailability,
};

#[derive(Debug, Deserialize, Validate)]
pub struct GenerateCodesRequest {
    /// Test type id or slug
    #[validate(length(min = 1, max = 100))]
    pub test_type: String,

    #[validate(range(min = 1, max = 50))]
    pub count: u32,

    pub expires_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct RedeemCodeRequest {
    #[validate(length(min = 1, max = 64))]
    pub code: String,
}

#[derive(Debug, Serialize)]
pub struct CodeResponse {
    pub id: Uuid,
    pub code: String,
    pub test_type_id: Uuid,
    pub created_by: Uuid,
    pub created_at: DateTime<Utc>,
    pub expires_at: Option<DateTime<Utc>>,
    pub is_active: bool,
    pub used_by: Option<Uuid>,
    pub used_at: Option<DateTime<Utc>>,
    pub redeemable: bool,
}

impl From<OneTimeCode> for CodeResponse {
    fn from(code: OneTimeCode) -> Self {
        Self {
            redeemable: code.is_redeemable(Utc::now()),
            id: code.id,
            code: code.code,
            test_type_id: code.test_type_id,
            created_by: code.created_by,
            created_at: code.created_at,
            expires_at: code.expires_at,
            is_active: code.is_active,
            used_by: code.used_by,
            used_at: code.used_at,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct GenerateCodesResponse {
    pub test_type_id: Uuid,
    pub codes: Vec<CodeResponse>,
}

#[derive(Debug, Serialize)]
pub struct RedeemCodeResponse {
    pub code_id: Uuid,
    pub test_type_id: Uuid,
    pub test_type_slug: String,
    pub test_type_name: String,
    pub access_level: AccessLevel,
}

/// Generate a batch of codes
///
/// **POST /v1/admin/codes**
///
/// All codes of the batch are inserted in one transaction; if any slot
/// runs out of retries the batch fails with `GENERATION_EXHAUSTED` and
/// nothing is persisted.
pub async fn generate_codes(
    AdminUser(admin): AdminUser,
    State(state): State<AccessState>,
    ValidatedJson(request): ValidatedJson<GenerateCodesRequest>,
) -> Result<(StatusCode, Json<GenerateCodesResponse>)> {
    if request.expires_at.is_some_and(|expires_at| expires_at <= Utc::now()) {
        return Err(Error::Validation(
            "expires_at must be in the future".to_string(),
        ));
    }

    let test_type = resolve_test_type(&state, &request.test_type).await?;

    let mut tx = state.repos.begin().await.map_err(begin_failed)?;

    let raw_codes = {
        let mut availability = TxCodeAvailability::new(&mut tx);
        generate_unique_codes(request.count, &mut availability).await?
    };

    let codes: Vec<OneTimeCode> = raw_codes
        .into_iter()
        .map(|code| {
            OneTimeCode::new(code, test_type.id, admin.actor_id(), request.expires_at)
        })
        .collect();

    let created = insert_codes_tx(&mut tx, &codes).await.map_err(|e| {
        if is_unique_violation(&e, "one_time_codes_code_key") {
            Error::Conflict("A generated code was taken concurrently; retry".to_string())
        } else {
            Error::Database(e)
        }
    })?;

    append_audit_tx(
        &mut tx,
        admin.actor_id(),
        test_type.id,
        &AuditDetail::CodesGenerated {
            test_type_id: test_type.id,
            count: request.count,
            expires_at: request.expires_at,
            codes: created.iter().map(|c| c.code.clone()).collect(),
        },
    )
    .await?;

    tx.commit().await.map_err(commit_failed)?;

    tracing::info!(
        admin_id = %admin.actor_id(),
        test_type = %test_type.slug,
        count = created.len(),
        "One-time codes generated"
    );

    Ok((
        StatusCode::CREATED,
        Json(GenerateCodesResponse {
            test_type_id: test_type.id,
            codes: created.into_iter().map(CodeResponse::from).collect(),
        }),
    ))
}

/// List codes
///
/// **GET /v1/admin/codes**
pub async fn list_codes(
    AdminUser(_admin): AdminUser,
    State(state): State<AccessState>,
    Query(filter): Query<CodeFilter>,
    Query(pagination): Query<Pagination>,
) -> Result<Json<Vec<CodeResponse>>> {
    let codes = state.repos.codes.list(&filter, pagination).await?;
    Ok(Json(codes.into_iter().map(CodeResponse::from).collect()))
}

/// Redeem a code for the current user
///
/// **POST /v1/codes/redeem**
///
/// Input is matched after trimming and upper-casing, since issued codes are
/// upper-case only. Input that cannot be an issued code is `NOT_FOUND`,
/// like any other unknown code. A rejected redemption never consumes the
/// code.
pub async fn redeem_code(
    AuthUser(auth): AuthUser,
    State(state): State<AccessState>,
    ValidatedJson(request): ValidatedJson<RedeemCodeRequest>,
) -> Result<Json<RedeemCodeResponse>> {
    let user_id = auth.actor_id();
    let code_text = normalize_code(&request.code).ok_or_else(code_not_found)?;

    let mut tx = state.repos.begin().await.map_err(begin_failed)?;

    let code = get_code_for_update_tx(&mut tx, &code_text)
        .await?
        .ok_or_else(code_not_found)?;

    code.check_redeemable(Utc::now())?;

    let existing = lock_entitlement_tx(&mut tx, user_id, code.test_type_id).await?;
    let current = effective_level(existing.as_ref());
    if current.is_granted() {
        return Err(AccessError::AlreadyEntitled { level: current }.into());
    }

    consume_code_tx(&mut tx, code.id, user_id)
        .await
        .map_err(|e| match e {
            RepositoryError::NotFound => Error::from(AccessError::AlreadyUsed),
            other => other.into(),
        })?;

    let change = raise_entitlement_tx(
        &mut tx,
        user_id,
        code.test_type_id,
        AccessLevel::OneTime,
        user_id,
        EntitlementSource::Code,
        Some(code.id),
    )
    .await?;

    let test_type = get_test_type_tx(&mut tx, code.test_type_id)
        .await?
        .ok_or_else(|| Error::Internal("Code references a missing test type".to_string()))?;

    tx.commit().await.map_err(commit_failed)?;

    tracing::info!(
        user_id = %user_id,
        code_id = %code.id,
        test_type = %test_type.slug,
        "Code redeemed"
    );

    Ok(Json(RedeemCodeResponse {
        code_id: code.id,
        test_type_id: test_type.id,
        test_type_slug: test_type.slug,
        test_type_name: test_type.name,
        access_level: change.level(),
    }))
}

fn code_not_found() -> Error {
    Error::NotFound("Code not found".to_string())
}

/// Deactivate an unused code
///
/// **POST /v1/admin/codes/{id}/deactivate**
pub async fn deactivate_code(
    AdminUser(admin): AdminUser,
    State(state): State<AccessState>,
    Path(code_id): Path<Uuid>,
) -> Result<Json<CodeResponse>> {
    let mut tx = state.repos.begin().await.map_err(begin_failed)?;

    let code = get_code_by_id_for_update_tx(&mut tx, code_id)
        .await?
        .ok_or_else(code_not_found)?;

    code.check_deactivatable()?;

    let updated = deactivate_code_tx(&mut tx, code_id)
        .await
        .map_err(|e| match e {
            RepositoryError::NotFound => Error::from(AccessError::CodeInactive),
            other => other.into(),
        })?;

    append_audit_tx(
        &mut tx,
        admin.actor_id(),
        code_id,
        &AuditDetail::CodeDeactivated {
            code: updated.code.clone(),
            test_type_id: updated.test_type_id,
        },
    )
    .await?;

    tx.commit().await.map_err(commit_failed)?;

    Ok(Json(updated.into()))
}

/// Delete a code that was never used nor backed a session
///
/// **DELETE /v1/admin/codes/{id}**
pub async fn delete_code(
    AdminUser(admin): AdminUser,
    State(state): State<AccessState>,
    Path(code_id): Path<Uuid>,
) -> Result<StatusCode> {
    let mut tx = state.repos.begin().await.map_err(begin_failed)?;

    let code = get_code_by_id_for_update_tx(&mut tx, code_id)
        .await?
        .ok_or_else(code_not_found)?;

    code.check_deletable()?;

    if code_attached_to_session_tx(&mut tx, code_id).await? {
        return Err(AccessError::CodeInUse.into());
    }

    delete_code_tx(&mut tx, code_id)
        .await
        .map_err(|e| match e {
            RepositoryError::NotFound => Error::from(AccessError::CodeInUse),
            other => other.into(),
        })?;

    append_audit_tx(
        &mut tx,
        admin.actor_id(),
        code_id,
        &AuditDetail::CodeDeleted {
            code: code.code.clone(),
            test_type_id: code.test_type_id,
        },
    )
    .await?;

    tx.commit().await.map_err(commit_failed)?;

    tracing::info!(admin_id = %admin.actor_id(), code_id = %code_id, "Code deleted");

    Ok(StatusCode::NO_CONTENT)
}
