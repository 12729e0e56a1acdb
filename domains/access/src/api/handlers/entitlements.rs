//! Entitlement handlers

use axum::{
    extract::{Path, State},
    Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use skillgate_audit::{append_audit_tx, AuditDetail};
use skillgate_common::{Error, Result, ValidatedJson};
use uuid::Uuid;
use validator::Validate;

use super::{begin_failed, commit_failed, resolve_test_type};
use crate::api::middleware::{AccessState, AdminUser, AuthUser};
use crate::domain::entities::{AccessLevel, Entitlement, EntitlementSource};
use crate::repository::set_entitlement_level_tx;

#[derive(Debug, Serialize)]
pub struct EntitlementResponse {
    pub user_id: Uuid,
    pub test_type_id: Uuid,
    /// Level access checks honour (NONE when inactive)
    pub access_level: AccessLevel,
    pub is_active: bool,
    pub granted_by: Uuid,
    pub granted_at: DateTime<Utc>,
    pub source: EntitlementSource,
    pub source_code_id: Option<Uuid>,
}

impl From<Entitlement> for EntitlementResponse {
    fn from(entitlement: Entitlement) -> Self {
        Self {
            access_level: entitlement.effective_level(),
            user_id: entitlement.user_id,
            test_type_id: entitlement.test_type_id,
            is_active: entitlement.is_active,
            granted_by: entitlement.granted_by,
            granted_at: entitlement.granted_at,
            source: entitlement.source,
            source_code_id: entitlement.source_code_id,
        }
    }
}

/// Admin write: an explicit level, or a grant/revoke toggle
#[derive(Debug, Deserialize, Validate)]
pub struct SetEntitlementBody {
    pub access_level: Option<AccessLevel>,
    pub grant: Option<bool>,
}

impl SetEntitlementBody {
    /// `grant: true` is UNLIMITED, `grant: false` is NONE
    pub fn target_level(&self) -> Result<AccessLevel> {
        match (self.access_level, self.grant) {
            (Some(level), None) => Ok(level),
            (None, Some(true)) => Ok(AccessLevel::Unlimited),
            (None, Some(false)) => Ok(AccessLevel::None),
            _ => Err(Error::Validation(
                "Provide exactly one of access_level or grant".to_string(),
            )),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct SetEntitlementResponse {
    pub user_id: Uuid,
    pub test_type_id: Uuid,
    pub previous_level: AccessLevel,
    pub access_level: AccessLevel,
    pub auto_approved_requests: u64,
}

/// My entitlements
///
/// **GET /v1/entitlements**
pub async fn list_my_entitlements(
    AuthUser(auth): AuthUser,
    State(state): State<AccessState>,
) -> Result<Json<Vec<EntitlementResponse>>> {
    let rows = state
        .repos
        .entitlements
        .list_for_user(auth.actor_id())
        .await?;
    Ok(Json(rows.into_iter().map(EntitlementResponse::from).collect()))
}

/// A user's entitlements
///
/// **GET /v1/admin/users/{user_id}/entitlements**
pub async fn list_user_entitlements(
    AdminUser(_admin): AdminUser,
    State(state): State<AccessState>,
    Path(user_id): Path<Uuid>,
) -> Result<Json<Vec<EntitlementResponse>>> {
    let rows = state.repos.entitlements.list_for_user(user_id).await?;
    Ok(Json(rows.into_iter().map(EntitlementResponse::from).collect()))
}

/// Set or toggle a user's entitlement
///
/// **PUT /v1/admin/users/{user_id}/entitlements/{test_type}**
pub async fn set_entitlement(
    AdminUser(admin): AdminUser,
    State(state): State<AccessState>,
    Path((user_id, test_type_key)): Path<(Uuid, String)>,
    ValidatedJson(body): ValidatedJson<SetEntitlementBody>,
) -> Result<Json<SetEntitlementResponse>> {
    let level = body.target_level()?;
    let test_type = resolve_test_type(&state, &test_type_key).await?;

    let mut tx = state.repos.begin().await.map_err(begin_failed)?;

    let change = set_entitlement_level_tx(
        &mut tx,
        user_id,
        test_type.id,
        level,
        admin.actor_id(),
        EntitlementSource::Admin,
        None,
    )
    .await?;

    append_audit_tx(
        &mut tx,
        admin.actor_id(),
        user_id,
        &AuditDetail::EntitlementSet {
            user_id,
            test_type_id: test_type.id,
            previous_level: change.previous.into(),
            new_level: level.into(),
        },
    )
    .await?;

    tx.commit().await.map_err(commit_failed)?;

    Ok(Json(SetEntitlementResponse {
        user_id,
        test_type_id: test_type.id,
        previous_level: change.previous,
        access_level: change.level(),
        auto_approved_requests: change.auto_approved,
    }))
}
