//! Access request handlers
//!
//! Users ask for access to one or more test types; admins approve with a
//! level or deny. Review, entitlement write and audit record share one
//! transaction.

use std::collections::BTreeMap;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use skillgate_audit::{append_audit_tx, AuditDetail};
use skillgate_common::{Error, Pagination, RepositoryError, Result, ValidatedJson};
use uuid::Uuid;
use validator::Validate;

use super::{begin_failed, commit_failed, resolve_test_type};
use crate::api::middleware::{AccessState, AdminUser, AuthUser};
use crate::domain::entities::{
    effective_level, AccessLevel, EntitlementSource, RequestStatus, TestRequest, TestType,
};
use crate::domain::error::AccessError;
use crate::repository::{
    create_request_tx, has_pending_request_tx, lock_entitlement_tx, lock_request_for_review_tx,
    review_request_tx, set_entitlement_level_tx,
};

#[derive(Debug, Deserialize, Validate)]
pub struct SubmitRequestsBody {
    /// Test type ids or slugs
    #[validate(length(min = 1, max = 20))]
    pub test_types: Vec<String>,

    #[validate(length(min = 1, max = 1000))]
    pub reason: String,
}

#[derive(Debug, Deserialize, Validate)]
pub struct ApproveRequestBody {
    pub access_level: AccessLevel,

    #[validate(length(max = 1000))]
    pub response: Option<String>,
}

#[derive(Debug, Default, Deserialize, Validate)]
pub struct DenyRequestBody {
    #[validate(length(max = 1000))]
    pub reason: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct RequestListQuery {
    pub status: Option<RequestStatus>,
}

#[derive(Debug, Serialize)]
pub struct RequestResponse {
    pub id: Uuid,
    pub user_id: Uuid,
    pub test_type_id: Uuid,
    pub reason: String,
    pub status: RequestStatus,
    pub access_level: Option<AccessLevel>,
    pub reviewed_by: Option<Uuid>,
    pub reviewed_at: Option<DateTime<Utc>>,
    pub response: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl From<TestRequest> for RequestResponse {
    fn from(request: TestRequest) -> Self {
        Self {
            id: request.id,
            user_id: request.user_id,
            test_type_id: request.test_type_id,
            reason: request.reason,
            status: request.status,
            access_level: request.access_level,
            reviewed_by: request.reviewed_by,
            reviewed_at: request.reviewed_at,
            response: request.response,
            created_at: request.created_at,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct SubmitRequestsResponse {
    pub created: usize,
    pub requests: Vec<RequestResponse>,
    /// Test types filtered out because a request is pending or access is held
    pub skipped: Vec<Uuid>,
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Submit access requests
///
/// **POST /v1/requests**
///
/// Creates one PENDING request per eligible test type. Types with a pending
/// request or any active access above NONE are skipped; if nothing remains
/// the call fails with `NO_ELIGIBLE_TYPES` and creates nothing.
pub async fn submit_requests(
    AuthUser(auth): AuthUser,
    State(state): State<AccessState>,
    ValidatedJson(body): ValidatedJson<SubmitRequestsBody>,
) -> Result<(StatusCode, Json<SubmitRequestsResponse>)> {
    let user_id = auth.actor_id();
    let reason = body.reason.trim().to_string();
    if reason.is_empty() {
        return Err(Error::Validation("Reason must not be blank".to_string()));
    }

    // Ordered by id so concurrent submissions lock pairs in the same order
    let mut test_types: BTreeMap<Uuid, TestType> = BTreeMap::new();
    for raw in &body.test_types {
        let test_type = resolve_test_type(&state, raw).await?;
        test_types.insert(test_type.id, test_type);
    }

    let mut tx = state.repos.begin().await.map_err(begin_failed)?;

    let mut created = Vec::new();
    let mut skipped = Vec::new();

    for (test_type_id, test_type) in &test_types {
        let entitlement = lock_entitlement_tx(&mut tx, user_id, *test_type_id).await?;
        let ineligible = !test_type.is_active
            || effective_level(entitlement.as_ref()).is_granted()
            || has_pending_request_tx(&mut tx, user_id, *test_type_id).await?;

        if ineligible {
            skipped.push(*test_type_id);
            continue;
        }

        let request = TestRequest::new(user_id, *test_type_id, reason.clone());
        created.push(create_request_tx(&mut tx, &request).await?);
    }

    if created.is_empty() {
        return Err(AccessError::NoEligibleTypes.into());
    }

    tx.commit().await.map_err(commit_failed)?;

    tracing::info!(
        user_id = %user_id,
        created = created.len(),
        skipped = skipped.len(),
        "Access requests submitted"
    );

    Ok((
        StatusCode::CREATED,
        Json(SubmitRequestsResponse {
            created: created.len(),
            requests: created.into_iter().map(RequestResponse::from).collect(),
            skipped,
        }),
    ))
}

/// List my requests
///
/// **GET /v1/requests**
pub async fn list_my_requests(
    AuthUser(auth): AuthUser,
    State(state): State<AccessState>,
) -> Result<Json<Vec<RequestResponse>>> {
    let requests = state.repos.requests.list_for_user(auth.actor_id()).await?;
    Ok(Json(requests.into_iter().map(RequestResponse::from).collect()))
}

/// List requests by status (PENDING by default)
///
/// **GET /v1/admin/requests**
pub async fn list_requests(
    AdminUser(_admin): AdminUser,
    State(state): State<AccessState>,
    Query(query): Query<RequestListQuery>,
    Query(pagination): Query<Pagination>,
) -> Result<Json<Vec<RequestResponse>>> {
    let status = query.status.unwrap_or(RequestStatus::Pending);
    let requests = state
        .repos
        .requests
        .list_by_status(status, pagination)
        .await?;
    Ok(Json(requests.into_iter().map(RequestResponse::from).collect()))
}

/// Approve a pending request
///
/// **POST /v1/admin/requests/{id}/approve**
///
/// Writes the chosen level as-is (not max-merged with the current one).
pub async fn approve_request(
    AdminUser(admin): AdminUser,
    State(state): State<AccessState>,
    Path(request_id): Path<Uuid>,
    ValidatedJson(body): ValidatedJson<ApproveRequestBody>,
) -> Result<Json<RequestResponse>> {
    if !body.access_level.is_approvable() {
        return Err(Error::Validation(
            "access_level must be ONE_TIME or UNLIMITED".to_string(),
        ));
    }
    let response = non_blank(body.response);

    let mut tx = state.repos.begin().await.map_err(begin_failed)?;

    let mut request = lock_request_for_review_tx(&mut tx, request_id)
        .await?
        .ok_or_else(|| Error::NotFound("Request not found".to_string()))?;

    request.approve(admin.actor_id(), body.access_level, response.clone())?;

    let reviewed = review_request_tx(&mut tx, &request)
        .await
        .map_err(|e| already_processed(e, RequestStatus::Approved))?;

    set_entitlement_level_tx(
        &mut tx,
        reviewed.user_id,
        reviewed.test_type_id,
        body.access_level,
        admin.actor_id(),
        EntitlementSource::Approval,
        None,
    )
    .await?;

    append_audit_tx(
        &mut tx,
        admin.actor_id(),
        reviewed.id,
        &AuditDetail::RequestApproved {
            user_id: reviewed.user_id,
            test_type_id: reviewed.test_type_id,
            access_level: body.access_level.into(),
            response,
        },
    )
    .await?;

    tx.commit().await.map_err(commit_failed)?;

    tracing::info!(
        admin_id = %admin.actor_id(),
        request_id = %reviewed.id,
        user_id = %reviewed.user_id,
        level = %body.access_level,
        "Access request approved"
    );

    Ok(Json(reviewed.into()))
}

/// Deny a pending request
///
/// **POST /v1/admin/requests/{id}/deny**
pub async fn deny_request(
    AdminUser(admin): AdminUser,
    State(state): State<AccessState>,
    Path(request_id): Path<Uuid>,
    ValidatedJson(body): ValidatedJson<DenyRequestBody>,
) -> Result<Json<RequestResponse>> {
    let reason = non_blank(body.reason);

    let mut tx = state.repos.begin().await.map_err(begin_failed)?;

    let mut request = lock_request_for_review_tx(&mut tx, request_id)
        .await?
        .ok_or_else(|| Error::NotFound("Request not found".to_string()))?;

    request.deny(admin.actor_id(), reason.clone())?;

    let reviewed = review_request_tx(&mut tx, &request)
        .await
        .map_err(|e| already_processed(e, RequestStatus::Denied))?;

    append_audit_tx(
        &mut tx,
        admin.actor_id(),
        reviewed.id,
        &AuditDetail::RequestDenied {
            user_id: reviewed.user_id,
            test_type_id: reviewed.test_type_id,
            reason,
        },
    )
    .await?;

    tx.commit().await.map_err(commit_failed)?;

    tracing::info!(
        admin_id = %admin.actor_id(),
        request_id = %reviewed.id,
        "Access request denied"
    );

    Ok(Json(reviewed.into()))
}

/// A guarded review update that matched nothing lost a race with another review
fn already_processed(err: RepositoryError, status: RequestStatus) -> Error {
    match err {
        RepositoryError::NotFound => AccessError::AlreadyProcessed { status }.into(),
        other => other.into(),
    }
}
