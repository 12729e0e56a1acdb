//! Owner-facing test session handlers
//!
//! Start, progress, pause, resume and complete. Every mutation locks the
//! session row for the rest of its transaction; start additionally locks the
//! (user, test type) entitlement so concurrent starts serialize.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use skillgate_access::{
    downgrade_if_one_time_tx, effective_level, get_test_type_tx, lock_entitlement_tx,
    AccessLevel, TestType, TestTypeKey,
};
use skillgate_auth::AuthContext;
use skillgate_common::{Error, RepositoryError, Result, ValidatedJson};
use skillgate_content::ContentRequest;
use sqlx::{Postgres, Transaction};
use uuid::Uuid;
use validator::Validate;

use super::{begin_failed, commit_failed, session_not_found, SessionResponse};
use crate::api::middleware::{AuthUser, SessionsState};
use crate::domain::entities::{
    CompletionInput, FinalScore, Keystroke, ProgressUpdate, RunningStats, ScoringMode,
    SessionStatus, TestSession,
};
use crate::domain::error::SessionError;
use crate::repository::{
    find_active_session_tx, get_session_for_update_tx, insert_result_tx, insert_session_tx,
    update_session_tx,
};

#[derive(Debug, Deserialize, Validate)]
pub struct StartTestRequest {
    /// Test type id or slug
    #[validate(length(min = 1, max = 100))]
    pub test_type: String,

    #[serde(default)]
    pub practice: bool,
}

#[derive(Debug, Serialize)]
pub struct StartTestResponse {
    pub session_id: Uuid,
    pub time_limit_seconds: Option<i32>,
    pub session: SessionResponse,
}

#[derive(Debug, Deserialize, Validate)]
pub struct ProgressRequest {
    #[validate(length(max = 20000))]
    pub typed_text: String,
    pub cursor_position: usize,
    #[serde(default)]
    pub keystroke: Option<Keystroke>,
}

#[derive(Debug, Serialize)]
pub struct ProgressResponse {
    pub session_id: Uuid,
    pub status: SessionStatus,
    pub stats: RunningStats,
}

#[derive(Debug, Deserialize, Validate)]
pub struct CompleteTestRequest {
    #[serde(default)]
    #[validate(length(max = 20000))]
    pub final_typed_text: String,
    #[serde(default)]
    pub elapsed_seconds: f64,
    pub questions_total: Option<u32>,
    pub questions_correct: Option<u32>,
}

#[derive(Debug, Serialize)]
pub struct CompleteTestResponse {
    pub session: SessionResponse,
    pub score: FinalScore,
    /// Absent for practice attempts
    pub result_id: Option<Uuid>,
}

/// Lock a session for mutation, hiding other users' sessions as not found
async fn lock_owned_session(
    tx: &mut Transaction<'_, Postgres>,
    session_id: Uuid,
    auth: &AuthContext,
) -> Result<TestSession> {
    let session = get_session_for_update_tx(tx, session_id)
        .await?
        .ok_or_else(|| session_not_found(session_id))?;

    if !auth.owns(session.user_id) {
        return Err(session_not_found(session_id));
    }
    Ok(session)
}

async fn scoring_mode_tx(
    tx: &mut Transaction<'_, Postgres>,
    session: &TestSession,
) -> Result<ScoringMode> {
    let test_type = get_test_type_tx(tx, session.test_type_id)
        .await?
        .ok_or_else(|| Error::Internal("Session references a missing test type".to_string()))?;
    Ok(ScoringMode::from(test_type.kind))
}

fn content_request(test_type: &TestType) -> ContentRequest {
    ContentRequest {
        kind: test_type.kind.as_str().to_string(),
        test_type_slug: test_type.slug.clone(),
        question_count: test_type.question_count,
    }
}

/// Start an attempt
///
/// **POST /v1/tests**
///
/// Scored attempts need ONE_TIME or UNLIMITED access and no other running
/// attempt. Both are checked without locks before content is fetched, so a
/// rejected start never reaches the provider, and checked again under the
/// pair lock inside the transaction. Content is fetched before the
/// transaction opens, so a provider failure leaves no trace. A ONE_TIME
/// grant is consumed in the same transaction that creates the session.
pub async fn start_test(
    AuthUser(auth): AuthUser,
    State(state): State<SessionsState>,
    ValidatedJson(request): ValidatedJson<StartTestRequest>,
) -> Result<(StatusCode, Json<StartTestResponse>)> {
    let user_id = auth.actor_id();
    let key = TestTypeKey::parse(&request.test_type);
    let test_type = state
        .repos
        .test_types
        .resolve(&key)
        .await?
        .filter(|test_type| test_type.is_active)
        .ok_or_else(|| Error::NotFound(format!("Test type not found: {}", key)))?;

    if !request.practice {
        let entitlement = state.repos.entitlements.get(user_id, test_type.id).await?;
        let active = state.repos.sessions.find_active(user_id, test_type.id).await?;
        TestSession::admit_scored(effective_level(entitlement.as_ref()), active)?;
    }

    let content = state
        .content
        .fetch(content_request(&test_type))
        .await
        .map_err(|e| {
            tracing::warn!(
                provider = state.content.name(),
                test_type = %test_type.slug,
                error = %e,
                "Content fetch failed"
            );
            Error::from(e)
        })?;

    let mut tx = state.repos.begin().await.map_err(begin_failed)?;

    let mut code_id = None;
    if !request.practice {
        let entitlement = lock_entitlement_tx(&mut tx, user_id, test_type.id).await?;
        let level = effective_level(entitlement.as_ref());
        let active = find_active_session_tx(&mut tx, user_id, test_type.id).await?;
        TestSession::admit_scored(level, active)?;

        if level == AccessLevel::OneTime {
            code_id = entitlement.and_then(|e| e.source_code_id);
        }
    }

    let now = Utc::now();
    let session = TestSession::start(user_id, &test_type, request.practice, content, code_id, now);
    let session = insert_session_tx(&mut tx, &session).await?;

    if !request.practice {
        downgrade_if_one_time_tx(&mut tx, user_id, test_type.id).await?;
    }

    tx.commit().await.map_err(commit_failed)?;

    tracing::info!(
        user_id = %user_id,
        session_id = %session.id,
        test_type = %test_type.slug,
        practice = session.is_practice,
        "Test started"
    );

    Ok((
        StatusCode::CREATED,
        Json(StartTestResponse {
            session_id: session.id,
            time_limit_seconds: session.time_limit_seconds,
            session: SessionResponse::at(session, now),
        }),
    ))
}

/// Get one of my sessions
///
/// **GET /v1/tests/{id}**
pub async fn get_test(
    AuthUser(auth): AuthUser,
    State(state): State<SessionsState>,
    Path(session_id): Path<Uuid>,
) -> Result<Json<SessionResponse>> {
    let session = state
        .repos
        .sessions
        .get_by_id(session_id)
        .await?
        .filter(|session| auth.owns(session.user_id) || auth.is_admin())
        .ok_or_else(|| session_not_found(session_id))?;

    Ok(Json(SessionResponse::at(session, Utc::now())))
}

/// Record typing progress
///
/// **POST /v1/tests/{id}/progress**
pub async fn record_progress(
    AuthUser(auth): AuthUser,
    State(state): State<SessionsState>,
    Path(session_id): Path<Uuid>,
    ValidatedJson(request): ValidatedJson<ProgressRequest>,
) -> Result<Json<ProgressResponse>> {
    let mut tx = state.repos.begin().await.map_err(begin_failed)?;

    let mut session = lock_owned_session(&mut tx, session_id, &auth).await?;
    let mode = scoring_mode_tx(&mut tx, &session).await?;

    let stats = session.record_progress(
        ProgressUpdate {
            typed_text: request.typed_text,
            cursor_position: request.cursor_position,
            keystroke: request.keystroke,
        },
        mode,
        Utc::now(),
    )?;

    let session = update_session_tx(&mut tx, &session).await?;
    tx.commit().await.map_err(commit_failed)?;

    Ok(Json(ProgressResponse {
        session_id: session.id,
        status: session.status,
        stats,
    }))
}

/// Pause a running attempt; its clock stops
///
/// **POST /v1/tests/{id}/pause**
pub async fn pause_test(
    AuthUser(auth): AuthUser,
    State(state): State<SessionsState>,
    Path(session_id): Path<Uuid>,
) -> Result<Json<SessionResponse>> {
    let mut tx = state.repos.begin().await.map_err(begin_failed)?;

    let mut session = lock_owned_session(&mut tx, session_id, &auth).await?;
    let now = Utc::now();
    session.pause(now)?;

    let session = update_session_tx(&mut tx, &session).await?;
    tx.commit().await.map_err(commit_failed)?;

    tracing::debug!(session_id = %session_id, "Test paused");

    Ok(Json(SessionResponse::at(session, now)))
}

/// Resume a paused attempt
///
/// **POST /v1/tests/{id}/resume**
pub async fn resume_test(
    AuthUser(auth): AuthUser,
    State(state): State<SessionsState>,
    Path(session_id): Path<Uuid>,
) -> Result<Json<SessionResponse>> {
    let mut tx = state.repos.begin().await.map_err(begin_failed)?;

    let mut session = lock_owned_session(&mut tx, session_id, &auth).await?;
    let now = Utc::now();
    session.resume(now)?;

    let session = update_session_tx(&mut tx, &session).await?;
    tx.commit().await.map_err(commit_failed)?;

    tracing::debug!(session_id = %session_id, "Test resumed");

    Ok(Json(SessionResponse::at(session, now)))
}

/// Complete a running attempt
///
/// **POST /v1/tests/{id}/complete**
///
/// Scored attempts get exactly one immutable result; a repeated call is
/// rejected with `NOT_ACTIVE`.
pub async fn complete_test(
    AuthUser(auth): AuthUser,
    State(state): State<SessionsState>,
    Path(session_id): Path<Uuid>,
    ValidatedJson(request): ValidatedJson<CompleteTestRequest>,
) -> Result<Json<CompleteTestResponse>> {
    let mut tx = state.repos.begin().await.map_err(begin_failed)?;

    let mut session = lock_owned_session(&mut tx, session_id, &auth).await?;
    let mode = scoring_mode_tx(&mut tx, &session).await?;
    let now = Utc::now();

    let completion = session.complete(
        CompletionInput {
            final_typed_text: request.final_typed_text,
            elapsed_seconds: request.elapsed_seconds,
            questions_total: request.questions_total,
            questions_correct: request.questions_correct,
        },
        mode,
        now,
    )?;

    let session = update_session_tx(&mut tx, &session).await?;

    let result_id = match &completion.result {
        Some(result) => {
            let stored = insert_result_tx(&mut tx, result)
                .await
                .map_err(|e| match e {
                    RepositoryError::AlreadyExists => Error::from(SessionError::NotActive {
                        status: SessionStatus::Completed,
                    }),
                    other => other.into(),
                })?;
            Some(stored.id)
        }
        None => None,
    };

    tx.commit().await.map_err(commit_failed)?;

    tracing::info!(
        user_id = %session.user_id,
        session_id = %session.id,
        score = completion.score.score,
        accuracy = completion.score.accuracy,
        practice = session.is_practice,
        "Test completed"
    );

    Ok(Json(CompleteTestResponse {
        session: SessionResponse::at(session, now),
        score: completion.score,
        result_id,
    }))
}
