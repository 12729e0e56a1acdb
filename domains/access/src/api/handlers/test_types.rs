//! Test type catalogue handlers

use axum::{
    extract::{Path, State},
    Json,
};
use serde::Serialize;
use skillgate_common::Result;
use uuid::Uuid;

use super::resolve_test_type;
use crate::api::middleware::{AccessState, AuthUser};
use crate::domain::entities::{TestKind, TestType};

#[derive(Debug, Serialize)]
pub struct TestTypeResponse {
    pub id: Uuid,
    pub slug: String,
    pub name: String,
    pub kind: TestKind,
    pub question_count: Option<i32>,
    pub time_limit_seconds: Option<i32>,
    pub is_active: bool,
}

impl From<TestType> for TestTypeResponse {
    fn from(test_type: TestType) -> Self {
        Self {
            time_limit_seconds: test_type.time_limit_seconds(),
            id: test_type.id,
            slug: test_type.slug,
            name: test_type.name,
            kind: test_type.kind,
            question_count: test_type.question_count,
            is_active: test_type.is_active,
        }
    }
}

/// List test types
///
/// **GET /v1/test-types**
///
/// Admins also see inactive types.
pub async fn list_test_types(
    AuthUser(auth): AuthUser,
    State(state): State<AccessState>,
) -> Result<Json<Vec<TestTypeResponse>>> {
    let types = state.repos.test_types.list(auth.is_admin()).await?;
    Ok(Json(types.into_iter().map(TestTypeResponse::from).collect()))
}

/// Get a test type by id or slug
///
/// **GET /v1/test-types/{key}**
pub async fn get_test_type(
    AuthUser(_auth): AuthUser,
    State(state): State<AccessState>,
    Path(key): Path<String>,
) -> Result<Json<TestTypeResponse>> {
    let test_type = resolve_test_type(&state, &key).await?;
    Ok(Json(test_type.into()))
}
