//! Result handlers

use axum::{
    extract::{Query, State},
    Json,
};
use skillgate_common::{Pagination, Result};

use crate::api::middleware::{AuthUser, SessionsState};
use crate::domain::entities::TestResult;
use crate::repository::ResultFilter;

/// List my results, newest first
///
/// **GET /v1/results**
pub async fn list_my_results(
    AuthUser(auth): AuthUser,
    State(state): State<SessionsState>,
    Query(filter): Query<ResultFilter>,
    Query(pagination): Query<Pagination>,
) -> Result<Json<Vec<TestResult>>> {
    let results = state
        .repos
        .results
        .list_for_user(auth.actor_id(), filter, pagination)
        .await?;
    Ok(Json(results))
}
