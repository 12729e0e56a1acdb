//! Route definitions for the sessions domain API

use axum::{
    routing::{delete, get, post},
    Router,
};

use super::handlers::{admin, attempts, results};
use super::middleware::SessionsState;

/// Owner-facing attempt routes
fn test_routes() -> Router<SessionsState> {
    Router::new()
        .route("/v1/tests", post(attempts::start_test))
        .route("/v1/tests/{id}", get(attempts::get_test))
        .route("/v1/tests/{id}/progress", post(attempts::record_progress))
        .route("/v1/tests/{id}/pause", post(attempts::pause_test))
        .route("/v1/tests/{id}/resume", post(attempts::resume_test))
        .route("/v1/tests/{id}/complete", post(attempts::complete_test))
}

fn result_routes() -> Router<SessionsState> {
    Router::new().route("/v1/results", get(results::list_my_results))
}

fn admin_routes() -> Router<SessionsState> {
    Router::new()
        .route("/v1/admin/tests/{id}/cancel", post(admin::cancel_test))
        .route("/v1/admin/tests/{id}", delete(admin::delete_test))
}

/// Create all sessions domain API routes
pub fn routes() -> Router<SessionsState> {
    Router::new()
        .merge(test_routes())
        .merge(result_routes())
        .merge(admin_routes())
}
