//! Route definitions for the access domain API

use axum::{
    routing::{delete, get, post, put},
    Router,
};

use super::handlers::{audit, codes, entitlements, requests, test_types};
use super::middleware::AccessState;

/// Test type catalogue routes
fn test_type_routes() -> Router<AccessState> {
    Router::new()
        .route("/v1/test-types", get(test_types::list_test_types))
        .route("/v1/test-types/{key}", get(test_types::get_test_type))
}

/// Entitlement routes for users and admins
fn entitlement_routes() -> Router<AccessState> {
    Router::new()
        .route("/v1/entitlements", get(entitlements::list_my_entitlements))
        .route(
            "/v1/admin/users/{user_id}/entitlements",
            get(entitlements::list_user_entitlements),
        )
        .route(
            "/v1/admin/users/{user_id}/entitlements/{test_type}",
            put(entitlements::set_entitlement),
        )
}

/// One-time code routes
fn code_routes() -> Router<AccessState> {
    Router::new()
        .route("/v1/codes/redeem", post(codes::redeem_code))
        .route(
            "/v1/admin/codes",
            get(codes::list_codes).post(codes::generate_codes),
        )
        .route(
            "/v1/admin/codes/{id}/deactivate",
            post(codes::deactivate_code),
        )
        .route("/v1/admin/codes/{id}", delete(codes::delete_code))
}

/// Access request routes
fn request_routes() -> Router<AccessState> {
    Router::new()
        .route(
            "/v1/requests",
            get(requests::list_my_requests).post(requests::submit_requests),
        )
        .route("/v1/admin/requests", get(requests::list_requests))
        .route(
            "/v1/admin/requests/{id}/approve",
            post(requests::approve_request),
        )
        .route("/v1/admin/requests/{id}/deny", post(requests::deny_request))
}

fn audit_routes() -> Router<AccessState> {
    Router::new().route("/v1/admin/audit", get(audit::list_audit_log))
}

/// Create all access domain API routes
pub fn routes() -> Router<AccessState> {
    Router::new()
        .merge(test_type_routes())
        .merge(entitlement_routes())
        .merge(code_routes())
        .merge(request_routes())
        .merge(audit_routes())
}
