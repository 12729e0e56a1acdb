//! Access request and entitlement endpoint tests
//!
//! - POST /v1/requests
//! - POST /v1/admin/requests/{id}/approve
//! - POST /v1/admin/requests/{id}/deny
//! - PUT /v1/admin/users/{user_id}/entitlements/{test_type}

use axum::http::{Method, StatusCode};
use serde_json::json;
use serial_test::serial;

use crate::common::{error_code, Actor, TestApp, BASIC_MATH, DIGITAL_LITERACY, TYPING_KEYBOARD};

async fn submit(app: &TestApp, user: &Actor, test_types: &[&str]) -> String {
    let (status, body) = app
        .post(
            "/v1/requests",
            user,
            json!({ "test_types": test_types, "reason": "certification" }),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED, "{}", body);
    body["requests"][0]["id"].as_str().unwrap().to_string()
}

#[test_log::test(tokio::test)]
#[serial]
#[ignore = "requires TEST_DATABASE_URL"]
async fn test_review_twice_is_already_processed() {
    let app = TestApp::new().await.unwrap();
    let admin = app.admin();
    let user = app.user();

    let request_id = submit(&app, &user, &[BASIC_MATH]).await;
    let approve = format!("/v1/admin/requests/{}/approve", request_id);

    let (status, _) = app
        .post(&approve, &admin, json!({ "access_level": "ONE_TIME" }))
        .await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = app
        .post(&approve, &admin, json!({ "access_level": "UNLIMITED" }))
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(error_code(&body), "ALREADY_PROCESSED");

    let (status, body) = app
        .post(
            &format!("/v1/admin/requests/{}/deny", request_id),
            &admin,
            json!({ "reason": "changed my mind" }),
        )
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(error_code(&body), "ALREADY_PROCESSED");

    // the first decision stands
    assert_eq!(app.level(&user, BASIC_MATH).await, "ONE_TIME");

    let (_, audit) = app.get("/v1/admin/audit?action=request_approved", &admin).await;
    assert_eq!(audit.as_array().unwrap().len(), 1);
}

#[test_log::test(tokio::test)]
#[serial]
#[ignore = "requires TEST_DATABASE_URL"]
async fn test_submit_skips_pending_and_entitled_types() {
    let app = TestApp::new().await.unwrap();
    let admin = app.admin();
    let user = app.user();

    submit(&app, &user, &[BASIC_MATH]).await;
    app.set_level(&admin, &user, TYPING_KEYBOARD, "UNLIMITED").await;

    let (status, body) = app
        .post(
            "/v1/requests",
            &user,
            json!({ "test_types": [BASIC_MATH, TYPING_KEYBOARD], "reason": "again" }),
        )
        .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(error_code(&body), "NO_ELIGIBLE_TYPES");

    let (status, body) = app
        .post(
            "/v1/requests",
            &user,
            json!({ "test_types": [BASIC_MATH, DIGITAL_LITERACY], "reason": "again" }),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED, "{}", body);
    assert_eq!(body["created"], 1);
    assert_eq!(body["skipped"].as_array().unwrap().len(), 1);
}

#[test_log::test(tokio::test)]
#[serial]
#[ignore = "requires TEST_DATABASE_URL"]
async fn test_deny_leaves_access_unchanged() {
    let app = TestApp::new().await.unwrap();
    let admin = app.admin();
    let user = app.user();

    let request_id = submit(&app, &user, &[BASIC_MATH]).await;
    let (status, body) = app
        .post(
            &format!("/v1/admin/requests/{}/deny", request_id),
            &admin,
            json!({}),
        )
        .await;
    assert_eq!(status, StatusCode::OK, "{}", body);
    assert_eq!(body["status"], "DENIED");
    assert_eq!(app.level(&user, BASIC_MATH).await, "NONE");
}

#[test_log::test(tokio::test)]
#[serial]
#[ignore = "requires TEST_DATABASE_URL"]
async fn test_toggle_grant_auto_approves_and_is_audited() {
    let app = TestApp::new().await.unwrap();
    let admin = app.admin();
    let user = app.user();

    submit(&app, &user, &[BASIC_MATH]).await;

    let uri = format!("/v1/admin/users/{}/entitlements/{}", user.id, BASIC_MATH);
    let (status, body) = app
        .send(Method::PUT, &uri, &admin, Some(json!({ "grant": true })))
        .await;
    assert_eq!(status, StatusCode::OK, "{}", body);
    assert_eq!(body["previous_level"], "NONE");
    assert_eq!(body["access_level"], "UNLIMITED");
    assert_eq!(body["auto_approved_requests"], 1);

    let (_, mine) = app.get("/v1/requests", &user).await;
    assert_eq!(mine[0]["status"], "APPROVED");

    let (status, body) = app
        .send(Method::PUT, &uri, &admin, Some(json!({ "grant": false })))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["access_level"], "NONE");
    assert_eq!(app.level(&user, BASIC_MATH).await, "NONE");

    let (status, body) = app
        .send(Method::PUT, &uri, &admin, Some(json!({})))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(error_code(&body), "VALIDATION_ERROR");

    let (_, audit) = app
        .get(
            &format!("/v1/admin/audit?action=entitlement_set&target_id={}", user.id),
            &admin,
        )
        .await;
    assert_eq!(audit.as_array().unwrap().len(), 2);
}
