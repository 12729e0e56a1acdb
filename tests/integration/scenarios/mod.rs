//! End-to-end flows across both domains
//!
//! - A: code redemption grants ONE_TIME, a scored start consumes it
//! - B: an approved UNLIMITED request is never consumed
//! - C: redemption failures by kind

use axum::http::StatusCode;
use serde_json::json;
use serial_test::serial;

use crate::common::{error_code, TestApp, BASIC_MATH, TYPING_KEYBOARD};
use skillgate_content::mock::MockContentProvider;

#[test_log::test(tokio::test)]
#[serial]
#[ignore = "requires TEST_DATABASE_URL"]
async fn test_scenario_a_one_time_code_is_consumed_by_start() {
    let app = TestApp::new().await.unwrap();
    let admin = app.admin();
    let user = app.user();

    let codes = app.generate_codes(&admin, BASIC_MATH, 3).await;
    assert_eq!(codes.len(), 3);

    let (status, body) = app
        .post("/v1/codes/redeem", &user, json!({ "code": codes[0] }))
        .await;
    assert_eq!(status, StatusCode::OK, "{}", body);
    assert_eq!(body["access_level"], "ONE_TIME");
    assert_eq!(app.level(&user, BASIC_MATH).await, "ONE_TIME");

    let (status, body) = app.start(&user, BASIC_MATH, false).await;
    assert_eq!(status, StatusCode::CREATED, "{}", body);
    assert_eq!(app.level(&user, BASIC_MATH).await, "NONE");

    // the consuming session remembers which code paid for it
    let session_id = body["session_id"].as_str().unwrap();
    let code_id: Option<uuid::Uuid> = sqlx::query_scalar(
        "SELECT code_id FROM test_sessions WHERE id = $1::uuid",
    )
    .bind(session_id)
    .fetch_one(&app.pool)
    .await
    .unwrap();
    assert!(code_id.is_some());

    let (status, body) = app.start(&user, BASIC_MATH, false).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(error_code(&body), "ACCESS_DENIED");
}

#[test_log::test(tokio::test)]
#[serial]
#[ignore = "requires TEST_DATABASE_URL"]
async fn test_scenario_b_unlimited_is_never_consumed() {
    let app = TestApp::with_content(MockContentProvider::with_passage("hello world"))
        .await
        .unwrap();
    let admin = app.admin();
    let user = app.user();

    let (status, body) = app
        .post(
            "/v1/requests",
            &user,
            json!({ "test_types": [TYPING_KEYBOARD], "reason": "job requirement" }),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED, "{}", body);
    assert_eq!(body["created"], 1);

    let (status, pending) = app.get("/v1/admin/requests", &admin).await;
    assert_eq!(status, StatusCode::OK);
    let request_id = pending[0]["id"].as_str().unwrap().to_string();

    let (status, body) = app
        .post(
            &format!("/v1/admin/requests/{}/approve", request_id),
            &admin,
            json!({ "access_level": "UNLIMITED" }),
        )
        .await;
    assert_eq!(status, StatusCode::OK, "{}", body);
    assert_eq!(body["status"], "APPROVED");
    assert_eq!(app.level(&user, TYPING_KEYBOARD).await, "UNLIMITED");

    let (status, started) = app.start(&user, TYPING_KEYBOARD, false).await;
    assert_eq!(status, StatusCode::CREATED, "{}", started);
    assert_eq!(started["time_limit_seconds"], 60);
    assert_eq!(started["session"]["expected_text"], "hello world");
    let session_id = started["session_id"].as_str().unwrap();

    let (status, completed) = app
        .post(
            &format!("/v1/tests/{}/complete", session_id),
            &user,
            json!({ "final_typed_text": "hello world", "elapsed_seconds": 10.0 }),
        )
        .await;
    assert_eq!(status, StatusCode::OK, "{}", completed);
    assert_eq!(completed["score"]["accuracy"], 100.0);
    assert_eq!(completed["score"]["raw_speed"], 12);
    assert_eq!(completed["score"]["weighted_speed"], 12);
    assert!(completed["result_id"].is_string());
    assert_eq!(completed["session"]["status"], "COMPLETED");

    let (status, results) = app.get("/v1/results", &user).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(results.as_array().unwrap().len(), 1);
    assert_eq!(results[0]["score"], 12);

    let (status, body) = app.start(&user, TYPING_KEYBOARD, false).await;
    assert_eq!(status, StatusCode::CREATED, "{}", body);
    assert_eq!(app.level(&user, TYPING_KEYBOARD).await, "UNLIMITED");
}

#[test_log::test(tokio::test)]
#[serial]
#[ignore = "requires TEST_DATABASE_URL"]
async fn test_scenario_c_redemption_failures() {
    let app = TestApp::new().await.unwrap();
    let admin = app.admin();
    let first = app.user();
    let second = app.user();

    let codes = app.generate_codes(&admin, BASIC_MATH, 1).await;
    let (status, _) = app
        .post("/v1/codes/redeem", &first, json!({ "code": codes[0] }))
        .await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = app
        .post("/v1/codes/redeem", &second, json!({ "code": codes[0] }))
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(error_code(&body), "ALREADY_USED");

    sqlx::query(
        r#"
        INSERT INTO one_time_codes (id, code, test_type_id, created_by, expires_at)
        SELECT $1, 'EXPRD234', id, $2, NOW() - INTERVAL '1 day'
        FROM test_types WHERE slug = $3
        "#,
    )
    .bind(uuid::Uuid::new_v4())
    .bind(admin.id)
    .bind(BASIC_MATH)
    .execute(&app.pool)
    .await
    .unwrap();

    let (status, body) = app
        .post("/v1/codes/redeem", &second, json!({ "code": "exprd234" }))
        .await;
    assert_eq!(status, StatusCode::GONE);
    assert_eq!(error_code(&body), "EXPIRED");

    let (status, body) = app
        .post("/v1/codes/redeem", &second, json!({ "code": "ZZZZ2222" }))
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(error_code(&body), "NOT_FOUND");

    // nothing was granted along the way
    assert_eq!(app.level(&second, BASIC_MATH).await, "NONE");
}
