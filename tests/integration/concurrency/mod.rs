//! Races the transactional paths must win exactly once
//!
//! - N redemptions of one code
//! - N scored starts against one ONE_TIME grant
//! - request approval against a direct admin write for the same pair

use axum::http::{Method, StatusCode};
use serde_json::json;
use serial_test::serial;

use crate::common::{call, error_code, TestApp, BASIC_MATH};

const RACERS: usize = 8;

#[test_log::test(tokio::test(flavor = "multi_thread", worker_threads = 4))]
#[serial]
#[ignore = "requires TEST_DATABASE_URL"]
async fn test_concurrent_redemption_succeeds_once() {
    let app = TestApp::new().await.unwrap();
    let admin = app.admin();
    let code = app.generate_codes(&admin, BASIC_MATH, 1).await.remove(0);

    let users: Vec<_> = (0..RACERS).map(|_| app.user()).collect();
    let handles: Vec<_> = users
        .iter()
        .map(|user| {
            tokio::spawn(call(
                app.router.clone(),
                Method::POST,
                "/v1/codes/redeem".to_string(),
                user.token.clone(),
                Some(json!({ "code": code })),
            ))
        })
        .collect();

    let mut successes = 0;
    for handle in handles {
        let (status, body) = handle.await.unwrap();
        match status {
            StatusCode::OK => successes += 1,
            StatusCode::CONFLICT => assert_eq!(error_code(&body), "ALREADY_USED"),
            other => panic!("unexpected status {}: {}", other, body),
        }
    }
    assert_eq!(successes, 1);

    let granted: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM entitlements")
        .fetch_one(&app.pool)
        .await
        .unwrap();
    assert_eq!(granted, 1);
}

#[test_log::test(tokio::test(flavor = "multi_thread", worker_threads = 4))]
#[serial]
#[ignore = "requires TEST_DATABASE_URL"]
async fn test_concurrent_starts_consume_one_time_once() {
    let app = TestApp::new().await.unwrap();
    let admin = app.admin();
    let user = app.user();
    app.set_level(&admin, &user, BASIC_MATH, "ONE_TIME").await;

    let handles: Vec<_> = (0..RACERS)
        .map(|_| {
            tokio::spawn(call(
                app.router.clone(),
                Method::POST,
                "/v1/tests".to_string(),
                user.token.clone(),
                Some(json!({ "test_type": BASIC_MATH })),
            ))
        })
        .collect();

    let mut created = 0;
    for handle in handles {
        let (status, body) = handle.await.unwrap();
        match status {
            StatusCode::CREATED => created += 1,
            StatusCode::FORBIDDEN => assert_eq!(error_code(&body), "ACCESS_DENIED"),
            StatusCode::CONFLICT => assert_eq!(error_code(&body), "ALREADY_ACTIVE"),
            other => panic!("unexpected status {}: {}", other, body),
        }
    }

    assert_eq!(created, 1);
    assert_eq!(app.count("test_sessions").await, 1);
    assert_eq!(app.level(&user, BASIC_MATH).await, "NONE");
}

#[test_log::test(tokio::test(flavor = "multi_thread", worker_threads = 4))]
#[serial]
#[ignore = "requires TEST_DATABASE_URL"]
async fn test_approval_racing_admin_write_never_deadlocks() {
    let app = TestApp::new().await.unwrap();
    let admin = app.admin();

    for _ in 0..RACERS {
        let user = app.user();
        let (status, body) = app
            .post(
                "/v1/requests",
                &user,
                json!({ "test_types": [BASIC_MATH], "reason": "certification" }),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED, "{}", body);
        let request_id = body["requests"][0]["id"].as_str().unwrap().to_string();

        let approve = tokio::spawn(call(
            app.router.clone(),
            Method::POST,
            format!("/v1/admin/requests/{}/approve", request_id),
            admin.token.clone(),
            Some(json!({ "access_level": "ONE_TIME" })),
        ));
        let write = tokio::spawn(call(
            app.router.clone(),
            Method::PUT,
            format!("/v1/admin/users/{}/entitlements/{}", user.id, BASIC_MATH),
            admin.token.clone(),
            Some(json!({ "access_level": "UNLIMITED" })),
        ));

        let (status, body) = write.await.unwrap();
        assert_eq!(status, StatusCode::OK, "{}", body);

        // Losing to the write's auto-approval is the only acceptable failure
        let (status, body) = approve.await.unwrap();
        match status {
            StatusCode::OK => {}
            StatusCode::CONFLICT => assert_eq!(error_code(&body), "ALREADY_PROCESSED"),
            other => panic!("unexpected status {}: {}", other, body),
        }

        let (_, mine) = app.get("/v1/requests", &user).await;
        assert_eq!(mine[0]["status"], "APPROVED");
        assert_eq!(app.level(&user, BASIC_MATH).await, "UNLIMITED");
    }
}
