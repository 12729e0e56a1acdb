//! Test session endpoint tests
//!
//! - POST /v1/tests
//! - POST /v1/tests/{id}/progress | pause | resume | complete
//! - POST /v1/admin/tests/{id}/cancel
//! - DELETE /v1/admin/tests/{id}

use axum::http::{Method, StatusCode};
use serde_json::json;
use serial_test::serial;

use crate::common::{error_code, TestApp, BASIC_MATH, DIGITAL_LITERACY, TYPING_KEYBOARD};
use skillgate_content::mock::MockContentProvider;

#[test_log::test(tokio::test)]
#[serial]
#[ignore = "requires TEST_DATABASE_URL"]
async fn test_progress_pause_resume_complete() {
    let app = TestApp::with_content(MockContentProvider::with_passage("the cat sat"))
        .await
        .unwrap();
    let admin = app.admin();
    let user = app.user();
    app.set_level(&admin, &user, TYPING_KEYBOARD, "UNLIMITED").await;

    let (status, started) = app.start(&user, TYPING_KEYBOARD, false).await;
    assert_eq!(status, StatusCode::CREATED);
    let base = format!("/v1/tests/{}", started["session_id"].as_str().unwrap());

    let (status, body) = app
        .post(
            &format!("{}/progress", base),
            &user,
            json!({ "typed_text": "the", "cursor_position": 3, "keystroke": { "key": "e", "at_ms": 800 } }),
        )
        .await;
    assert_eq!(status, StatusCode::OK, "{}", body);
    assert_eq!(body["stats"]["accuracy"], 100.0);

    let (status, body) = app
        .post(
            &format!("{}/progress", base),
            &user,
            json!({ "typed_text": "the", "cursor_position": 9 }),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(error_code(&body), "VALIDATION_ERROR");

    let (status, body) = app.post(&format!("{}/pause", base), &user, json!({})).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "PAUSED");

    let (status, body) = app
        .post(
            &format!("{}/progress", base),
            &user,
            json!({ "typed_text": "the ", "cursor_position": 4 }),
        )
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(error_code(&body), "NOT_ACTIVE");

    let (status, body) = app.post(&format!("{}/resume", base), &user, json!({})).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "STARTED");
    assert_eq!(body["keystroke_count"], 1);

    let complete = json!({ "final_typed_text": "the cat sat", "elapsed_seconds": 30.0 });
    let (status, body) = app.post(&format!("{}/complete", base), &user, complete.clone()).await;
    assert_eq!(status, StatusCode::OK, "{}", body);

    let (status, body) = app.post(&format!("{}/complete", base), &user, complete).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(error_code(&body), "NOT_ACTIVE");

    assert_eq!(app.count("test_results").await, 1);
}

#[test_log::test(tokio::test)]
#[serial]
#[ignore = "requires TEST_DATABASE_URL"]
async fn test_second_scored_start_reports_active_session() {
    let app = TestApp::new().await.unwrap();
    let admin = app.admin();
    let user = app.user();
    app.set_level(&admin, &user, DIGITAL_LITERACY, "UNLIMITED").await;

    let (status, first) = app.start(&user, DIGITAL_LITERACY, false).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(first["time_limit_seconds"], 1200);
    assert_eq!(
        first["session"]["content"].as_array().map(|q| q.len()),
        Some(20)
    );

    let (status, body) = app.start(&user, DIGITAL_LITERACY, false).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(error_code(&body), "ALREADY_ACTIVE");
    assert_eq!(body["error"]["session_id"], first["session_id"]);

    // practice attempts are not blocked by the running scored one
    let (status, _) = app.start(&user, DIGITAL_LITERACY, true).await;
    assert_eq!(status, StatusCode::CREATED);
}

#[test_log::test(tokio::test)]
#[serial]
#[ignore = "requires TEST_DATABASE_URL"]
async fn test_practice_needs_no_access_and_leaves_no_result() {
    let app = TestApp::new().await.unwrap();
    let user = app.user();

    let (status, started) = app.start(&user, BASIC_MATH, true).await;
    assert_eq!(status, StatusCode::CREATED, "{}", started);
    let session_id = started["session_id"].as_str().unwrap();

    let (status, body) = app
        .post(
            &format!("/v1/tests/{}/complete", session_id),
            &user,
            json!({ "elapsed_seconds": 120.0, "questions_total": 25, "questions_correct": 20 }),
        )
        .await;
    assert_eq!(status, StatusCode::OK, "{}", body);
    assert_eq!(body["score"]["score"], 80);
    assert!(body["result_id"].is_null());
    assert_eq!(app.count("test_results").await, 0);
}

#[test_log::test(tokio::test)]
#[serial]
#[ignore = "requires TEST_DATABASE_URL"]
async fn test_upstream_failure_has_no_side_effects() {
    let app = TestApp::with_content(MockContentProvider::failing())
        .await
        .unwrap();
    let admin = app.admin();
    let user = app.user();
    app.set_level(&admin, &user, BASIC_MATH, "ONE_TIME").await;

    let (status, body) = app.start(&user, BASIC_MATH, false).await;
    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert_eq!(error_code(&body), "UPSTREAM_ERROR");

    assert_eq!(app.content.calls(), 1);
    assert_eq!(app.level(&user, BASIC_MATH).await, "ONE_TIME");
    assert_eq!(app.count("test_sessions").await, 0);
}

#[test_log::test(tokio::test)]
#[serial]
#[ignore = "requires TEST_DATABASE_URL"]
async fn test_denied_start_skips_content_provider() {
    let app = TestApp::with_content(MockContentProvider::failing())
        .await
        .unwrap();
    let user = app.user();

    let (status, body) = app.start(&user, BASIC_MATH, false).await;
    assert_eq!(status, StatusCode::FORBIDDEN, "{}", body);
    assert_eq!(error_code(&body), "ACCESS_DENIED");
    assert_eq!(app.content.calls(), 0);
}

#[test_log::test(tokio::test)]
#[serial]
#[ignore = "requires TEST_DATABASE_URL"]
async fn test_second_start_reports_running_attempt_without_fetching() {
    let app = TestApp::new().await.unwrap();
    let admin = app.admin();
    let user = app.user();
    app.set_level(&admin, &user, BASIC_MATH, "UNLIMITED").await;

    let (status, first) = app.start(&user, BASIC_MATH, false).await;
    assert_eq!(status, StatusCode::CREATED, "{}", first);
    assert_eq!(app.content.calls(), 1);

    let (status, body) = app.start(&user, BASIC_MATH, false).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(error_code(&body), "ALREADY_ACTIVE");
    assert_eq!(body["error"]["session_id"], first["session_id"]);
    assert_eq!(app.content.calls(), 1);
}

#[test_log::test(tokio::test)]
#[serial]
#[ignore = "requires TEST_DATABASE_URL"]
async fn test_other_users_session_is_not_found() {
    let app = TestApp::new().await.unwrap();
    let owner = app.user();
    let stranger = app.user();

    let (_, started) = app.start(&owner, BASIC_MATH, true).await;
    let uri = format!("/v1/tests/{}", started["session_id"].as_str().unwrap());

    let (status, _) = app.get(&uri, &stranger).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = app.post(&format!("{}/pause", uri), &stranger, json!({})).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, body) = app.get(&uri, &owner).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "STARTED");
}

#[test_log::test(tokio::test)]
#[serial]
#[ignore = "requires TEST_DATABASE_URL"]
async fn test_admin_cancel_and_delete_are_audited() {
    let app = TestApp::new().await.unwrap();
    let admin = app.admin();
    let user = app.user();
    app.set_level(&admin, &user, TYPING_KEYBOARD, "UNLIMITED").await;

    let (_, started) = app.start(&user, TYPING_KEYBOARD, false).await;
    let session_id = started["session_id"].as_str().unwrap().to_string();
    let cancel = format!("/v1/admin/tests/{}/cancel", session_id);

    let (status, body) = app.post(&cancel, &user, json!({})).await;
    assert_eq!(status, StatusCode::FORBIDDEN, "{}", body);

    let (status, body) = app
        .post(&cancel, &admin, json!({ "reason": "proctor flagged" }))
        .await;
    assert_eq!(status, StatusCode::OK, "{}", body);
    assert_eq!(body["status"], "CANCELLED");
    assert_eq!(body["cancel_reason"], "proctor flagged");

    let (status, body) = app.post(&cancel, &admin, json!({})).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(error_code(&body), "INVALID_STATE");

    let (status, _) = app
        .send(
            Method::DELETE,
            &format!("/v1/admin/tests/{}", session_id),
            &admin,
            None,
        )
        .await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    assert_eq!(app.count("test_sessions").await, 0);

    let (status, audit) = app
        .get(&format!("/v1/admin/audit?target_id={}", session_id), &admin)
        .await;
    assert_eq!(status, StatusCode::OK);
    let actions: Vec<&str> = audit
        .as_array()
        .unwrap()
        .iter()
        .map(|e| e["action"].as_str().unwrap())
        .collect();
    assert_eq!(actions.len(), 2);
    assert!(actions.contains(&"test_cancelled"));
    assert!(actions.contains(&"test_deleted"));

    let (status, _) = app
        .send(
            Method::DELETE,
            &format!("/v1/admin/tests/{}", session_id),
            &admin,
            None,
        )
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[test_log::test(tokio::test)]
#[serial]
#[ignore = "requires TEST_DATABASE_URL"]
async fn test_delete_completed_session_removes_result() {
    let app = TestApp::new().await.unwrap();
    let admin = app.admin();
    let user = app.user();
    app.set_level(&admin, &user, BASIC_MATH, "UNLIMITED").await;

    let (_, started) = app.start(&user, BASIC_MATH, false).await;
    let session_id = started["session_id"].as_str().unwrap().to_string();
    let (status, _) = app
        .post(
            &format!("/v1/tests/{}/complete", session_id),
            &user,
            json!({ "elapsed_seconds": 60.0, "questions_total": 10, "questions_correct": 10 }),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(app.count("test_results").await, 1);

    let (status, _) = app
        .send(
            Method::DELETE,
            &format!("/v1/admin/tests/{}", session_id),
            &admin,
            None,
        )
        .await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    assert_eq!(app.count("test_results").await, 0);

    let (_, audit) = app.get("/v1/admin/audit?action=test_deleted", &admin).await;
    assert_eq!(audit[0]["detail"]["had_result"], true);
}
