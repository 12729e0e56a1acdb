//! One-time code endpoint tests
//!
//! - POST /v1/admin/codes
//! - POST /v1/codes/redeem
//! - POST /v1/admin/codes/{id}/deactivate
//! - DELETE /v1/admin/codes/{id}

use axum::http::{Method, StatusCode};
use serde_json::json;
use serial_test::serial;

use crate::common::{error_code, TestApp, BASIC_MATH, DIGITAL_LITERACY};

#[test_log::test(tokio::test)]
#[serial]
#[ignore = "requires TEST_DATABASE_URL"]
async fn test_generate_full_batch() {
    let app = TestApp::new().await.unwrap();
    let admin = app.admin();

    let codes = app.generate_codes(&admin, DIGITAL_LITERACY, 50).await;
    assert_eq!(codes.len(), 50);

    let mut unique = codes.clone();
    unique.sort();
    unique.dedup();
    assert_eq!(unique.len(), 50);
    assert!(codes.iter().all(|c| c.len() == 8));

    let (status, audit) = app
        .get("/v1/admin/audit?action=codes_generated", &admin)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(audit.as_array().unwrap().len(), 1);
    assert_eq!(audit[0]["detail"]["count"], 50);
}

#[test_log::test(tokio::test)]
#[serial]
#[ignore = "requires TEST_DATABASE_URL"]
async fn test_generate_rejects_oversized_batch_and_non_admins() {
    let app = TestApp::new().await.unwrap();
    let admin = app.admin();
    let user = app.user();

    let (status, body) = app
        .post(
            "/v1/admin/codes",
            &admin,
            json!({ "test_type": BASIC_MATH, "count": 51 }),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(error_code(&body), "VALIDATION_ERROR");

    let (status, _) = app
        .post(
            "/v1/admin/codes",
            &user,
            json!({ "test_type": BASIC_MATH, "count": 1 }),
        )
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    assert_eq!(app.count("one_time_codes").await, 0);
}

#[test_log::test(tokio::test)]
#[serial]
#[ignore = "requires TEST_DATABASE_URL"]
async fn test_rejected_redemption_does_not_consume_code() {
    let app = TestApp::new().await.unwrap();
    let admin = app.admin();
    let user = app.user();

    app.set_level(&admin, &user, BASIC_MATH, "UNLIMITED").await;
    let codes = app.generate_codes(&admin, BASIC_MATH, 1).await;

    let (status, body) = app
        .post("/v1/codes/redeem", &user, json!({ "code": codes[0] }))
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(error_code(&body), "ALREADY_ENTITLED");

    let (_, listed) = app.get("/v1/admin/codes", &admin).await;
    assert_eq!(listed[0]["redeemable"], true);
    assert!(listed[0]["used_by"].is_null());
}

#[test_log::test(tokio::test)]
#[serial]
#[ignore = "requires TEST_DATABASE_URL"]
async fn test_deactivate_and_delete() {
    let app = TestApp::new().await.unwrap();
    let admin = app.admin();
    let user = app.user();

    let codes = app.generate_codes(&admin, BASIC_MATH, 2).await;
    let (_, listed) = app.get("/v1/admin/codes", &admin).await;
    let id_of = |code: &str| {
        listed
            .as_array()
            .unwrap()
            .iter()
            .find(|c| c["code"] == code)
            .map(|c| c["id"].as_str().unwrap().to_string())
            .unwrap()
    };
    let first = id_of(&codes[0]);
    let second = id_of(&codes[1]);

    let (status, body) = app
        .send(
            Method::POST,
            &format!("/v1/admin/codes/{}/deactivate", first),
            &admin,
            None,
        )
        .await;
    assert_eq!(status, StatusCode::OK, "{}", body);
    assert_eq!(body["is_active"], false);

    let (status, body) = app
        .send(
            Method::POST,
            &format!("/v1/admin/codes/{}/deactivate", first),
            &admin,
            None,
        )
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(error_code(&body), "CODE_INACTIVE");

    let (status, body) = app
        .post("/v1/codes/redeem", &user, json!({ "code": codes[0] }))
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(error_code(&body), "ALREADY_USED");

    let (status, _) = app
        .post("/v1/codes/redeem", &user, json!({ "code": codes[1] }))
        .await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = app
        .send(Method::DELETE, &format!("/v1/admin/codes/{}", second), &admin, None)
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(error_code(&body), "CODE_IN_USE");

    let (status, _) = app
        .send(Method::DELETE, &format!("/v1/admin/codes/{}", first), &admin, None)
        .await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    assert_eq!(app.count("one_time_codes").await, 1);
}

#[test_log::test(tokio::test)]
#[serial]
#[ignore = "requires TEST_DATABASE_URL"]
async fn test_malformed_code_is_not_found() {
    let app = TestApp::new().await.unwrap();
    let user = app.user();

    let (status, body) = app
        .post("/v1/codes/redeem", &user, json!({ "code": "not-a-code" }))
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(error_code(&body), "NOT_FOUND");
    assert_eq!(app.count("entitlements").await, 0);
}
