//! End-to-end tests for the HTTP endpoints.
//!
//! The full router runs against an in-memory SQLite database and a known
//! admin secret; requests go through `tower::ServiceExt::oneshot` so no
//! socket is involved.

use std::sync::Arc;

use axum::{
    body::Body,
    http::{Request, StatusCode},
};
use chrono::{Duration, Utc};
use serde_json::{json, Value};
use sqlx::sqlite::SqlitePoolOptions;
use tower::ServiceExt;

use keygate::license::LicenseStatus;
use keygate::server::database::Database;
use keygate::server::handlers::AppState;
use keygate::server::routes::build_router;

const ADMIN_KEY: &str = "test-admin-secret";

/// Helper to create a test database and app state.
async fn setup_test_app() -> AppState {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await
        .expect("failed to connect");

    let db = Arc::new(Database::SQLite(pool));
    db.init_schema().await.expect("failed to create schema");

    AppState::new(db, ADMIN_KEY)
}

/// Helper to make a JSON request to the app.
async fn json_request(
    app: axum::Router,
    method: &str,
    uri: &str,
    body: Option<Value>,
) -> (StatusCode, Value) {
    let body_bytes = body
        .map(|v| serde_json::to_vec(&v).unwrap())
        .unwrap_or_default();

    let request = Request::builder()
        .method(method)
        .uri(uri)
        .header("Content-Type", "application/json")
        .body(Body::from(body_bytes))
        .unwrap();

    let response = app.oneshot(request).await.unwrap();
    let status = response.status();

    let body_bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let body: Value = serde_json::from_slice(&body_bytes).unwrap_or(json!({}));

    (status, body)
}

/// Create a license through the API, panicking on failure.
async fn create_license(state: &AppState, license_key: &str, expiry_date: &str) {
    let (status, body) = json_request(
        build_router(state.clone()),
        "POST",
        "/api/v1/create",
        Some(json!({
            "admin_key": ADMIN_KEY,
            "license_key": license_key,
            "expiry_date": expiry_date,
        })),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "create failed: {body}");
}

#[tokio::test]
async fn health_check_reports_running() {
    let state = setup_test_app().await;

    let (status, body) = json_request(build_router(state), "GET", "/", None).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "RUNNING");
    assert_eq!(body["message"], "License Server is Online");
    assert!(body.get("time").is_some());
}

#[tokio::test]
async fn create_requires_the_admin_secret() {
    let state = setup_test_app().await;

    // Wrong key
    let (status, body) = json_request(
        build_router(state.clone()),
        "POST",
        "/api/v1/create",
        Some(json!({
            "admin_key": "wrong",
            "license_key": "KEY1",
            "expiry_date": "2099-01-01",
        })),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["status"], "FAIL");
    assert_eq!(body["message"], "Admin key incorrect.");

    // Missing key entirely
    let (status, _) = json_request(
        build_router(state),
        "POST",
        "/api/v1/create",
        Some(json!({
            "license_key": "KEY1",
            "expiry_date": "2099-01-01",
        })),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn create_rejects_missing_fields_and_bad_dates() {
    let state = setup_test_app().await;

    let (status, body) = json_request(
        build_router(state.clone()),
        "POST",
        "/api/v1/create",
        Some(json!({ "admin_key": ADMIN_KEY, "license_key": "KEY1" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "Missing data.");

    let (status, body) = json_request(
        build_router(state),
        "POST",
        "/api/v1/create",
        Some(json!({
            "admin_key": ADMIN_KEY,
            "license_key": "KEY1",
            "expiry_date": "01/01/2099",
        })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "Invalid date format.");
}

#[tokio::test]
async fn create_conflicts_on_duplicate_key() {
    let state = setup_test_app().await;
    create_license(&state, "KEY1", "2099-01-01").await;

    let (status, body) = json_request(
        build_router(state),
        "POST",
        "/api/v1/create",
        Some(json!({
            "admin_key": ADMIN_KEY,
            "license_key": "KEY1",
            "expiry_date": "2030-06-30",
        })),
    )
    .await;

    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["status"], "FAIL");
    assert_eq!(body["message"], "License key already exists.");
}

#[tokio::test]
async fn activate_binds_then_rejects_other_machines() {
    let state = setup_test_app().await;
    create_license(&state, "KEY1", "2099-01-01").await;

    // First activation binds
    let (status, body) = json_request(
        build_router(state.clone()),
        "POST",
        "/api/v1/activate",
        Some(json!({ "license_key": "KEY1", "machine_id": "MACHINE-A" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ACTIVATED");
    assert_eq!(body["expiry_date"], "2099-01-01");

    // Same machine again: idempotent
    let (status, body) = json_request(
        build_router(state.clone()),
        "POST",
        "/api/v1/activate",
        Some(json!({ "license_key": "KEY1", "machine_id": "MACHINE-A" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["expiry_date"], "2099-01-01");

    // Different machine: forbidden
    let (status, body) = json_request(
        build_router(state),
        "POST",
        "/api/v1/activate",
        Some(json!({ "license_key": "KEY1", "machine_id": "MACHINE-B" })),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["status"], "FAIL");
    assert_eq!(body["message"], "Activated on another device.");
}

#[tokio::test]
async fn activate_missing_fields_and_unknown_keys() {
    let state = setup_test_app().await;

    let (status, body) = json_request(
        build_router(state.clone()),
        "POST",
        "/api/v1/activate",
        Some(json!({ "license_key": "KEY1" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "Missing info");

    // Empty body behaves like missing fields, not a framework error
    let (status, _) =
        json_request(build_router(state.clone()), "POST", "/api/v1/activate", None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) = json_request(
        build_router(state),
        "POST",
        "/api/v1/activate",
        Some(json!({ "license_key": "NOPE", "machine_id": "MACHINE-A" })),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["message"], "License not found.");
}

#[tokio::test]
async fn validate_requires_a_prior_activation() {
    let state = setup_test_app().await;
    create_license(&state, "KEY1", "2099-01-01").await;

    // Never activated: the null binding never matches
    let (status, body) = json_request(
        build_router(state),
        "POST",
        "/api/v1/validate",
        Some(json!({ "license_key": "KEY1", "machine_id": "MACHINE-A" })),
    )
    .await;

    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["status"], "FAIL");
    assert_eq!(body["message"], "Machine ID mismatch.");
}

#[tokio::test]
async fn validate_flags_expired_licenses_stably() {
    let state = setup_test_app().await;
    let yesterday = (Utc::now().date_naive() - Duration::days(1))
        .format("%Y-%m-%d")
        .to_string();
    create_license(&state, "KEY1", &yesterday).await;

    let (status, body) = json_request(
        build_router(state.clone()),
        "POST",
        "/api/v1/validate",
        Some(json!({ "license_key": "KEY1", "machine_id": "MACHINE-A" })),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["status"], "EXPIRED");
    assert_eq!(body["message"], "Expired.");

    // The flip is persisted
    let stored = state
        .registry
        .database()
        .get_by_key("KEY1")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(stored.status, LicenseStatus::Expired);

    // A second validate still reports EXPIRED
    let (status, body) = json_request(
        build_router(state),
        "POST",
        "/api/v1/validate",
        Some(json!({ "license_key": "KEY1", "machine_id": "MACHINE-A" })),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["status"], "EXPIRED");
}

#[tokio::test]
async fn blocked_licenses_report_their_own_status() {
    let state = setup_test_app().await;
    create_license(&state, "KEY1", "2099-01-01").await;

    // An admin writes BLOCKED directly to the store
    let mut license = state
        .registry
        .database()
        .get_by_key("KEY1")
        .await
        .unwrap()
        .unwrap();
    license.status = LicenseStatus::Blocked;
    state
        .registry
        .database()
        .update_license(&license)
        .await
        .unwrap();

    let (status, body) = json_request(
        build_router(state),
        "POST",
        "/api/v1/activate",
        Some(json!({ "license_key": "KEY1", "machine_id": "MACHINE-A" })),
    )
    .await;

    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["status"], "BLOCKED");
    assert_eq!(body["message"], "License is BLOCKED.");
}

#[tokio::test]
async fn extend_and_relicense_are_admin_only() {
    let state = setup_test_app().await;
    create_license(&state, "KEY1", "2099-01-01").await;

    let (status, _) = json_request(
        build_router(state.clone()),
        "POST",
        "/api/v1/extend",
        Some(json!({ "license_key": "KEY1", "days_to_add": 30 })),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = json_request(
        build_router(state),
        "POST",
        "/api/v1/relicense",
        Some(json!({ "admin_key": "wrong", "license_key": "KEY1", "new_machine_id": "M2" })),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn extend_unknown_key_is_not_found() {
    let state = setup_test_app().await;

    let (status, body) = json_request(
        build_router(state),
        "POST",
        "/api/v1/extend",
        Some(json!({ "admin_key": ADMIN_KEY, "license_key": "NOPE", "days_to_add": 30 })),
    )
    .await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["status"], "FAIL");
}

#[tokio::test]
async fn relicense_rebinds_and_reactivates() {
    let state = setup_test_app().await;
    create_license(&state, "KEY1", "2099-01-01").await;

    // Bind to A, then admin moves it to B
    let (status, _) = json_request(
        build_router(state.clone()),
        "POST",
        "/api/v1/activate",
        Some(json!({ "license_key": "KEY1", "machine_id": "MACHINE-A" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = json_request(
        build_router(state.clone()),
        "POST",
        "/api/v1/relicense",
        Some(json!({
            "admin_key": ADMIN_KEY,
            "license_key": "KEY1",
            "new_machine_id": "MACHINE-B",
        })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "RE-LICENSED");
    assert_eq!(body["new_machine_id"], "MACHINE-B");

    // The new machine validates; the old one no longer does
    let (status, _) = json_request(
        build_router(state.clone()),
        "POST",
        "/api/v1/validate",
        Some(json!({ "license_key": "KEY1", "machine_id": "MACHINE-B" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = json_request(
        build_router(state),
        "POST",
        "/api/v1/validate",
        Some(json!({ "license_key": "KEY1", "machine_id": "MACHINE-A" })),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn delete_removes_the_record_permanently() {
    let state = setup_test_app().await;
    create_license(&state, "KEY1", "2099-01-01").await;

    let (status, body) = json_request(
        build_router(state.clone()),
        "POST",
        "/api/v1/delete",
        Some(json!({ "admin_key": ADMIN_KEY, "license_key": "KEY1" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "DELETED");

    let (status, _) = json_request(
        build_router(state.clone()),
        "POST",
        "/api/v1/activate",
        Some(json!({ "license_key": "KEY1", "machine_id": "MACHINE-A" })),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = json_request(
        build_router(state),
        "POST",
        "/api/v1/delete",
        Some(json!({ "admin_key": ADMIN_KEY, "license_key": "KEY1" })),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn download_exports_every_license_with_count() {
    let state = setup_test_app().await;
    create_license(&state, "KEY1", "2099-01-01").await;
    create_license(&state, "KEY2", "2098-06-30").await;

    let (status, _) = json_request(
        build_router(state.clone()),
        "POST",
        "/api/v1/activate",
        Some(json!({ "license_key": "KEY1", "machine_id": "MACHINE-A" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = json_request(
        build_router(state.clone()),
        "POST",
        "/api/v1/admin/download",
        Some(json!({ "admin_key": ADMIN_KEY })),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "OK");
    assert_eq!(body["count"], 2);

    let licenses = body["licenses"].as_array().unwrap();
    assert_eq!(licenses.len(), 2);

    let key1 = licenses
        .iter()
        .find(|l| l["license_key"] == "KEY1")
        .unwrap();
    assert_eq!(key1["status"], "ACTIVE");
    assert_eq!(key1["expiry_date"], "2099-01-01");
    assert_eq!(key1["allowed_machine_id"], "MACHINE-A");
    assert!(key1.get("id").is_some());
    assert!(key1.get("created_at").is_some());
    assert!(key1.get("last_check").is_some());

    // And it is admin-gated like the other privileged endpoints
    let (status, _) = json_request(
        build_router(state),
        "POST",
        "/api/v1/admin/download",
        Some(json!({ "admin_key": "wrong" })),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

/// The end-to-end scenario from the product checklist: create, bind,
/// reject the second device, validate, shorten far into the past, observe
/// the expiry flip.
#[tokio::test]
async fn full_lifecycle_scenario() {
    let state = setup_test_app().await;

    create_license(&state, "KEY1", "2099-01-01").await;

    let (status, body) = json_request(
        build_router(state.clone()),
        "POST",
        "/api/v1/activate",
        Some(json!({ "license_key": "KEY1", "machine_id": "MACHINE-A" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ACTIVATED");
    assert_eq!(body["expiry_date"], "2099-01-01");

    let (status, _) = json_request(
        build_router(state.clone()),
        "POST",
        "/api/v1/activate",
        Some(json!({ "license_key": "KEY1", "machine_id": "MACHINE-B" })),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, body) = json_request(
        build_router(state.clone()),
        "POST",
        "/api/v1/validate",
        Some(json!({ "license_key": "KEY1", "machine_id": "MACHINE-A" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "OK");

    // Shorten by a century: expiry lands far in the past
    let (status, body) = json_request(
        build_router(state.clone()),
        "POST",
        "/api/v1/extend",
        Some(json!({ "admin_key": ADMIN_KEY, "license_key": "KEY1", "days_to_add": -36500 })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "EXTENDED");

    let (status, body) = json_request(
        build_router(state),
        "POST",
        "/api/v1/validate",
        Some(json!({ "license_key": "KEY1", "machine_id": "MACHINE-A" })),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["status"], "EXPIRED");
}
