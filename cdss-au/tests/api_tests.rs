//! Integration tests for cdss-au API endpoints
//!
//! Tests cover:
//! - Registration, duplicate detection and input validation
//! - Login response shape and uniform credential failures
//! - Token validation, including expiry with a fixed clock
//! - Audit events emitted per operation

use axum::{
    body::Body,
    http::{header, Request, StatusCode},
    Router,
};
use cdss_au::{build_router, db::AccountStore, token::TokenSigner, AppState, AuthService};
use cdss_common::audit::{AuditSubject, DeliveryMode, MemoryObserver};
use cdss_common::time::FixedClock;
use chrono::{Duration, Utc};
use http_body_util::BodyExt;
use serde_json::{json, Value};
use std::sync::Arc;
use tower::util::ServiceExt;

struct TestApp {
    router: Router,
    audit: Arc<MemoryObserver>,
    clock: Arc<FixedClock>,
}

async fn setup_app() -> TestApp {
    let pool = cdss_common::db::connect_in_memory().await.unwrap();
    let accounts = AccountStore::new(pool).await.unwrap();
    let clock = Arc::new(FixedClock::new(Utc::now()));
    let signer = TokenSigner::new("integration-secret", Duration::minutes(60), clock.clone());

    let audit = Arc::new(MemoryObserver::new());
    let subject = AuditSubject::new(DeliveryMode::Inline);
    subject.attach(audit.clone());

    let state = AppState::new(AuthService::new(accounts, signer, subject));
    TestApp {
        router: build_router(state),
        audit,
        clock,
    }
}

fn post_json(uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

async fn send(app: &Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, body)
}

fn alice() -> Value {
    json!({
        "name": "Alice",
        "surname": "Liddell",
        "email": "alice@example.org",
        "password": "wonderland"
    })
}

#[tokio::test]
async fn test_health_endpoint() {
    let app = setup_app().await;
    let request = Request::builder().uri("/health").body(Body::empty()).unwrap();
    let (status, body) = send(&app.router, request).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["module"], "cdss-au");
}

#[tokio::test]
async fn test_register_and_duplicate() {
    let app = setup_app().await;

    let (status, body) = send(&app.router, post_json("/authentication/register", alice())).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["account_id"], 1);

    let (status, body) = send(&app.router, post_json("/authentication/register", alice())).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "DUPLICATE_ACCOUNT");

    assert_eq!(app.audit.event_kinds(), vec!["register_success", "register_failed"]);
}

#[tokio::test]
async fn test_register_validation_errors() {
    let app = setup_app().await;

    let mut bad_email = alice();
    bad_email["email"] = json!("alice-at-example");
    let (status, body) = send(&app.router, post_json("/authentication/register", bad_email)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "VALIDATION_ERROR");

    let (status, body) = send(
        &app.router,
        post_json("/authentication/register", json!({"name": "Al"})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "VALIDATION_ERROR");
}

#[tokio::test]
async fn test_login_response_and_validate() {
    let app = setup_app().await;
    send(&app.router, post_json("/authentication/register", alice())).await;

    let (status, body) = send(
        &app.router,
        post_json(
            "/authentication/login",
            json!({"email": "alice@example.org", "password": "wonderland"}),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["account"]["id"], 1);
    assert_eq!(body["account"]["name"], "Alice");
    assert_eq!(body["account"]["email"], "alice@example.org");
    assert!(body["expires_at"].is_string());
    let token = body["token"].as_str().unwrap().to_string();

    let (status, body) = send(
        &app.router,
        post_json("/authentication/validate", json!({ "token": token })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["account_id"], 1);
}

#[tokio::test]
async fn test_login_failures_identical() {
    let app = setup_app().await;
    send(&app.router, post_json("/authentication/register", alice())).await;

    let wrong = send(
        &app.router,
        post_json(
            "/authentication/login",
            json!({"email": "alice@example.org", "password": "looking-glass"}),
        ),
    )
    .await;
    let unknown = send(
        &app.router,
        post_json(
            "/authentication/login",
            json!({"email": "hatter@example.org", "password": "wonderland"}),
        ),
    )
    .await;

    assert_eq!(wrong.0, StatusCode::UNAUTHORIZED);
    assert_eq!(wrong, unknown);
    assert_eq!(wrong.1["code"], "INVALID_CREDENTIALS");

    let events = app.audit.events();
    let unknown_event = events.last().unwrap();
    assert_eq!(unknown_event.event, "login_failed");
    assert!(unknown_event.account_id.is_none());
}

#[tokio::test]
async fn test_expired_token_rejected() {
    let app = setup_app().await;
    send(&app.router, post_json("/authentication/register", alice())).await;
    let (_, body) = send(
        &app.router,
        post_json(
            "/authentication/login",
            json!({"email": "alice@example.org", "password": "wonderland"}),
        ),
    )
    .await;
    let token = body["token"].as_str().unwrap().to_string();

    app.clock.advance(Duration::minutes(61));

    let (status, body) = send(
        &app.router,
        post_json("/authentication/validate", json!({ "token": token })),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["code"], "INVALID_TOKEN");
    assert_eq!(app.audit.events().last().unwrap().event, "token_rejected");
}
