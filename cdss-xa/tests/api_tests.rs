//! Integration tests for cdss-xa API endpoints
//!
//! Tests cover:
//! - Analysis through the standard registry with stub model adapters
//! - Error codes for unknown/unavailable strategies and missing artifacts
//! - Report listing with the optional patient filter
//! - The HTTP artifact source against a stand-in preprocessing service
//! - Model hub failures degrade the report without leaking the hub's body

use async_trait::async_trait;
use axum::{
    body::Body,
    http::{header, Request, StatusCode},
    routing::{get, post},
    Json, Router,
};
use cdss_common::api::{ApiError, ApiResult, ArtifactView, ErrorBody};
use cdss_common::audit::{AuditSubject, DeliveryMode, MemoryObserver};
use cdss_common::payload::CanonicalPayload;
use cdss_xa::artifacts::{ArtifactSource, HttpArtifactSource};
use cdss_xa::models::{ModelError, ModelHubClient, TabularModel};
use cdss_xa::strategy::{ModelAdapters, StrategyRegistry};
use cdss_xa::{build_router, db::ReportStore, AnalysisService, AppState};
use chrono::Utc;
use http_body_util::BodyExt;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::Arc;
use tower::util::ServiceExt;

struct StubArtifacts(HashMap<i64, ArtifactView>);

#[async_trait]
impl ArtifactSource for StubArtifacts {
    async fn fetch(&self, artifact_id: i64) -> ApiResult<ArtifactView> {
        self.0
            .get(&artifact_id)
            .cloned()
            .ok_or_else(|| ApiError::NotFound(format!("artifact {} not found", artifact_id)))
    }
}

struct StubHeartModel;

#[async_trait]
impl TabularModel for StubHeartModel {
    async fn risk_probability(&self, features: &[f64]) -> Result<f64, ModelError> {
        // Older patients are riskier
        Ok(if features[0] >= 60.0 { 0.83 } else { 0.21 })
    }

    async fn attributions(&self, _features: &[f64]) -> Result<Vec<f64>, ModelError> {
        Err(ModelError::Output("explainer unavailable".into()))
    }
}

fn artifact(id: i64, tag: &str, payload: CanonicalPayload) -> (i64, ArtifactView) {
    (
        id,
        ArtifactView {
            id,
            tag: tag.to_string(),
            payload: payload.encode(),
            created_at: Utc::now(),
        },
    )
}

fn features(age: f64) -> CanonicalPayload {
    let mut values = vec![0.0; 18];
    values[0] = age;
    values[2] = 250.0;
    CanonicalPayload::Vector(values)
}

async fn setup_app() -> (Router, Arc<MemoryObserver>) {
    setup_app_with(Arc::new(StubHeartModel)).await
}

async fn setup_app_with(tabular: Arc<dyn TabularModel>) -> (Router, Arc<MemoryObserver>) {
    let artifacts = StubArtifacts(HashMap::from([
        artifact(1, "numeric", features(67.0)),
        artifact(2, "numeric", features(41.0)),
        artifact(3, "text", CanonicalPayload::Text("persistent cough".into())),
        artifact(4, "signal", CanonicalPayload::Vector(vec![0.0, 0.4, 1.0])),
    ]));

    let adapters = ModelAdapters {
        tabular: Some(tabular),
        ..Default::default()
    };

    let reports = ReportStore::new(cdss_common::db::connect_in_memory().await.unwrap())
        .await
        .unwrap();
    let audit = Arc::new(MemoryObserver::new());
    let subject = AuditSubject::new(DeliveryMode::Inline);
    subject.attach(audit.clone());

    let service = AnalysisService::new(
        StrategyRegistry::standard(adapters),
        Arc::new(artifacts),
        reports,
        subject,
    );
    (build_router(AppState::new(service)), audit)
}

fn analyse(strategy: &str, artifact_id: i64, patient: &str) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/explainable_ai/analyse")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(
            json!({
                "account_id": 5,
                "patient_hashed_id": patient,
                "strategy": strategy,
                "artifact_id": artifact_id
            })
            .to_string(),
        ))
        .unwrap()
}

fn get_uri(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

async fn send(app: &Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    (status, serde_json::from_slice(&bytes).unwrap_or(Value::Null))
}

#[tokio::test]
async fn test_health_endpoint() {
    let (app, _) = setup_app().await;
    let (status, body) = send(&app, get_uri("/health")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["module"], "cdss-xa");
}

#[tokio::test]
async fn test_numeric_analysis_report() {
    let (app, audit) = setup_app().await;

    let (status, body) = send(&app, analyse("numeric", 1, "aa11")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "Analysis completed successfully");

    let report = &body["report"];
    assert_eq!(report["diagnosis"], "High");
    assert_eq!(report["confidence"], 0.83);
    assert_eq!(report["account_id"], 5);
    assert_eq!(report["patient_hashed_id"], "aa11");
    assert_eq!(report["artifact_id"], 1);

    // Attribution failed, so the clinical rules explain the result
    let factors: Vec<Value> = serde_json::from_str(report["explanation"].as_str().unwrap()).unwrap();
    assert_eq!(factors[0]["feature"], "Cholesterol");

    assert_eq!(audit.event_kinds(), vec!["analysis_completed"]);
}

#[tokio::test]
async fn test_strategy_errors() {
    let (app, _) = setup_app().await;

    let (status, body) = send(&app, analyse("genome", 1, "aa11")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "STRATEGY_NOT_FOUND");

    // No model hub classifier configured
    let (status, body) = send(&app, analyse("text", 3, "aa11")).await;
    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert_eq!(body["code"], "STRATEGY_UNAVAILABLE");

    let (status, body) = send(&app, analyse("numeric", 404, "aa11")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["code"], "NOT_FOUND");

    let (status, body) = send(&app, analyse("numeric", 3, "aa11")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "VALIDATION_ERROR");
}

#[tokio::test]
async fn test_signal_without_generator_is_degraded_report() {
    let (app, _) = setup_app().await;

    let (status, body) = send(&app, analyse("signal", 4, "aa11")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["report"]["diagnosis"], "N/A");
    assert_eq!(body["report"]["confidence"], 0.0);
}

#[tokio::test]
async fn test_reports_filtered_by_patient() {
    let (app, audit) = setup_app().await;
    send(&app, analyse("numeric", 1, "aa11")).await;
    send(&app, analyse("numeric", 2, "bb22")).await;
    audit.clear();

    let (status, body) = send(&app, get_uri("/explainable_ai/reports/5")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["reports"].as_array().unwrap().len(), 2);

    let (_, body) = send(&app, get_uri("/explainable_ai/reports/5?patient_hashed_id=bb22")).await;
    let reports = body["reports"].as_array().unwrap();
    assert_eq!(reports.len(), 1);
    assert_eq!(reports[0]["diagnosis"], "Low");

    let (_, body) = send(&app, get_uri("/explainable_ai/reports/6")).await;
    assert_eq!(body["message"], "No reports retrieved");
    assert!(body["reports"].as_array().unwrap().is_empty());

    assert_eq!(
        audit.event_kinds(),
        vec!["reports_all", "reports_patient", "reports_all"]
    );
}

/// Serve a stand-in preprocessing service on an ephemeral port
async fn spawn_preprocessing() -> String {
    let stored = ArtifactView {
        id: 1,
        tag: "text".into(),
        payload: CanonicalPayload::Text("fever".into()).encode(),
        created_at: Utc::now(),
    };

    let app = Router::new().route(
        "/data_processing/retrieve/:id",
        get(move |axum::extract::Path(id): axum::extract::Path<i64>| {
            let stored = stored.clone();
            async move {
                if id == stored.id {
                    Ok(Json(json!({"message": "ok", "artifact": stored})))
                } else {
                    Err((
                        StatusCode::NOT_FOUND,
                        Json(ErrorBody {
                            code: "NOT_FOUND".into(),
                            message: "Resource not found".into(),
                        }),
                    ))
                }
            }
        }),
    );

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{}", addr)
}

#[tokio::test]
async fn test_http_artifact_source() {
    let base = spawn_preprocessing().await;
    let source = HttpArtifactSource::new(&base, 2000).unwrap();

    let artifact = source.fetch(1).await.unwrap();
    assert_eq!(artifact.tag, "text");
    assert_eq!(
        CanonicalPayload::decode(&artifact.payload).unwrap(),
        CanonicalPayload::Text("fever".into())
    );

    assert!(matches!(source.fetch(2).await.unwrap_err(), ApiError::NotFound(_)));
}

/// Serve a model hub that fails every prediction with a plain-text traceback
async fn spawn_failing_hub() -> String {
    let app = Router::new().route(
        "/predict",
        post(|| async {
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Traceback (most recent call last):\n  File \"/srv/hub/predict.py\", line 88\nValueError: bad input",
            )
        }),
    );

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{}", addr)
}

#[tokio::test]
async fn test_hub_error_text_kept_out_of_report() {
    let hub = ModelHubClient::new(&spawn_failing_hub().await, 2000).unwrap();
    let (app, _) = setup_app_with(Arc::new(hub)).await;

    let (status, body) = send(&app, analyse("numeric", 1, "aa11")).await;
    assert_eq!(status, StatusCode::OK);

    let report = &body["report"];
    assert_eq!(report["diagnosis"], "N/A");
    let explanation = report["explanation"].as_str().unwrap();
    assert!(explanation.contains("HTTP 500"), "{}", explanation);
    assert!(!explanation.contains("Traceback"), "{}", explanation);
    assert!(!explanation.contains("/srv/hub"), "{}", explanation);

    // Stored copy matches what was returned
    let (_, body) = send(&app, get_uri("/explainable_ai/reports/5")).await;
    assert_eq!(body["reports"][0]["explanation"], explanation);
}
