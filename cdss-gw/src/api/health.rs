//! Health check endpoint

use axum::{routing::get, Json, Router};
use cdss_common::api::HealthResponse;

use crate::AppState;

/// GET /health
///
/// No authentication required.
pub async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        module: "cdss-gw".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

/// Build health check routes
pub fn health_routes() -> Router<AppState> {
    Router::new().route("/health", get(health_check))
}
