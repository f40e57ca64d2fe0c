//! cdss-xa library - Analysis dispatcher and report store
//!
//! Runs the explainable analysis strategy registered for an artifact's tag
//! and keeps the resulting reports.

use axum::Router;
use std::sync::Arc;
use tower_http::trace::TraceLayer;

pub mod api;
pub mod artifacts;
pub mod db;
pub mod models;
pub mod service;
pub mod strategy;

pub use service::AnalysisService;

/// Application state shared across HTTP handlers
#[derive(Clone)]
pub struct AppState {
    pub service: Arc<AnalysisService>,
}

impl AppState {
    pub fn new(service: AnalysisService) -> Self {
        Self {
            service: Arc::new(service),
        }
    }
}

/// Build application router
pub fn build_router(state: AppState) -> Router {
    use axum::routing::{get, post};

    let explainable_ai = Router::new()
        .route("/analyse", post(api::analyse))
        .route("/reports/:account_id", get(api::reports));

    Router::new()
        .nest("/explainable_ai", explainable_ai)
        .merge(api::health_routes())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
