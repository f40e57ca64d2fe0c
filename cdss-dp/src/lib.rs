//! cdss-dp library - Preprocessing pipeline
//!
//! Turns raw clinical payloads into canonical artifacts according to their
//! strategy tag and stores them for the analysis service.

use axum::Router;
use cdss_common::config::DEFAULT_BODY_LIMIT_BYTES;
use std::sync::Arc;
use tower_http::trace::TraceLayer;

pub mod api;
pub mod db;
pub mod pipeline;
pub mod service;

pub use service::DataService;

/// Application state shared across HTTP handlers
#[derive(Clone)]
pub struct AppState {
    pub service: Arc<DataService>,
    /// Request body cap for the `/data_processing` routes
    pub body_limit: usize,
}

impl AppState {
    pub fn new(service: DataService) -> Self {
        Self {
            service: Arc::new(service),
            body_limit: DEFAULT_BODY_LIMIT_BYTES,
        }
    }

    pub fn with_body_limit(mut self, bytes: usize) -> Self {
        self.body_limit = bytes;
        self
    }
}

/// Build application router
pub fn build_router(state: AppState) -> Router {
    use axum::extract::DefaultBodyLimit;
    use axum::routing::{get, post};

    let data_processing = Router::new()
        .route("/process", post(api::process))
        .route("/retrieve/:id", get(api::retrieve))
        .layer(DefaultBodyLimit::max(state.body_limit));

    Router::new()
        .nest("/data_processing", data_processing)
        .merge(api::health_routes())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
