//! cdss-gw library - Gateway
//!
//! The only CDSS service callers address. Authenticates bearer tokens with
//! cdss-au, then sequences cdss-dp preprocessing and cdss-xa analysis.

use axum::{body::Body, http::Request, Router};
use cdss_common::config::DEFAULT_BODY_LIMIT_BYTES;
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use uuid::Uuid;

pub mod api;
pub mod auth;
pub mod clients;
pub mod service;

pub use service::Gateway;

/// Application state shared across HTTP handlers
#[derive(Clone)]
pub struct AppState {
    pub gateway: Arc<Gateway>,
    /// Request body cap for the `/gateway` routes
    pub body_limit: usize,
}

impl AppState {
    pub fn new(gateway: Gateway) -> Self {
        Self {
            gateway: Arc::new(gateway),
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

    let gateway = Router::new()
        .route("/register", post(api::register))
        .route("/login", post(api::login))
        .route("/analyse", post(api::analyse))
        .route("/reports", get(api::reports))
        // Raw images arrive base64-encoded inside the JSON body
        .layer(DefaultBodyLimit::max(state.body_limit));

    Router::new()
        .nest("/gateway", gateway)
        .merge(api::health_routes())
        .layer(TraceLayer::new_for_http().make_span_with(|request: &Request<Body>| {
            tracing::info_span!(
                "request",
                request_id = %Uuid::new_v4(),
                method = %request.method(),
                path = %request.uri().path(),
            )
        }))
        // Browser clients call the gateway directly
        .layer(CorsLayer::permissive())
        .with_state(state)
}
