//! cdss-at library - Audit trail sink
//!
//! Receives audit events from the other CDSS services and stores them in an
//! append-only, hash-chained table.

use axum::Router;
use std::sync::Arc;
use tower_http::trace::TraceLayer;

pub mod api;
pub mod db;

use db::AuditStore;

/// Application state shared across HTTP handlers
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<AuditStore>,
}

impl AppState {
    pub fn new(store: AuditStore) -> Self {
        Self {
            store: Arc::new(store),
        }
    }
}

/// Build application router
pub fn build_router(state: AppState) -> Router {
    use axum::routing::{get, post};

    let audit = Router::new()
        .route("/log", post(api::create_log))
        .route("/logs", get(api::get_logs))
        .route("/verify", get(api::verify_chain));

    Router::new()
        .nest("/audit", audit)
        .merge(api::health_routes())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
