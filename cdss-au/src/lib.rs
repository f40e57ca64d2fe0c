//! cdss-au library - Credential and token authority
//!
//! Owns accounts, verifies passwords and issues/validates bearer tokens for
//! the rest of CDSS.

use axum::Router;
use std::sync::Arc;
use tower_http::trace::TraceLayer;

pub mod api;
pub mod db;
pub mod password;
pub mod service;
pub mod token;

pub use service::AuthService;

/// Settings key under which a generated signing secret is stored
pub const TOKEN_SECRET_KEY: &str = "token_secret";

/// Application state shared across HTTP handlers
#[derive(Clone)]
pub struct AppState {
    pub service: Arc<AuthService>,
}

impl AppState {
    pub fn new(service: AuthService) -> Self {
        Self {
            service: Arc::new(service),
        }
    }
}

/// Build application router
pub fn build_router(state: AppState) -> Router {
    use axum::routing::post;

    let authentication = Router::new()
        .route("/register", post(api::register))
        .route("/login", post(api::login))
        .route("/validate", post(api::validate));

    Router::new()
        .nest("/authentication", authentication)
        .merge(api::health_routes())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
