//! HTTP API handlers for cdss-xa

pub mod handlers;
pub mod health;

pub use handlers::{analyse, reports};
pub use health::health_routes;
