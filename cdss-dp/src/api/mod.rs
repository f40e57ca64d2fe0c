//! HTTP API handlers for cdss-dp

pub mod handlers;
pub mod health;

pub use handlers::{process, retrieve};
pub use health::health_routes;
