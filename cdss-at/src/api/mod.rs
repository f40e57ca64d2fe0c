//! HTTP API handlers for cdss-at

pub mod health;
pub mod log;

pub use health::health_routes;
pub use log::{create_log, get_logs, verify_chain};
