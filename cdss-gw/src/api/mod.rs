//! HTTP API handlers for cdss-gw

pub mod handlers;
pub mod health;

pub use handlers::{analyse, login, register, reports};
pub use health::health_routes;
