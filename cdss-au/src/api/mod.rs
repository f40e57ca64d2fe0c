//! HTTP API handlers for cdss-au

pub mod handlers;
pub mod health;

pub use handlers::{login, register, validate};
pub use health::health_routes;
