//! # CDSS Common Library
//!
//! Shared code for all CDSS microservices including:
//! - Caller-visible error taxonomy and its HTTP mapping
//! - API request/response types exchanged between services
//! - The audit side-channel (observer subject + HTTP forwarder)
//! - Upstream HTTP client with bounded timeouts
//! - Canonical payload encoding shared by preprocessing and analysis
//! - Configuration loading and root folder resolution
//! - Database bootstrap helpers

pub mod api;
pub mod audit;
pub mod canonical;
pub mod config;
#[cfg(feature = "sqlx")]
pub mod db;
pub mod error;
pub mod http;
pub mod payload;
pub mod schema;
pub mod shutdown;
pub mod time;

pub use api::error::{ApiError, ApiResult};
pub use error::{Error, Result};
pub use http::{UpstreamClient, UpstreamError};
