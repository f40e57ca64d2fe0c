//! Shared HTTP API functionality
//!
//! Error taxonomy, request extractors and the DTOs exchanged between the
//! five CDSS services:
//! - cdss-gw (Gateway)
//! - cdss-au (Credential/Token Authority)
//! - cdss-dp (Preprocessing Pipeline)
//! - cdss-xa (Analysis Dispatcher and Report Store)
//! - cdss-at (Audit Sink)

pub mod error;
pub mod extract;
pub mod types;

pub use error::{ApiError, ApiResult, ErrorBody};
pub use extract::ApiJson;
pub use types::*;
