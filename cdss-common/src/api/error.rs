//! Caller-visible error taxonomy
//!
//! Every service translates its failures into [`ApiError`] at its own
//! boundary. The HTTP form is always `{code, message}` so a downstream
//! service can reconstruct the error and pass it on unchanged.

use crate::http::UpstreamError;
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::error;

/// Wire form of every error response
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ErrorBody {
    pub code: String,
    pub message: String,
}

/// API error type
#[derive(Debug, Error)]
pub enum ApiError {
    /// Malformed or out-of-range request field (400)
    #[error("Validation error: {0}")]
    Validation(String),

    /// Registration with an email that already exists (400)
    #[error("Account already exists: {0}")]
    DuplicateAccount(String),

    /// Unknown email or wrong password; deliberately indistinguishable (401)
    #[error("Invalid credentials")]
    InvalidCredentials,

    /// Token signature, expiry or subject check failed (401)
    #[error("Invalid token: {0}")]
    InvalidToken(String),

    /// Gateway could not authenticate the caller (401)
    #[error("Authentication failed: {0}")]
    Authentication(String),

    /// A normalizer rejected the raw payload (400)
    #[error("Preprocessing failed for '{tag}': {reason}")]
    Preprocessing { tag: String, reason: String },

    /// No analysis strategy registered for the tag (400)
    #[error("Strategy not found: {0}")]
    StrategyNotFound(String),

    /// Strategy construction failed (502)
    #[error("Strategy '{tag}' unavailable: {reason}")]
    StrategyUnavailable { tag: String, reason: String },

    /// Resource not found (404)
    #[error("Resource not found: {0}")]
    NotFound(String),

    /// Collaborator call failed
    #[error(transparent)]
    Upstream(#[from] UpstreamError),

    /// Storage failure; details are logged, never returned (500)
    #[cfg(feature = "sqlx")]
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Internal server error (500)
    #[error("Internal server error: {0}")]
    Internal(String),
}

impl ApiError {
    /// Stable machine-readable code
    pub fn code(&self) -> &str {
        match self {
            ApiError::Validation(_) => "VALIDATION_ERROR",
            ApiError::DuplicateAccount(_) => "DUPLICATE_ACCOUNT",
            ApiError::InvalidCredentials => "INVALID_CREDENTIALS",
            ApiError::InvalidToken(_) => "INVALID_TOKEN",
            ApiError::Authentication(_) => "AUTHENTICATION_ERROR",
            ApiError::Preprocessing { .. } => "PREPROCESSING_ERROR",
            ApiError::StrategyNotFound(_) => "STRATEGY_NOT_FOUND",
            ApiError::StrategyUnavailable { .. } => "STRATEGY_UNAVAILABLE",
            ApiError::NotFound(_) => "NOT_FOUND",
            ApiError::Upstream(UpstreamError::Rejected {
                code: Some(code), ..
            }) => code.as_str(),
            ApiError::Upstream(_) => "UPSTREAM_ERROR",
            #[cfg(feature = "sqlx")]
            ApiError::Database(_) => "INTERNAL_ERROR",
            ApiError::Internal(_) => "INTERNAL_ERROR",
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Validation(_)
            | ApiError::DuplicateAccount(_)
            | ApiError::Preprocessing { .. }
            | ApiError::StrategyNotFound(_) => StatusCode::BAD_REQUEST,
            ApiError::InvalidCredentials
            | ApiError::InvalidToken(_)
            | ApiError::Authentication(_) => StatusCode::UNAUTHORIZED,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::StrategyUnavailable { .. } => StatusCode::BAD_GATEWAY,
            ApiError::Upstream(UpstreamError::Rejected { status, .. }) => {
                StatusCode::from_u16(*status).unwrap_or(StatusCode::BAD_GATEWAY)
            }
            ApiError::Upstream(_) => StatusCode::BAD_GATEWAY,
            #[cfg(feature = "sqlx")]
            ApiError::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Message safe to show the caller
    pub fn public_message(&self) -> String {
        match self {
            ApiError::Upstream(UpstreamError::Rejected { message, .. }) => message.clone(),
            #[cfg(feature = "sqlx")]
            ApiError::Database(_) => "Internal storage error".to_string(),
            ApiError::Internal(_) => "Internal server error".to_string(),
            other => other.to_string(),
        }
    }

    pub fn body(&self) -> ErrorBody {
        ErrorBody {
            code: self.code().to_string(),
            message: self.public_message(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            error!("{}", self);
        }
        (status, Json(self.body())).into_response()
    }
}

impl From<crate::Error> for ApiError {
    fn from(err: crate::Error) -> Self {
        match err {
            #[cfg(feature = "sqlx")]
            crate::Error::Database(e) => ApiError::Database(e),
            other => ApiError::Internal(other.to_string()),
        }
    }
}

/// Result type for API handlers
pub type ApiResult<T> = Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        assert_eq!(ApiError::Validation("x".into()).status(), StatusCode::BAD_REQUEST);
        assert_eq!(ApiError::DuplicateAccount("a@b.co".into()).status(), StatusCode::BAD_REQUEST);
        assert_eq!(ApiError::StrategyNotFound("dna".into()).status(), StatusCode::BAD_REQUEST);
        assert_eq!(ApiError::InvalidCredentials.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(ApiError::InvalidToken("expired".into()).status(), StatusCode::UNAUTHORIZED);
        assert_eq!(ApiError::NotFound("artifact 9".into()).status(), StatusCode::NOT_FOUND);
        assert_eq!(
            ApiError::StrategyUnavailable {
                tag: "text".into(),
                reason: "no hub".into()
            }
            .status(),
            StatusCode::BAD_GATEWAY
        );
    }

    #[test]
    fn test_rejected_upstream_passes_through() {
        let err = ApiError::Upstream(UpstreamError::Rejected {
            service: "explainable_ai".into(),
            status: 404,
            code: Some("NOT_FOUND".into()),
            message: "Resource not found: artifact 7".into(),
        });

        assert_eq!(err.status(), StatusCode::NOT_FOUND);
        assert_eq!(
            err.body(),
            ErrorBody {
                code: "NOT_FOUND".into(),
                message: "Resource not found: artifact 7".into(),
            }
        );
    }

    #[test]
    fn test_unreachable_upstream_is_bad_gateway() {
        let err = ApiError::Upstream(UpstreamError::Unreachable {
            service: "data_processing".into(),
            reason: "connection refused".into(),
        });
        assert_eq!(err.status(), StatusCode::BAD_GATEWAY);
        assert_eq!(err.code(), "UPSTREAM_ERROR");
        assert!(err.public_message().contains("data_processing"));
    }

    #[test]
    fn test_internal_message_is_sanitized() {
        let err = ApiError::Internal("disk /var/lib/cdss full".into());
        assert_eq!(err.public_message(), "Internal server error");
    }

    #[test]
    fn test_common_error_conversion() {
        let err: ApiError = crate::Error::Config("Invalid TOML in /etc/cdss/config.toml".into()).into();
        assert!(matches!(err, ApiError::Internal(_)));
        assert_eq!(err.public_message(), "Internal server error");

        let io = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied");
        let err: ApiError = crate::Error::Io(io).into();
        assert_eq!(err.code(), "INTERNAL_ERROR");

        #[cfg(feature = "sqlx")]
        {
            let err: ApiError = crate::Error::Database(sqlx::Error::RowNotFound).into();
            assert!(matches!(err, ApiError::Database(_)));
        }
    }
}
