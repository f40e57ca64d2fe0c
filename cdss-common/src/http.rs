//! HTTP client for calls between CDSS services and to external collaborators
//!
//! Every call is bounded by the configured timeout. Failures are classified
//! into [`UpstreamError`] naming the service, so the caller can report which
//! step failed without leaking transport details.

use crate::api::error::ErrorBody;
use serde::{de::DeserializeOwned, Serialize};
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

/// Failure of a remote call
#[derive(Debug, Clone, Error, PartialEq)]
pub enum UpstreamError {
    /// Connection could not be established or was dropped
    #[error("{service} unreachable: {reason}")]
    Unreachable { service: String, reason: String },

    /// No response within the configured bound
    #[error("{service} timed out after {timeout_ms} ms")]
    Timeout { service: String, timeout_ms: u64 },

    /// Service answered with a non-success status
    #[error("{service} rejected the request ({status}): {message}")]
    Rejected {
        service: String,
        status: u16,
        code: Option<String>,
        message: String,
    },

    /// Success status, but the body did not match the expected shape
    #[error("{service} returned a malformed response: {reason}")]
    Malformed { service: String, reason: String },
}

impl UpstreamError {
    pub fn service(&self) -> &str {
        match self {
            UpstreamError::Unreachable { service, .. }
            | UpstreamError::Timeout { service, .. }
            | UpstreamError::Rejected { service, .. }
            | UpstreamError::Malformed { service, .. } => service,
        }
    }

    /// HTTP status of a rejection, `None` for transport failures
    pub fn status(&self) -> Option<u16> {
        match self {
            UpstreamError::Rejected { status, .. } => Some(*status),
            _ => None,
        }
    }
}

/// JSON client bound to one remote service
#[derive(Debug, Clone)]
pub struct UpstreamClient {
    http: reqwest::Client,
    service: String,
    base_url: String,
    timeout_ms: u64,
}

impl UpstreamClient {
    /// `base_url` is the service root including any route prefix, e.g.
    /// `http://127.0.0.1:5801/authentication`
    pub fn new(service: &str, base_url: &str, timeout_ms: u64) -> Result<Self, UpstreamError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_millis(timeout_ms))
            .user_agent(concat!("cdss/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| UpstreamError::Unreachable {
                service: service.to_string(),
                reason: format!("client setup failed: {}", e),
            })?;

        Ok(Self {
            http,
            service: service.to_string(),
            base_url: base_url.trim_end_matches('/').to_string(),
            timeout_ms,
        })
    }

    pub fn service(&self) -> &str {
        &self.service
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    /// POST a JSON body and decode a JSON response
    pub async fn post_json<B, R>(&self, path: &str, body: &B) -> Result<R, UpstreamError>
    where
        B: Serialize + ?Sized,
        R: DeserializeOwned,
    {
        let url = self.url(path);
        debug!("POST {}", url);
        let response = self
            .http
            .post(&url)
            .json(body)
            .send()
            .await
            .map_err(|e| self.transport_error(e))?;
        self.decode(response).await
    }

    /// GET and decode a JSON response
    pub async fn get_json<R>(&self, path: &str) -> Result<R, UpstreamError>
    where
        R: DeserializeOwned,
    {
        let url = self.url(path);
        debug!("GET {}", url);
        let response = self
            .http
            .get(&url)
            .send()
            .await
            .map_err(|e| self.transport_error(e))?;
        self.decode(response).await
    }

    /// GET with query parameters and decode a JSON response
    pub async fn get_json_with_query<Q, R>(&self, path: &str, query: &Q) -> Result<R, UpstreamError>
    where
        Q: Serialize + ?Sized,
        R: DeserializeOwned,
    {
        let url = self.url(path);
        debug!("GET {}", url);
        let response = self
            .http
            .get(&url)
            .query(query)
            .send()
            .await
            .map_err(|e| self.transport_error(e))?;
        self.decode(response).await
    }

    fn transport_error(&self, err: reqwest::Error) -> UpstreamError {
        if err.is_timeout() {
            UpstreamError::Timeout {
                service: self.service.clone(),
                timeout_ms: self.timeout_ms,
            }
        } else {
            UpstreamError::Unreachable {
                service: self.service.clone(),
                reason: err.to_string(),
            }
        }
    }

    async fn decode<R: DeserializeOwned>(&self, response: reqwest::Response) -> Result<R, UpstreamError> {
        let status = response.status();
        let bytes = response.bytes().await.map_err(|e| self.transport_error(e))?;

        if status.is_success() {
            return serde_json::from_slice(&bytes).map_err(|e| UpstreamError::Malformed {
                service: self.service.clone(),
                reason: e.to_string(),
            });
        }

        Err(rejection(&self.service, status.as_u16(), &bytes))
    }
}

/// Build a `Rejected` error from a non-success response body
///
/// A `{code, message}` body is carried over verbatim; anything else keeps the
/// status with a generic message.
pub fn rejection(service: &str, status: u16, body: &[u8]) -> UpstreamError {
    match serde_json::from_slice::<ErrorBody>(body) {
        Ok(parsed) => UpstreamError::Rejected {
            service: service.to_string(),
            status,
            code: Some(parsed.code),
            message: parsed.message,
        },
        Err(_) => {
            // Foreign bodies (tracebacks, proxy pages) stay out of the message
            debug!(
                "{} rejected with HTTP {}: {}",
                service,
                status,
                String::from_utf8_lossy(body).trim()
            );
            UpstreamError::Rejected {
                service: service.to_string(),
                status,
                code: None,
                message: format!("HTTP {}", status),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rejection_parses_error_body() {
        let err = rejection(
            "authentication",
            401,
            br#"{"code":"INVALID_TOKEN","message":"Invalid token: expired"}"#,
        );
        assert_eq!(
            err,
            UpstreamError::Rejected {
                service: "authentication".into(),
                status: 401,
                code: Some("INVALID_TOKEN".into()),
                message: "Invalid token: expired".into(),
            }
        );
        assert_eq!(err.status(), Some(401));
    }

    #[test]
    fn test_rejection_with_plain_body() {
        let traceback = b"Traceback (most recent call last):\n  File \"/srv/hub/app.py\", line 12\nKeyError: 'inputs'";
        for (status, body) in [(503, &b""[..]), (500, &traceback[..])] {
            match rejection("model_hub", status, body) {
                UpstreamError::Rejected { code, message, .. } => {
                    assert!(code.is_none());
                    assert_eq!(message, format!("HTTP {}", status));
                }
                other => panic!("unexpected {:?}", other),
            }
        }
    }

    #[test]
    fn test_url_joining() {
        let client = UpstreamClient::new("audit", "http://127.0.0.1:5804/audit/", 1000).unwrap();
        assert_eq!(client.url("/log"), "http://127.0.0.1:5804/audit/log");
        assert_eq!(client.url("logs"), "http://127.0.0.1:5804/audit/logs");
    }

    #[tokio::test]
    async fn test_unreachable_service() {
        // Bind then drop a listener so the port is known to be closed
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        let client =
            UpstreamClient::new("data_processing", &format!("http://127.0.0.1:{}", port), 2000)
                .unwrap();
        let result: Result<serde_json::Value, _> = client.get_json("/health").await;

        match result {
            Err(UpstreamError::Unreachable { service, .. }) => assert_eq!(service, "data_processing"),
            other => panic!("expected Unreachable, got {:?}", other),
        }
    }
}
