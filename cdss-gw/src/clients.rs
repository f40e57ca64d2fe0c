//! Upstream services the gateway sequences
//!
//! Each collaborator is a trait so the orchestration can be exercised
//! without running the other services. The HTTP implementations forward
//! request bodies unchanged and surface every failure as [`UpstreamError`].

use async_trait::async_trait;
use cdss_common::api::{
    AnalysisRequest, LoginRequest, LoginResponse, ProcessRequest, ProcessResponse,
    RegisterRequest, RegisterResponse, ReportResponse, ReportView, ReportsQuery, ReportsResponse,
    ValidateRequest, ValidateResponse,
};
use cdss_common::http::{UpstreamClient, UpstreamError};

/// Credential and token authority
#[async_trait]
pub trait TokenAuthority: Send + Sync {
    async fn register(&self, request: &RegisterRequest) -> Result<RegisterResponse, UpstreamError>;

    async fn login(&self, request: &LoginRequest) -> Result<LoginResponse, UpstreamError>;

    /// Account id the token was issued for
    async fn validate(&self, token: &str) -> Result<i64, UpstreamError>;
}

/// Preprocessing pipeline
#[async_trait]
pub trait Preprocessor: Send + Sync {
    /// Normalize and store raw data, returning the artifact id
    async fn process(&self, request: &ProcessRequest) -> Result<i64, UpstreamError>;
}

/// Analysis dispatcher and report store
#[async_trait]
pub trait Analyzer: Send + Sync {
    async fn analyse(&self, request: &AnalysisRequest) -> Result<ReportView, UpstreamError>;

    async fn reports(
        &self,
        account_id: i64,
        patient_hashed_id: Option<&str>,
    ) -> Result<Vec<ReportView>, UpstreamError>;
}

fn prefixed(base_url: &str, prefix: &str) -> String {
    format!("{}/{}", base_url.trim_end_matches('/'), prefix)
}

/// `POST {authentication}/authentication/*`
pub struct HttpTokenAuthority {
    client: UpstreamClient,
}

impl HttpTokenAuthority {
    /// `base_url` is the service root without route prefix
    pub fn new(base_url: &str, timeout_ms: u64) -> Result<Self, UpstreamError> {
        Ok(Self {
            client: UpstreamClient::new(
                "authentication",
                &prefixed(base_url, "authentication"),
                timeout_ms,
            )?,
        })
    }
}

#[async_trait]
impl TokenAuthority for HttpTokenAuthority {
    async fn register(&self, request: &RegisterRequest) -> Result<RegisterResponse, UpstreamError> {
        self.client.post_json("/register", request).await
    }

    async fn login(&self, request: &LoginRequest) -> Result<LoginResponse, UpstreamError> {
        self.client.post_json("/login", request).await
    }

    async fn validate(&self, token: &str) -> Result<i64, UpstreamError> {
        let response: ValidateResponse = self
            .client
            .post_json(
                "/validate",
                &ValidateRequest {
                    token: token.to_string(),
                },
            )
            .await?;
        Ok(response.account_id)
    }
}

/// `POST {data_processing}/data_processing/process`
pub struct HttpPreprocessor {
    client: UpstreamClient,
}

impl HttpPreprocessor {
    pub fn new(base_url: &str, timeout_ms: u64) -> Result<Self, UpstreamError> {
        Ok(Self {
            client: UpstreamClient::new(
                "data_processing",
                &prefixed(base_url, "data_processing"),
                timeout_ms,
            )?,
        })
    }
}

#[async_trait]
impl Preprocessor for HttpPreprocessor {
    async fn process(&self, request: &ProcessRequest) -> Result<i64, UpstreamError> {
        let response: ProcessResponse = self.client.post_json("/process", request).await?;
        Ok(response.artifact_id)
    }
}

/// `{explainable_ai}/explainable_ai/{analyse,reports}`
pub struct HttpAnalyzer {
    client: UpstreamClient,
}

impl HttpAnalyzer {
    pub fn new(base_url: &str, timeout_ms: u64) -> Result<Self, UpstreamError> {
        Ok(Self {
            client: UpstreamClient::new(
                "explainable_ai",
                &prefixed(base_url, "explainable_ai"),
                timeout_ms,
            )?,
        })
    }
}

#[async_trait]
impl Analyzer for HttpAnalyzer {
    async fn analyse(&self, request: &AnalysisRequest) -> Result<ReportView, UpstreamError> {
        let response: ReportResponse = self.client.post_json("/analyse", request).await?;
        Ok(response.report)
    }

    async fn reports(
        &self,
        account_id: i64,
        patient_hashed_id: Option<&str>,
    ) -> Result<Vec<ReportView>, UpstreamError> {
        let query = ReportsQuery {
            patient_hashed_id: patient_hashed_id.map(str::to_string),
        };
        let response: ReportsResponse = self
            .client
            .get_json_with_query(&format!("/reports/{}", account_id), &query)
            .await?;
        Ok(response.reports)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prefix_joining() {
        assert_eq!(
            prefixed("http://127.0.0.1:5801/", "authentication"),
            "http://127.0.0.1:5801/authentication"
        );
        assert_eq!(
            prefixed("http://10.0.0.2:5803", "explainable_ai"),
            "http://10.0.0.2:5803/explainable_ai"
        );
    }

    #[tokio::test]
    async fn test_unreachable_authority_names_service() {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        let authority = HttpTokenAuthority::new(&format!("http://127.0.0.1:{}", port), 1000).unwrap();
        let err = authority.validate("abc").await.unwrap_err();

        assert!(matches!(err, UpstreamError::Unreachable { .. }));
        assert_eq!(err.service(), "authentication");
    }
}
