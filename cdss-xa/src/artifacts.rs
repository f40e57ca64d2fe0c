//! Access to processed artifacts owned by the preprocessing service

use async_trait::async_trait;
use cdss_common::api::{ApiError, ApiResult, ArtifactView, RetrieveResponse};
use cdss_common::http::{UpstreamClient, UpstreamError};

#[async_trait]
pub trait ArtifactSource: Send + Sync {
    /// `NotFound` if the artifact does not exist
    async fn fetch(&self, artifact_id: i64) -> ApiResult<ArtifactView>;
}

/// Reads artifacts through `GET {data_processing}/data_processing/retrieve/{id}`
#[derive(Debug, Clone)]
pub struct HttpArtifactSource {
    client: UpstreamClient,
}

impl HttpArtifactSource {
    /// `base_url` is the preprocessing service root without route prefix
    pub fn new(base_url: &str, timeout_ms: u64) -> Result<Self, UpstreamError> {
        let base = format!("{}/data_processing", base_url.trim_end_matches('/'));
        Ok(Self {
            client: UpstreamClient::new("data_processing", &base, timeout_ms)?,
        })
    }
}

#[async_trait]
impl ArtifactSource for HttpArtifactSource {
    async fn fetch(&self, artifact_id: i64) -> ApiResult<ArtifactView> {
        match self
            .client
            .get_json::<RetrieveResponse>(&format!("/retrieve/{}", artifact_id))
            .await
        {
            Ok(response) => Ok(response.artifact),
            Err(UpstreamError::Rejected { status: 404, .. }) => {
                Err(ApiError::NotFound(format!("artifact {} not found", artifact_id)))
            }
            Err(e) => Err(e.into()),
        }
    }
}
