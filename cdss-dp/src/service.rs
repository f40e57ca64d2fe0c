//! Preprocessing service operations
//!
//! Audit events are emitted once the artifact is stored or read.

use crate::db::ArtifactStore;
use crate::pipeline::Pipeline;
use cdss_common::api::{ApiError, ApiResult, ArtifactView, ProcessRequest};
use cdss_common::audit::{AuditEvent, AuditSubject};
use std::sync::Arc;
use tracing::info;

const SERVICE: &str = "data_processing";

pub struct DataService {
    pipeline: Arc<Pipeline>,
    store: ArtifactStore,
    audit: AuditSubject,
}

impl DataService {
    pub fn new(pipeline: Pipeline, store: ArtifactStore, audit: AuditSubject) -> Self {
        Self {
            pipeline: Arc::new(pipeline),
            store,
            audit,
        }
    }

    pub fn pipeline(&self) -> &Pipeline {
        &self.pipeline
    }

    /// Normalize and store a raw payload, returning the artifact id
    pub async fn process(&self, request: ProcessRequest) -> ApiResult<i64> {
        let tag = request.strategy.trim().to_string();
        if tag.is_empty() {
            return Err(ApiError::Validation("strategy is required".to_string()));
        }

        // Image decoding is CPU bound
        let pipeline = Arc::clone(&self.pipeline);
        let handle_tag = tag.clone();
        let payload = tokio::task::spawn_blocking(move || pipeline.handle(&request.raw_data, &handle_tag))
            .await
            .map_err(|e| ApiError::Internal(format!("preprocessing task failed: {}", e)))??;

        let artifact = self.store.insert(&tag, &payload.encode()).await?;
        info!("Stored {} artifact {} for '{}'", payload.kind(), artifact.id, tag);

        self.audit
            .notify(
                AuditEvent::new(SERVICE, "data_processed", format!("Data processed for strategy {}", tag))
                    .with_artifact(artifact.id),
            )
            .await;

        Ok(artifact.id)
    }

    pub async fn retrieve(&self, id: i64) -> ApiResult<ArtifactView> {
        let artifact = self
            .store
            .get(id)
            .await?
            .ok_or_else(|| ApiError::NotFound(format!("artifact {} not found", id)))?;

        self.audit
            .notify(
                AuditEvent::new(SERVICE, "data_retrieved", format!("Artifact {} retrieved", id))
                    .with_artifact(id),
            )
            .await;

        Ok(artifact)
    }
}
