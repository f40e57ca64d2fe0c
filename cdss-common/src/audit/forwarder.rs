//! HTTP observer forwarding events to the audit sink

use super::{AuditEvent, AuditObserver};
use crate::http::{UpstreamClient, UpstreamError};
use async_trait::async_trait;
use thiserror::Error;
use tracing::{debug, warn};

/// Failure to deliver one event; logged, never propagated
#[derive(Debug, Error)]
#[error("audit delivery failed: {0}")]
pub struct AuditDeliveryError(#[from] UpstreamError);

/// Best-effort sender of audit events to `POST {audit}/audit/log`
#[derive(Debug, Clone)]
pub struct AuditForwarder {
    client: UpstreamClient,
}

impl AuditForwarder {
    /// `audit_url` is the sink's base URL without route prefix
    pub fn new(audit_url: &str, timeout_ms: u64) -> Result<Self, AuditDeliveryError> {
        let base = format!("{}/audit", audit_url.trim_end_matches('/'));
        Ok(Self {
            client: UpstreamClient::new("audit", &base, timeout_ms)?,
        })
    }

    /// Send one event, reporting failure to the caller
    pub async fn deliver(&self, event: &AuditEvent) -> Result<(), AuditDeliveryError> {
        // The acknowledgement body is not used
        let _ack: serde_json::Value = self.client.post_json("/log", event).await?;
        Ok(())
    }
}

#[async_trait]
impl AuditObserver for AuditForwarder {
    async fn update(&self, event: &AuditEvent) {
        match self.deliver(event).await {
            Ok(()) => debug!("Audit event '{}' delivered", event.event),
            Err(e) => warn!("Audit event '{}' from {} dropped: {}", event.event, event.service, e),
        }
    }
}
