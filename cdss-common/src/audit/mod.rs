//! Audit side channel
//!
//! Each emitting service holds one [`AuditSubject`]. Observers are attached
//! at construction; the service calls [`AuditSubject::notify`] once the
//! primary result of an operation is known. Delivery never fails the caller:
//! observers swallow their own errors.

mod forwarder;
mod memory;

pub use forwarder::{AuditDeliveryError, AuditForwarder};
pub use memory::MemoryObserver;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::{Arc, RwLock};

/// One audit record as emitted by a service
///
/// Correlation keys that do not apply are left out of the wire form entirely.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditEvent {
    pub service: String,
    pub event: String,
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub account_id: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub patient_hashed_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub report_id: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub artifact_id: Option<i64>,
}

impl AuditEvent {
    pub fn new(service: &str, event: &str, description: impl Into<String>) -> Self {
        Self {
            service: service.to_string(),
            event: event.to_string(),
            description: description.into(),
            account_id: None,
            patient_hashed_id: None,
            report_id: None,
            artifact_id: None,
        }
    }

    pub fn with_account(mut self, account_id: i64) -> Self {
        self.account_id = Some(account_id);
        self
    }

    pub fn with_patient(mut self, patient_hashed_id: &str) -> Self {
        self.patient_hashed_id = Some(patient_hashed_id.to_string());
        self
    }

    pub fn with_report(mut self, report_id: i64) -> Self {
        self.report_id = Some(report_id);
        self
    }

    pub fn with_artifact(mut self, artifact_id: i64) -> Self {
        self.artifact_id = Some(artifact_id);
        self
    }
}

/// Receiver of audit events
#[async_trait]
pub trait AuditObserver: Send + Sync {
    async fn update(&self, event: &AuditEvent);
}

/// Whether `notify` waits for observers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DeliveryMode {
    /// Observers run on a spawned task; the caller does not wait
    #[default]
    Background,
    /// Observers run before `notify` returns
    Inline,
}

impl DeliveryMode {
    pub fn from_inline_flag(inline: bool) -> Self {
        if inline {
            DeliveryMode::Inline
        } else {
            DeliveryMode::Background
        }
    }
}

/// Holds the attached observers of one service
pub struct AuditSubject {
    observers: RwLock<Vec<Arc<dyn AuditObserver>>>,
    mode: DeliveryMode,
}

impl AuditSubject {
    pub fn new(mode: DeliveryMode) -> Self {
        Self {
            observers: RwLock::new(Vec::new()),
            mode,
        }
    }

    pub fn mode(&self) -> DeliveryMode {
        self.mode
    }

    pub fn attach(&self, observer: Arc<dyn AuditObserver>) {
        let mut observers = self.observers.write().unwrap_or_else(|e| e.into_inner());
        observers.push(observer);
    }

    /// Remove an observer by identity; unknown observers are ignored
    pub fn detach(&self, observer: &Arc<dyn AuditObserver>) {
        let mut observers = self.observers.write().unwrap_or_else(|e| e.into_inner());
        observers.retain(|o| !Arc::ptr_eq(o, observer));
    }

    pub fn observer_count(&self) -> usize {
        self.observers.read().unwrap_or_else(|e| e.into_inner()).len()
    }

    /// Deliver an event to every attached observer, in attach order
    pub async fn notify(&self, event: AuditEvent) {
        // Snapshot so no lock is held across observer calls
        let observers: Vec<Arc<dyn AuditObserver>> = self
            .observers
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone();

        if observers.is_empty() {
            return;
        }

        match self.mode {
            DeliveryMode::Inline => {
                for observer in &observers {
                    observer.update(&event).await;
                }
            }
            DeliveryMode::Background => {
                tokio::spawn(async move {
                    for observer in &observers {
                        observer.update(&event).await;
                    }
                });
            }
        }
    }
}

impl Default for AuditSubject {
    fn default() -> Self {
        Self::new(DeliveryMode::default())
    }
}

impl std::fmt::Debug for AuditSubject {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuditSubject")
            .field("observers", &self.observer_count())
            .field("mode", &self.mode)
            .finish()
    }
}
