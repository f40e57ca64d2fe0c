use super::{AuditEvent, AuditObserver};
use async_trait::async_trait;
use std::sync::Mutex;

/// Observer that keeps events in memory, for tests and local inspection
#[derive(Debug, Default)]
pub struct MemoryObserver {
    events: Mutex<Vec<AuditEvent>>,
}

impl MemoryObserver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<AuditEvent> {
        self.events.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    pub fn event_kinds(&self) -> Vec<String> {
        self.events().into_iter().map(|e| e.event).collect()
    }

    pub fn clear(&self) {
        self.events.lock().unwrap_or_else(|e| e.into_inner()).clear();
    }
}

#[async_trait]
impl AuditObserver for MemoryObserver {
    async fn update(&self, event: &AuditEvent) {
        self.events
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(event.clone());
    }
}
