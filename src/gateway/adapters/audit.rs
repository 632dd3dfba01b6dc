//! Audit sinks.

use crate::{
    gateway::{
        domain::{AuditEvent, Severity},
        ports::{AuditSink, AuditSinkError},
    },
    tool_registry::domain::UserId,
};
use async_trait::async_trait;
use std::sync::Mutex;
use tracing::{error, info, warn};

/// Writes audit events to the `toolgate::audit` tracing target.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingAuditSink;

#[async_trait]
impl AuditSink for TracingAuditSink {
    async fn log(&self, event: &AuditEvent) -> Result<(), AuditSinkError> {
        let user = event.user_id.as_ref().map(UserId::as_str);
        let event_type = event.event_type.as_str();
        match event.severity {
            Severity::Info => {
                info!(target: "toolgate::audit", event_type, user, details = %event.details);
            }
            Severity::Warning => {
                warn!(target: "toolgate::audit", event_type, user, details = %event.details);
            }
            Severity::Error => {
                error!(target: "toolgate::audit", event_type, user, details = %event.details);
            }
        }
        Ok(())
    }
}

/// Keeps audit events in memory, in arrival order.
#[derive(Debug, Default)]
pub struct InMemoryAuditSink {
    events: Mutex<Vec<AuditEvent>>,
}

impl InMemoryAuditSink {
    /// Creates an empty sink.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns every recorded event.
    #[must_use]
    pub fn events(&self) -> Vec<AuditEvent> {
        self.events
            .lock()
            .map(|events| events.clone())
            .unwrap_or_default()
    }
}

#[async_trait]
impl AuditSink for InMemoryAuditSink {
    async fn log(&self, event: &AuditEvent) -> Result<(), AuditSinkError> {
        self.events
            .lock()
            .map_err(|err| AuditSinkError(err.to_string()))?
            .push(event.clone());
        Ok(())
    }
}
