//! Audit trail port.

use crate::gateway::domain::AuditEvent;
use async_trait::async_trait;
use thiserror::Error;

/// Failure to persist an audit event.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("audit sink failed: {0}")]
pub struct AuditSinkError(pub String);

/// Receives audit events.
///
/// The gateway never fails an operation because of a sink error.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait AuditSink: Send + Sync {
    /// Records `event`.
    async fn log(&self, event: &AuditEvent) -> Result<(), AuditSinkError>;
}
