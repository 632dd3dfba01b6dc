//! Audit trail events emitted by the gateway.

use crate::tool_registry::domain::UserId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// Severity attached to an audit event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    /// Routine operation.
    Info,
    /// Rejected or degraded operation.
    Warning,
    /// Failed operation.
    Error,
}

impl Severity {
    /// Returns the lowercase label.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Info => "info",
            Self::Warning => "warning",
            Self::Error => "error",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str(self.as_str())
    }
}

/// What happened.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditEventType {
    /// A server was registered.
    ServerRegistered,
    /// A server started.
    ServerStarted,
    /// A server failed to start.
    ServerStartFailed,
    /// A server was stopped.
    ServerStopped,
    /// A server was deleted.
    ServerDeleted,
    /// A discovery pass finished.
    ToolsDiscovered,
    /// A discovery pass failed.
    DiscoveryFailed,
    /// A tool execution finished.
    ToolExecuted,
    /// A resource was read.
    ResourceRead,
    /// A server's health changed.
    HealthChanged,
    /// The caller was denied.
    PermissionDenied,
    /// The input was rejected.
    ValidationFailed,
}

impl AuditEventType {
    /// Returns the snake-case label.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::ServerRegistered => "server_registered",
            Self::ServerStarted => "server_started",
            Self::ServerStartFailed => "server_start_failed",
            Self::ServerStopped => "server_stopped",
            Self::ServerDeleted => "server_deleted",
            Self::ToolsDiscovered => "tools_discovered",
            Self::DiscoveryFailed => "discovery_failed",
            Self::ToolExecuted => "tool_executed",
            Self::ResourceRead => "resource_read",
            Self::HealthChanged => "health_changed",
            Self::PermissionDenied => "permission_denied",
            Self::ValidationFailed => "validation_failed",
        }
    }
}

impl fmt::Display for AuditEventType {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str(self.as_str())
    }
}

/// One audit record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditEvent {
    /// What happened.
    pub event_type: AuditEventType,
    /// Acting user; `None` for anonymous callers and the gateway itself.
    pub user_id: Option<UserId>,
    /// Event-specific structured details.
    pub details: Value,
    /// Severity.
    pub severity: Severity,
    /// When the event was recorded.
    pub occurred_at: DateTime<Utc>,
}

impl AuditEvent {
    /// Creates an event.
    #[must_use]
    pub const fn new(
        event_type: AuditEventType,
        user_id: Option<UserId>,
        details: Value,
        severity: Severity,
        occurred_at: DateTime<Utc>,
    ) -> Self {
        Self {
            event_type,
            user_id,
            details,
            severity,
            occurred_at,
        }
    }
}
