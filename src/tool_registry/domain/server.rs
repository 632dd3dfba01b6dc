//! MCP server aggregate root.

use super::{
    HealthReport, McpTransport, ParseServerStatusError, ServerId, ServerName,
    ToolRegistryDomainError, UserId,
};
use chrono::{DateTime, Utc};
use mockable::Clock;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::time::Duration;

/// Default per-server request timeout.
pub const DEFAULT_SERVER_TIMEOUT: Duration = Duration::from_secs(30);

/// Runtime status of a registered MCP server.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ServerStatus {
    /// Registered but never started.
    Registered,
    /// Transport is being established.
    Starting,
    /// Connected and serving tools.
    Running,
    /// Stopped by an operator.
    Stopped,
    /// Start or runtime failure.
    #[serde(rename = "error")]
    Failed,
    /// Running but failing health probes.
    Unhealthy,
}

impl ServerStatus {
    /// Returns the canonical storage representation.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Registered => "registered",
            Self::Starting => "starting",
            Self::Running => "running",
            Self::Stopped => "stopped",
            Self::Failed => "error",
            Self::Unhealthy => "unhealthy",
        }
    }

    /// Returns whether a live connection is expected in this status.
    #[must_use]
    pub const fn is_active(self) -> bool {
        matches!(self, Self::Running | Self::Unhealthy)
    }

    /// Returns whether transition to `target` is allowed.
    #[must_use]
    pub const fn can_transition_to(self, target: Self) -> bool {
        matches!(
            (self, target),
            (
                Self::Registered | Self::Stopped | Self::Failed,
                Self::Starting
            ) | (Self::Starting, Self::Running)
                | (Self::Running, Self::Running | Self::Unhealthy)
                | (Self::Unhealthy, Self::Running | Self::Unhealthy)
                | (
                    Self::Registered
                        | Self::Starting
                        | Self::Running
                        | Self::Unhealthy
                        | Self::Failed,
                    Self::Stopped
                )
                | (
                    Self::Registered
                        | Self::Starting
                        | Self::Running
                        | Self::Unhealthy
                        | Self::Failed,
                    Self::Failed
                )
        )
    }
}

impl fmt::Display for ServerStatus {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str(self.as_str())
    }
}

impl TryFrom<&str> for ServerStatus {
    type Error = ParseServerStatusError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value.trim().to_ascii_lowercase().as_str() {
            "registered" => Ok(Self::Registered),
            "starting" => Ok(Self::Starting),
            "running" => Ok(Self::Running),
            "stopped" => Ok(Self::Stopped),
            "error" => Ok(Self::Failed),
            "unhealthy" => Ok(Self::Unhealthy),
            _ => Err(ParseServerStatusError(value.to_owned())),
        }
    }
}

/// Registered MCP server aggregate root.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct McpServer {
    id: ServerId,
    name: ServerName,
    transport: McpTransport,
    status: ServerStatus,
    owner_id: Option<UserId>,
    tags: BTreeSet<String>,
    auto_start: bool,
    timeout_ms: u64,
    tool_count: u32,
    last_discovery: Option<DateTime<Utc>>,
    catalog_fingerprint: Option<String>,
    error_message: Option<String>,
    last_health: Option<HealthReport>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

/// Parameter object for reconstructing persisted server state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PersistedServerData {
    /// Persisted server identifier.
    pub id: ServerId,
    /// Persisted server name.
    pub name: ServerName,
    /// Persisted transport settings.
    pub transport: McpTransport,
    /// Persisted status.
    pub status: ServerStatus,
    /// Persisted owner.
    pub owner_id: Option<UserId>,
    /// Persisted tags.
    pub tags: BTreeSet<String>,
    /// Persisted auto-start flag.
    pub auto_start: bool,
    /// Persisted request timeout.
    pub timeout: Duration,
    /// Persisted tool-count cache.
    pub tool_count: u32,
    /// Persisted last discovery timestamp.
    pub last_discovery: Option<DateTime<Utc>>,
    /// Persisted catalog fingerprint.
    pub catalog_fingerprint: Option<String>,
    /// Persisted error message.
    pub error_message: Option<String>,
    /// Persisted last health report.
    pub last_health: Option<HealthReport>,
    /// Persisted creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Persisted update timestamp.
    pub updated_at: DateTime<Utc>,
}

impl McpServer {
    /// Creates a new server in the `registered` status.
    #[must_use]
    pub fn new(name: ServerName, transport: McpTransport, clock: &impl Clock) -> Self {
        let timestamp = clock.utc();
        Self {
            id: ServerId::new(),
            name,
            transport,
            status: ServerStatus::Registered,
            owner_id: None,
            tags: BTreeSet::new(),
            auto_start: false,
            timeout_ms: duration_to_millis(DEFAULT_SERVER_TIMEOUT),
            tool_count: 0,
            last_discovery: None,
            catalog_fingerprint: None,
            error_message: None,
            last_health: None,
            created_at: timestamp,
            updated_at: timestamp,
        }
    }

    /// Reconstructs a server from persistence.
    #[must_use]
    pub fn from_persisted(data: PersistedServerData) -> Self {
        Self {
            id: data.id,
            name: data.name,
            transport: data.transport,
            status: data.status,
            owner_id: data.owner_id,
            tags: data.tags,
            auto_start: data.auto_start,
            timeout_ms: duration_to_millis(data.timeout),
            tool_count: data.tool_count,
            last_discovery: data.last_discovery,
            catalog_fingerprint: data.catalog_fingerprint,
            error_message: data.error_message,
            last_health: data.last_health,
            created_at: data.created_at,
            updated_at: data.updated_at,
        }
    }

    /// Sets the owning user.
    #[must_use]
    pub fn with_owner(mut self, owner_id: Option<UserId>) -> Self {
        self.owner_id = owner_id;
        self
    }

    /// Replaces the tag set. Tags are trimmed and lowercased.
    #[must_use]
    pub fn with_tags(mut self, tags: impl IntoIterator<Item = String>) -> Self {
        self.tags = normalize_tags(tags);
        self
    }

    /// Sets the auto-start flag.
    #[must_use]
    pub const fn with_auto_start(mut self, auto_start: bool) -> Self {
        self.auto_start = auto_start;
        self
    }

    /// Sets the per-request timeout.
    ///
    /// # Errors
    ///
    /// Returns [`ToolRegistryDomainError::ZeroTimeout`] for a zero duration.
    pub fn with_timeout(mut self, timeout: Duration) -> Result<Self, ToolRegistryDomainError> {
        if timeout.is_zero() {
            return Err(ToolRegistryDomainError::ZeroTimeout);
        }
        self.timeout_ms = duration_to_millis(timeout);
        Ok(self)
    }

    /// Returns the server identifier.
    #[must_use]
    pub const fn id(&self) -> ServerId {
        self.id
    }

    /// Returns the validated server name.
    #[must_use]
    pub const fn name(&self) -> &ServerName {
        &self.name
    }

    /// Returns the transport settings.
    #[must_use]
    pub const fn transport(&self) -> &McpTransport {
        &self.transport
    }

    /// Returns the current status.
    #[must_use]
    pub const fn status(&self) -> ServerStatus {
        self.status
    }

    /// Returns the owning user.
    #[must_use]
    pub const fn owner_id(&self) -> Option<&UserId> {
        self.owner_id.as_ref()
    }

    /// Returns the tag set.
    #[must_use]
    pub const fn tags(&self) -> &BTreeSet<String> {
        &self.tags
    }

    /// Returns the auto-start flag.
    #[must_use]
    pub const fn auto_start(&self) -> bool {
        self.auto_start
    }

    /// Returns the per-request timeout.
    #[must_use]
    pub const fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    /// Returns the cached number of discovered tools.
    #[must_use]
    pub const fn tool_count(&self) -> u32 {
        self.tool_count
    }

    /// Returns when tools were last discovered.
    #[must_use]
    pub const fn last_discovery(&self) -> Option<DateTime<Utc>> {
        self.last_discovery
    }

    /// Returns the fingerprint of the last discovered catalog.
    #[must_use]
    pub fn catalog_fingerprint(&self) -> Option<&str> {
        self.catalog_fingerprint.as_deref()
    }

    /// Returns the last recorded error.
    #[must_use]
    pub fn error_message(&self) -> Option<&str> {
        self.error_message.as_deref()
    }

    /// Returns the latest health report.
    #[must_use]
    pub const fn last_health(&self) -> Option<&HealthReport> {
        self.last_health.as_ref()
    }

    /// Returns the creation timestamp.
    #[must_use]
    pub const fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Returns the latest update timestamp.
    #[must_use]
    pub const fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    /// Marks the server as establishing its transport.
    ///
    /// # Errors
    ///
    /// Returns [`ToolRegistryDomainError::InvalidStatusTransition`] when the
    /// transition is not allowed.
    pub fn mark_starting(&mut self, clock: &impl Clock) -> Result<(), ToolRegistryDomainError> {
        self.transition_to(ServerStatus::Starting)?;
        self.error_message = None;
        self.touch(clock);
        Ok(())
    }

    /// Marks the server as running.
    ///
    /// # Errors
    ///
    /// Returns [`ToolRegistryDomainError::InvalidStatusTransition`] when the
    /// transition is not allowed.
    pub fn mark_running(&mut self, clock: &impl Clock) -> Result<(), ToolRegistryDomainError> {
        self.transition_to(ServerStatus::Running)?;
        self.error_message = None;
        self.touch(clock);
        Ok(())
    }

    /// Marks the server as stopped.
    ///
    /// # Errors
    ///
    /// Returns [`ToolRegistryDomainError::InvalidStatusTransition`] when the
    /// transition is not allowed.
    pub fn mark_stopped(&mut self, clock: &impl Clock) -> Result<(), ToolRegistryDomainError> {
        self.transition_to(ServerStatus::Stopped)?;
        self.last_health = None;
        self.touch(clock);
        Ok(())
    }

    /// Marks the server as failed with an error message.
    ///
    /// # Errors
    ///
    /// Returns [`ToolRegistryDomainError::InvalidStatusTransition`] when the
    /// transition is not allowed.
    pub fn mark_error(
        &mut self,
        message: impl Into<String>,
        clock: &impl Clock,
    ) -> Result<(), ToolRegistryDomainError> {
        self.transition_to(ServerStatus::Failed)?;
        self.error_message = Some(message.into());
        self.touch(clock);
        Ok(())
    }

    /// Records a health report, demoting a running server when unhealthy and
    /// restoring an unhealthy server when the probe passes.
    ///
    /// Returns the status before the report was applied.
    ///
    /// # Errors
    ///
    /// Returns [`ToolRegistryDomainError::ServerNotRunning`] when the server
    /// has no live connection in its current status.
    pub fn apply_health(
        &mut self,
        report: HealthReport,
        clock: &impl Clock,
    ) -> Result<ServerStatus, ToolRegistryDomainError> {
        let previous = self.status;
        if !previous.is_active() {
            return Err(self.not_running());
        }

        if report.is_healthy() {
            self.status = ServerStatus::Running;
            self.error_message = None;
        } else {
            self.status = ServerStatus::Unhealthy;
            self.error_message = report.error().map(str::to_owned);
        }
        self.last_health = Some(report);
        self.touch(clock);
        Ok(previous)
    }

    /// Records the outcome of a discovery pass.
    pub fn record_discovery(
        &mut self,
        tool_count: u32,
        fingerprint: impl Into<String>,
        clock: &impl Clock,
    ) {
        let timestamp = clock.utc();
        self.tool_count = tool_count;
        self.catalog_fingerprint = Some(fingerprint.into());
        self.last_discovery = Some(timestamp);
        self.updated_at = timestamp;
    }

    /// Validates that the server can serve tool queries.
    ///
    /// # Errors
    ///
    /// Returns [`ToolRegistryDomainError::ServerNotRunning`] when the status
    /// has no live connection.
    pub fn ensure_active(&self) -> Result<(), ToolRegistryDomainError> {
        if self.status.is_active() {
            return Ok(());
        }
        Err(self.not_running())
    }

    /// Returns whether the server carries every tag in `required`.
    #[must_use]
    pub fn has_all_tags<'a>(&self, required: impl IntoIterator<Item = &'a String>) -> bool {
        required.into_iter().all(|tag| self.tags.contains(tag))
    }

    fn not_running(&self) -> ToolRegistryDomainError {
        ToolRegistryDomainError::ServerNotRunning {
            server_id: self.id,
            status: self.status.as_str().to_owned(),
        }
    }

    fn touch(&mut self, clock: &impl Clock) {
        self.updated_at = clock.utc();
    }

    fn transition_to(&mut self, target: ServerStatus) -> Result<(), ToolRegistryDomainError> {
        if !self.status.can_transition_to(target) {
            return Err(ToolRegistryDomainError::InvalidStatusTransition {
                from: self.status.as_str().to_owned(),
                to: target.as_str().to_owned(),
            });
        }

        self.status = target;
        Ok(())
    }
}

pub(crate) fn normalize_tags(tags: impl IntoIterator<Item = String>) -> BTreeSet<String> {
    tags.into_iter()
        .map(|tag| tag.trim().to_ascii_lowercase())
        .filter(|tag| !tag.is_empty())
        .collect()
}

pub(crate) fn duration_to_millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}
