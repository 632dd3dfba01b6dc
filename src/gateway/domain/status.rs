//! Read models returned by status queries.

use crate::{
    resilience::domain::CircuitState,
    tool_registry::domain::{HealthReport, McpServer, ServerId, ServerStatus},
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Snapshot of one server's runtime state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerStatusReport {
    /// Server identifier.
    pub server_id: ServerId,
    /// Server name.
    pub name: String,
    /// Registry status.
    pub status: ServerStatus,
    /// Whether the pool holds a live connection.
    pub connected: bool,
    /// Tools found by the last discovery.
    pub tool_count: u32,
    /// When tools were last discovered.
    pub last_discovery: Option<DateTime<Utc>>,
    /// Last recorded health probe.
    pub last_health: Option<HealthReport>,
    /// Last recorded error.
    pub error_message: Option<String>,
    /// Breaker state per tool that has executed at least once.
    pub circuits: Vec<(String, CircuitState)>,
}

impl ServerStatusReport {
    pub(crate) fn new(
        server: &McpServer,
        connected: bool,
        circuits: Vec<(String, CircuitState)>,
    ) -> Self {
        Self {
            server_id: server.id(),
            name: server.name().as_str().to_owned(),
            status: server.status(),
            connected,
            tool_count: server.tool_count(),
            last_discovery: server.last_discovery(),
            last_health: server.last_health().cloned(),
            error_message: server.error_message().map(str::to_owned),
            circuits,
        }
    }
}
