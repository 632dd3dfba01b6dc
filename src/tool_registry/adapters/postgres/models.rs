//! Diesel row models for tool catalog persistence.

use super::schema::{mcp_resources, mcp_servers, mcp_tools};
use chrono::{DateTime, Utc};
use diesel::prelude::*;
use serde_json::Value;

/// Row shape for MCP server records, used for both reads and upserts.
#[derive(Debug, Clone, PartialEq, Queryable, Selectable, Insertable, AsChangeset)]
#[diesel(table_name = mcp_servers)]
#[diesel(check_for_backend(diesel::pg::Pg))]
#[diesel(treat_none_as_null = true)]
pub struct McpServerRow {
    /// Internal server identifier.
    pub id: uuid::Uuid,
    /// Server name.
    pub name: String,
    /// Transport configuration payload.
    pub transport: Value,
    /// Runtime status.
    pub status: String,
    /// Owning user.
    pub owner_id: Option<String>,
    /// Tag array payload.
    pub tags: Value,
    /// Auto-start flag.
    pub auto_start: bool,
    /// Request timeout in milliseconds.
    pub timeout_ms: i64,
    /// Cached tool count.
    pub tool_count: i32,
    /// Last discovery timestamp.
    pub last_discovery: Option<DateTime<Utc>>,
    /// Catalog fingerprint.
    pub catalog_fingerprint: Option<String>,
    /// Last error message.
    pub error_message: Option<String>,
    /// Last health report payload.
    pub last_health: Option<Value>,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Last update timestamp.
    pub updated_at: DateTime<Utc>,
}

/// Row shape for tool records.
#[derive(Debug, Clone, PartialEq, Queryable, Selectable, Insertable)]
#[diesel(table_name = mcp_tools)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct McpToolRow {
    /// Owning server.
    pub server_id: uuid::Uuid,
    /// Tool name.
    pub name: String,
    /// Tool definition payload.
    pub definition: Value,
    /// Metrics payload.
    pub metrics: Value,
    /// Discovery timestamp.
    pub discovered_at: DateTime<Utc>,
}

/// Row shape for resource records.
#[derive(Debug, Clone, PartialEq, Queryable, Selectable, Insertable)]
#[diesel(table_name = mcp_resources)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct McpResourceRow {
    /// Owning server.
    pub server_id: uuid::Uuid,
    /// Resource URI.
    pub uri: String,
    /// Resource definition payload.
    pub definition: Value,
    /// Discovery timestamp.
    pub discovered_at: DateTime<Utc>,
}
