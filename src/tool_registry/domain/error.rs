//! Error types for tool registry domain validation and parsing.

use super::ServerId;
use thiserror::Error;

/// Errors returned while constructing tool registry domain values.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ToolRegistryDomainError {
    /// The server name is empty after trimming.
    #[error("MCP server name must not be empty")]
    EmptyServerName,

    /// The server name contains characters outside `[a-z0-9_-]`.
    #[error(
        "MCP server name '{0}' contains invalid characters (only lowercase alphanumeric, '-' and '_' allowed)"
    )]
    InvalidServerName(String),

    /// The server name exceeds the 100-character storage limit.
    #[error("MCP server name exceeds 100 character limit: {0}")]
    ServerNameTooLong(String),

    /// The stdio command is empty.
    #[error("stdio transport requires a non-empty 'command'")]
    EmptyStdioCommand,

    /// The stdio working directory is empty after trimming.
    #[error("stdio working directory must not be empty when provided")]
    EmptyWorkingDirectory,

    /// A network transport was configured without a URL.
    #[error("{kind} transport requires a non-empty 'url'")]
    EmptyUrl {
        /// Transport kind in canonical string form.
        kind: String,
    },

    /// A network transport URL has an unsupported scheme.
    #[error("{kind} transport URL '{url}' must start with one of: {schemes}")]
    InvalidUrlScheme {
        /// Transport kind in canonical string form.
        kind: String,
        /// Rejected URL.
        url: String,
        /// Accepted scheme prefixes.
        schemes: String,
    },

    /// The transport kind string is not recognised.
    #[error("unknown transport kind: {0}")]
    UnknownTransportKind(String),

    /// A tool name is empty after trimming.
    #[error("tool name must not be empty")]
    EmptyToolName,

    /// A resource URI is empty after trimming.
    #[error("resource URI must not be empty")]
    EmptyResourceUri,

    /// A timeout of zero was supplied.
    #[error("timeout must be greater than zero")]
    ZeroTimeout,

    /// Transitioning between two lifecycle states is invalid.
    #[error("invalid MCP server status transition: {from} -> {to}")]
    InvalidStatusTransition {
        /// Current status.
        from: String,
        /// Requested target status.
        to: String,
    },

    /// Tool queries require the server to be running.
    #[error("MCP server {server_id} is not running (current status: {status})")]
    ServerNotRunning {
        /// Server identifier.
        server_id: ServerId,
        /// Status in canonical string form.
        status: String,
    },
}

/// Error returned while parsing a server status from persistence.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("unknown MCP server status: {0}")]
pub struct ParseServerStatusError(pub String);

/// Error returned while parsing a tool category.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("unknown tool category: {0}")]
pub struct ParseToolCategoryError(pub String);
