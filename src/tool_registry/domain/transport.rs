//! MCP server transport configuration value objects.

use super::ToolRegistryDomainError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Child process launched for a stdio MCP server.
///
/// Requests travel over the child's stdin and responses come back on its
/// stdout, one JSON-RPC message per line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StdioTransportConfig {
    command: String,
    args: Vec<String>,
    #[serde(default)]
    environment: BTreeMap<String, String>,
    #[serde(default)]
    cwd: Option<String>,
}

impl StdioTransportConfig {
    /// Describes a process started from `command`.
    ///
    /// # Errors
    ///
    /// [`ToolRegistryDomainError::EmptyStdioCommand`] for a blank command.
    pub fn new(command: impl Into<String>) -> Result<Self, ToolRegistryDomainError> {
        let program = command.into();
        let trimmed = program.trim();
        if trimmed.is_empty() {
            return Err(ToolRegistryDomainError::EmptyStdioCommand);
        }
        Ok(Self {
            command: trimmed.to_owned(),
            args: Vec::new(),
            environment: BTreeMap::new(),
            cwd: None,
        })
    }

    /// Arguments passed after the command.
    #[must_use]
    pub fn with_args(mut self, args: impl IntoIterator<Item = String>) -> Self {
        self.args = args.into_iter().collect();
        self
    }

    /// Extra variables layered over the gateway's own environment.
    #[must_use]
    pub fn with_environment(
        mut self,
        variables: impl IntoIterator<Item = (String, String)>,
    ) -> Self {
        self.environment = variables.into_iter().collect();
        self
    }

    /// Runs the child from `directory` instead of the gateway's cwd.
    ///
    /// # Errors
    ///
    /// [`ToolRegistryDomainError::EmptyWorkingDirectory`] for a blank path.
    pub fn in_directory(
        mut self,
        directory: impl Into<String>,
    ) -> Result<Self, ToolRegistryDomainError> {
        let path = directory.into();
        match path.trim() {
            "" => Err(ToolRegistryDomainError::EmptyWorkingDirectory),
            trimmed => {
                self.cwd = Some(trimmed.to_owned());
                Ok(self)
            }
        }
    }

    /// Program to execute.
    #[must_use]
    pub fn command(&self) -> &str {
        &self.command
    }

    /// Arguments in launch order.
    #[must_use]
    pub fn args(&self) -> &[String] {
        &self.args
    }

    /// Variables added to the child environment.
    #[must_use]
    pub const fn environment(&self) -> &BTreeMap<String, String> {
        &self.environment
    }

    /// Directory the child starts in, when one is configured.
    #[must_use]
    pub fn cwd(&self) -> Option<&str> {
        self.cwd.as_deref()
    }
}

/// Transport settings for an MCP server reached over the network.
///
/// Shared by the `http`, `sse` and `websocket` transport kinds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkTransportConfig {
    url: String,
    headers: BTreeMap<String, String>,
}

impl NetworkTransportConfig {
    fn new(
        kind: TransportKind,
        url: impl Into<String>,
        schemes: &[&str],
    ) -> Result<Self, ToolRegistryDomainError> {
        let normalized_url = url.into().trim().to_owned();
        if normalized_url.is_empty() {
            return Err(ToolRegistryDomainError::EmptyUrl {
                kind: kind.as_str().to_owned(),
            });
        }

        if !schemes
            .iter()
            .any(|scheme| normalized_url.starts_with(scheme))
        {
            return Err(ToolRegistryDomainError::InvalidUrlScheme {
                kind: kind.as_str().to_owned(),
                url: normalized_url,
                schemes: schemes.join(", "),
            });
        }

        Ok(Self {
            url: normalized_url,
            headers: BTreeMap::new(),
        })
    }

    /// Replaces the extra request headers sent on every call.
    #[must_use]
    pub fn with_headers(mut self, values: impl IntoIterator<Item = (String, String)>) -> Self {
        self.headers = values.into_iter().collect();
        self
    }

    /// Returns the endpoint URL.
    #[must_use]
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Returns the extra request headers.
    #[must_use]
    pub const fn headers(&self) -> &BTreeMap<String, String> {
        &self.headers
    }
}

/// Transport kind discriminant, used for filtering and persistence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransportKind {
    /// Local subprocess over stdin/stdout.
    Stdio,
    /// JSON-RPC over HTTP POST.
    Http,
    /// Server-sent events.
    Sse,
    /// WebSocket.
    Websocket,
}

impl TransportKind {
    /// Returns the canonical string representation.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Stdio => "stdio",
            Self::Http => "http",
            Self::Sse => "sse",
            Self::Websocket => "websocket",
        }
    }
}

impl fmt::Display for TransportKind {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str(self.as_str())
    }
}

impl TryFrom<&str> for TransportKind {
    type Error = ToolRegistryDomainError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value.trim().to_ascii_lowercase().as_str() {
            "stdio" => Ok(Self::Stdio),
            "http" => Ok(Self::Http),
            "sse" => Ok(Self::Sse),
            "websocket" | "ws" => Ok(Self::Websocket),
            _ => Err(ToolRegistryDomainError::UnknownTransportKind(
                value.to_owned(),
            )),
        }
    }
}

/// Supported MCP transport configuration variants.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind", content = "config")]
pub enum McpTransport {
    /// MCP over local process stdio.
    Stdio(StdioTransportConfig),
    /// MCP over HTTP POST with a keep-alive session.
    Http(NetworkTransportConfig),
    /// MCP over server-sent events.
    Sse(NetworkTransportConfig),
    /// MCP over WebSocket.
    Websocket(NetworkTransportConfig),
}

impl McpTransport {
    /// Creates a `stdio` transport.
    ///
    /// # Errors
    ///
    /// Returns validation errors from [`StdioTransportConfig::new`].
    pub fn stdio(command: impl Into<String>) -> Result<Self, ToolRegistryDomainError> {
        Ok(Self::Stdio(StdioTransportConfig::new(command)?))
    }

    /// Creates an `http` transport.
    ///
    /// # Errors
    ///
    /// Returns an error when `url` is empty or not `http(s)://`.
    pub fn http(url: impl Into<String>) -> Result<Self, ToolRegistryDomainError> {
        Ok(Self::Http(NetworkTransportConfig::new(
            TransportKind::Http,
            url,
            &["http://", "https://"],
        )?))
    }

    /// Creates an `sse` transport.
    ///
    /// # Errors
    ///
    /// Returns an error when `url` is empty or not `http(s)://`.
    pub fn sse(url: impl Into<String>) -> Result<Self, ToolRegistryDomainError> {
        Ok(Self::Sse(NetworkTransportConfig::new(
            TransportKind::Sse,
            url,
            &["http://", "https://"],
        )?))
    }

    /// Creates a `websocket` transport.
    ///
    /// # Errors
    ///
    /// Returns an error when `url` is empty or not `ws(s)://`.
    pub fn websocket(url: impl Into<String>) -> Result<Self, ToolRegistryDomainError> {
        Ok(Self::Websocket(NetworkTransportConfig::new(
            TransportKind::Websocket,
            url,
            &["ws://", "wss://"],
        )?))
    }

    /// Replaces the request headers of a network transport; stdio
    /// transports are returned unchanged.
    #[must_use]
    pub fn with_headers(self, values: impl IntoIterator<Item = (String, String)>) -> Self {
        match self {
            Self::Stdio(_) => self,
            Self::Http(config) => Self::Http(config.with_headers(values)),
            Self::Sse(config) => Self::Sse(config.with_headers(values)),
            Self::Websocket(config) => Self::Websocket(config.with_headers(values)),
        }
    }

    /// Returns the transport kind.
    #[must_use]
    pub const fn kind(&self) -> TransportKind {
        match self {
            Self::Stdio(_) => TransportKind::Stdio,
            Self::Http(_) => TransportKind::Http,
            Self::Sse(_) => TransportKind::Sse,
            Self::Websocket(_) => TransportKind::Websocket,
        }
    }
}
