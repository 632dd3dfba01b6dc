//! Untyped registration input and its validation into a server.

use super::{GatewayError, GatewayResult};
use crate::tool_registry::domain::{
    McpServer, McpTransport, ServerName, StdioTransportConfig, TransportKind, UserId,
};
use mockable::Clock;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;

/// Registration request as supplied by operators or configuration files.
///
/// Nothing is validated until [`ServerDefinition::build`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerDefinition {
    /// Unique server name.
    pub name: String,
    /// Transport kind: `stdio`, `http`, `sse` or `websocket`.
    pub transport: String,
    /// Executable for stdio servers.
    pub command: Option<String>,
    /// Arguments for stdio servers.
    pub args: Vec<String>,
    /// Extra environment for stdio servers.
    pub env: BTreeMap<String, String>,
    /// Working directory for stdio servers.
    pub working_directory: Option<String>,
    /// Endpoint for network servers.
    pub url: Option<String>,
    /// Extra headers for network servers.
    pub headers: BTreeMap<String, String>,
    /// Free-form tags.
    pub tags: Vec<String>,
    /// Start the server as part of registration.
    pub auto_start: bool,
    /// Default tool timeout in seconds.
    pub timeout_seconds: Option<u64>,
}

impl ServerDefinition {
    /// Starts a stdio definition.
    #[must_use]
    pub fn stdio(name: impl Into<String>, command: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            transport: TransportKind::Stdio.as_str().to_owned(),
            command: Some(command.into()),
            ..Self::default()
        }
    }

    /// Starts an HTTP definition.
    #[must_use]
    pub fn http(name: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            transport: TransportKind::Http.as_str().to_owned(),
            url: Some(url.into()),
            ..Self::default()
        }
    }

    /// Sets process arguments.
    #[must_use]
    pub fn with_args(mut self, args: impl IntoIterator<Item = String>) -> Self {
        self.args = args.into_iter().collect();
        self
    }

    /// Sets tags.
    #[must_use]
    pub fn with_tags(mut self, tags: impl IntoIterator<Item = String>) -> Self {
        self.tags = tags.into_iter().collect();
        self
    }

    /// Sets the auto-start flag.
    #[must_use]
    pub const fn with_auto_start(mut self, auto_start: bool) -> Self {
        self.auto_start = auto_start;
        self
    }

    /// Sets the default tool timeout.
    #[must_use]
    pub const fn with_timeout_seconds(mut self, seconds: u64) -> Self {
        self.timeout_seconds = Some(seconds);
        self
    }

    /// Validates the definition into a typed transport.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::Validation`] when the name or transport is
    /// missing, a stdio definition lacks `command`, or a network definition
    /// lacks `url`.
    pub fn transport_config(&self) -> GatewayResult<McpTransport> {
        if self.transport.trim().is_empty() {
            return Err(missing("transport"));
        }
        let transport = match TransportKind::try_from(self.transport.as_str())? {
            TransportKind::Stdio => return self.stdio_transport(),
            TransportKind::Http => McpTransport::http(self.network_url()?)?,
            TransportKind::Sse => McpTransport::sse(self.network_url()?)?,
            TransportKind::Websocket => McpTransport::websocket(self.network_url()?)?,
        };
        Ok(transport.with_headers(self.headers.clone()))
    }

    fn network_url(&self) -> GatewayResult<&str> {
        present(self.url.as_deref()).ok_or_else(|| missing("url"))
    }

    fn stdio_transport(&self) -> GatewayResult<McpTransport> {
        let command = present(self.command.as_deref()).ok_or_else(|| missing("command"))?;
        let mut config = StdioTransportConfig::new(command)?
            .with_args(self.args.iter().cloned())
            .with_environment(self.env.clone());
        if let Some(directory) = &self.working_directory {
            config = config.in_directory(directory.as_str())?;
        }
        Ok(McpTransport::Stdio(config))
    }

    /// Validates the definition and builds a `registered` server owned by
    /// `owner`.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::Validation`] for any invalid field.
    pub fn build(&self, owner: Option<UserId>, clock: &impl Clock) -> GatewayResult<McpServer> {
        if self.name.trim().is_empty() {
            return Err(missing("name"));
        }
        let name = ServerName::new(self.name.as_str())?;
        let transport = self.transport_config()?;
        let mut server = McpServer::new(name, transport, clock)
            .with_owner(owner)
            .with_tags(self.tags.iter().cloned())
            .with_auto_start(self.auto_start);
        if let Some(seconds) = self.timeout_seconds {
            server = server.with_timeout(Duration::from_secs(seconds))?;
        }
        Ok(server)
    }
}

fn present(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|text| !text.is_empty())
}

fn missing(field: &str) -> GatewayError {
    GatewayError::Validation(format!("missing required field '{field}'"))
}
