//! MCP client and connector ports.

use crate::{
    tool_registry::domain::McpServer,
    transport::domain::{InitializeResult, ResourceDescriptor, ToolDescriptor, TransportResult},
};
use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;

/// An MCP session over one live connection.
///
/// [`TransportClient::initialize`] must complete before any catalog or call
/// operation; earlier use fails with a protocol error.
#[async_trait]
pub trait TransportClient: Send + Sync {
    /// Performs the capability handshake.
    async fn initialize(&self) -> TransportResult<InitializeResult>;

    /// Lists the server's tools.
    async fn list_tools(&self) -> TransportResult<Vec<ToolDescriptor>>;

    /// Lists the server's resources.
    async fn list_resources(&self) -> TransportResult<Vec<ResourceDescriptor>>;

    /// Invokes a tool.
    async fn call_tool(&self, name: &str, arguments: Value) -> TransportResult<Value>;

    /// Reads a resource.
    async fn read_resource(&self, uri: &str) -> TransportResult<Value>;

    /// Tears the connection down. Calling it again is a no-op.
    async fn close(&self) -> TransportResult<()>;

    /// Returns whether the underlying process or endpoint is still reachable.
    fn is_alive(&self) -> bool;
}

/// Opens connections for registered servers.
#[async_trait]
pub trait TransportConnector: Send + Sync {
    /// Establishes an uninitialised connection to `server`.
    async fn connect(&self, server: &McpServer) -> TransportResult<Arc<dyn TransportClient>>;
}
