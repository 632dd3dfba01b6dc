//! Raw JSON-RPC channel port.

use crate::transport::domain::TransportResult;
use async_trait::async_trait;
use serde_json::Value;

/// One duplex JSON-RPC channel to an MCP server.
///
/// Implementations correlate responses to requests and unwrap the JSON-RPC
/// envelope; timeouts are the caller's concern.
#[async_trait]
pub trait RpcChannel: Send + Sync {
    /// Sends a request and awaits its result payload.
    async fn request(&self, method: &str, params: Option<Value>) -> TransportResult<Value>;

    /// Sends a notification.
    async fn notify(&self, method: &str, params: Option<Value>) -> TransportResult<()>;

    /// Tears the channel down. Calling it again is a no-op.
    async fn close(&self) -> TransportResult<()>;

    /// Returns whether the peer is still reachable.
    fn is_alive(&self) -> bool;
}
