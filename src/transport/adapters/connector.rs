//! Production connector dispatching on the server's transport kind.

use super::{http::HttpChannel, stdio::{DEFAULT_STOP_GRACE, StdioChannel}};
use crate::{
    tool_registry::domain::{McpServer, McpTransport},
    transport::{
        domain::{TransportError, TransportResult},
        ports::{TransportClient, TransportConnector},
        services::McpSession,
    },
};
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

/// Opens stdio and HTTP sessions; SSE and WebSocket are rejected.
#[derive(Debug, Clone, Copy)]
pub struct DefaultTransportConnector {
    stop_grace: Duration,
}

impl Default for DefaultTransportConnector {
    fn default() -> Self {
        Self::new(DEFAULT_STOP_GRACE)
    }
}

impl DefaultTransportConnector {
    /// Creates a connector that waits `stop_grace` after SIGTERM before
    /// killing stdio servers.
    #[must_use]
    pub const fn new(stop_grace: Duration) -> Self {
        Self { stop_grace }
    }
}

#[async_trait]
impl TransportConnector for DefaultTransportConnector {
    async fn connect(&self, server: &McpServer) -> TransportResult<Arc<dyn TransportClient>> {
        let client: Arc<dyn TransportClient> = match server.transport() {
            McpTransport::Stdio(config) => Arc::new(McpSession::new(StdioChannel::spawn(
                config,
                self.stop_grace,
            )?)),
            McpTransport::Http(config) => Arc::new(McpSession::new(HttpChannel::connect(config)?)),
            unsupported @ (McpTransport::Sse(_) | McpTransport::Websocket(_)) => {
                return Err(TransportError::UnsupportedTransport(unsupported.kind()));
            }
        };
        info!(
            server_id = %server.id(),
            transport = %server.transport().kind(),
            "transport connected"
        );
        Ok(client)
    }
}
