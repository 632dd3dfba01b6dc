//! MCP session layered over a raw JSON-RPC channel.

use crate::transport::{
    domain::{
        InitializeResult, MCP_PROTOCOL_VERSION, ResourceDescriptor, ResourceListPage,
        ToolDescriptor, ToolListPage, TransportError, TransportResult, into_tool_result, methods,
    },
    ports::{RpcChannel, TransportClient},
};
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde_json::{Value, json};
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::debug;

/// Upper bound on followed `nextCursor` links per listing.
const MAX_LIST_PAGES: usize = 64;

/// MCP client session over any [`RpcChannel`].
pub struct McpSession<C: RpcChannel> {
    channel: C,
    initialized: AtomicBool,
}

impl<C: RpcChannel> McpSession<C> {
    /// Wraps `channel`; the session starts uninitialised.
    #[must_use]
    pub const fn new(channel: C) -> Self {
        Self {
            channel,
            initialized: AtomicBool::new(false),
        }
    }

    /// Returns the wrapped channel.
    #[must_use]
    pub const fn channel(&self) -> &C {
        &self.channel
    }

    /// Returns whether the handshake has completed.
    #[must_use]
    pub fn is_initialized(&self) -> bool {
        self.initialized.load(Ordering::Acquire)
    }

    fn ensure_initialized(&self, operation: &str) -> TransportResult<()> {
        if self.is_initialized() {
            return Ok(());
        }
        Err(TransportError::Protocol(format!(
            "{operation} called before initialize"
        )))
    }

    async fn request_as<T: DeserializeOwned>(
        &self,
        method: &str,
        params: Option<Value>,
    ) -> TransportResult<T> {
        let payload = self.channel.request(method, params).await?;
        serde_json::from_value(payload).map_err(|err| {
            TransportError::Protocol(format!("malformed {method} response: {err}"))
        })
    }

    async fn collect_pages<P, T>(
        &self,
        method: &str,
        split: impl Fn(P) -> (Vec<T>, Option<String>) + Send + Sync,
    ) -> TransportResult<Vec<T>>
    where
        P: DeserializeOwned + Send,
        T: Send,
    {
        let mut items = Vec::new();
        let mut cursor: Option<String> = None;
        for _ in 0..MAX_LIST_PAGES {
            let params = cursor.as_ref().map(|next| json!({ "cursor": next }));
            let page: P = self.request_as(method, params).await?;
            let (mut batch, next_cursor) = split(page);
            items.append(&mut batch);
            match next_cursor {
                Some(next) if cursor.as_deref() != Some(next.as_str()) => cursor = Some(next),
                _ => return Ok(items),
            }
        }
        Err(TransportError::Protocol(format!(
            "{method} exceeded {MAX_LIST_PAGES} pages"
        )))
    }
}

#[async_trait]
impl<C: RpcChannel> TransportClient for McpSession<C> {
    async fn initialize(&self) -> TransportResult<InitializeResult> {
        let params = json!({
            "protocolVersion": MCP_PROTOCOL_VERSION,
            "capabilities": {},
            "clientInfo": {
                "name": env!("CARGO_PKG_NAME"),
                "version": env!("CARGO_PKG_VERSION"),
            },
        });
        let result: InitializeResult = self.request_as(methods::INITIALIZE, Some(params)).await?;
        self.channel.notify(methods::INITIALIZED, None).await?;
        self.initialized.store(true, Ordering::Release);
        debug!(
            peer = %result.server_info.name,
            protocol = %result.protocol_version,
            "MCP session initialised"
        );
        Ok(result)
    }

    async fn list_tools(&self) -> TransportResult<Vec<ToolDescriptor>> {
        self.ensure_initialized(methods::TOOLS_LIST)?;
        self.collect_pages(methods::TOOLS_LIST, |page: ToolListPage| {
            (page.tools, page.next_cursor)
        })
        .await
    }

    async fn list_resources(&self) -> TransportResult<Vec<ResourceDescriptor>> {
        self.ensure_initialized(methods::RESOURCES_LIST)?;
        self.collect_pages(methods::RESOURCES_LIST, |page: ResourceListPage| {
            (page.resources, page.next_cursor)
        })
        .await
    }

    async fn call_tool(&self, name: &str, arguments: Value) -> TransportResult<Value> {
        self.ensure_initialized(methods::TOOLS_CALL)?;
        let params = json!({ "name": name, "arguments": arguments });
        let result = self.channel.request(methods::TOOLS_CALL, Some(params)).await?;
        into_tool_result(result)
    }

    async fn read_resource(&self, uri: &str) -> TransportResult<Value> {
        self.ensure_initialized(methods::RESOURCES_READ)?;
        self.channel
            .request(methods::RESOURCES_READ, Some(json!({ "uri": uri })))
            .await
    }

    async fn close(&self) -> TransportResult<()> {
        self.initialized.store(false, Ordering::Release);
        self.channel.close().await
    }

    fn is_alive(&self) -> bool {
        self.channel.is_alive()
    }
}
