//! TTL cache tier in front of any registry store.

use crate::tool_registry::{
    domain::{McpServer, Resource, ServerId, Tool, ToolKey},
    ports::{RegistryStore, RegistryStoreError, RegistryStoreResult},
};
use async_trait::async_trait;
use moka::sync::Cache;
use std::time::Duration;

const DEFAULT_CACHE_CAPACITY: u64 = 10_000;

/// Write-through cache over a durable [`RegistryStore`].
///
/// Writes go to the inner store first and then refresh the cache; point
/// lookups are served from the cache while the entry is younger than the
/// TTL, and fall through to the inner store (repopulating the cache) on a
/// miss. Bulk loads always read the inner store.
#[derive(Debug)]
pub struct CachedRegistryStore<S> {
    inner: S,
    servers: Cache<ServerId, McpServer>,
    tools: Cache<ToolKey, Tool>,
}

impl<S: RegistryStore> CachedRegistryStore<S> {
    /// Wraps `inner` with entries expiring `ttl` after insertion.
    #[must_use]
    pub fn new(inner: S, ttl: Duration) -> Self {
        Self::with_capacity(inner, ttl, DEFAULT_CACHE_CAPACITY)
    }

    /// Wraps `inner` with an explicit per-kind entry capacity.
    #[must_use]
    pub fn with_capacity(inner: S, ttl: Duration, capacity: u64) -> Self {
        Self {
            inner,
            servers: Cache::builder()
                .time_to_live(ttl)
                .max_capacity(capacity)
                .build(),
            tools: Cache::builder()
                .time_to_live(ttl)
                .max_capacity(capacity)
                .support_invalidation_closures()
                .build(),
        }
    }

    /// Returns the wrapped store.
    #[must_use]
    pub const fn inner(&self) -> &S {
        &self.inner
    }

    /// Drops every cached entry.
    pub fn invalidate_all(&self) {
        self.servers.invalidate_all();
        self.tools.invalidate_all();
    }
}

#[async_trait]
impl<S: RegistryStore> RegistryStore for CachedRegistryStore<S> {
    async fn upsert_server(&self, server: &McpServer) -> RegistryStoreResult<()> {
        self.inner.upsert_server(server).await?;
        self.servers.insert(server.id(), server.clone());
        Ok(())
    }

    async fn find_server(&self, server_id: ServerId) -> RegistryStoreResult<Option<McpServer>> {
        if let Some(server) = self.servers.get(&server_id) {
            return Ok(Some(server));
        }

        let found = self.inner.find_server(server_id).await?;
        if let Some(server) = &found {
            self.servers.insert(server_id, server.clone());
        }
        Ok(found)
    }

    async fn load_servers(&self) -> RegistryStoreResult<Vec<McpServer>> {
        let servers = self.inner.load_servers().await?;
        for server in &servers {
            self.servers.insert(server.id(), server.clone());
        }
        Ok(servers)
    }

    async fn delete_server(&self, server_id: ServerId) -> RegistryStoreResult<()> {
        self.servers.invalidate(&server_id);
        self.tools
            .invalidate_entries_if(move |key, _| key.server_id == server_id)
            .map_err(RegistryStoreError::persistence)?;
        self.inner.delete_server(server_id).await
    }

    async fn upsert_tool(&self, tool: &Tool) -> RegistryStoreResult<()> {
        self.inner.upsert_tool(tool).await?;
        self.tools.insert(tool.key(), tool.clone());
        Ok(())
    }

    async fn find_tool(
        &self,
        server_id: ServerId,
        name: &str,
    ) -> RegistryStoreResult<Option<Tool>> {
        let key = ToolKey::new(server_id, name);
        if let Some(tool) = self.tools.get(&key) {
            return Ok(Some(tool));
        }

        let found = self.inner.find_tool(server_id, name).await?;
        if let Some(tool) = &found {
            self.tools.insert(key, tool.clone());
        }
        Ok(found)
    }

    async fn load_tools(&self) -> RegistryStoreResult<Vec<Tool>> {
        let tools = self.inner.load_tools().await?;
        for tool in &tools {
            self.tools.insert(tool.key(), tool.clone());
        }
        Ok(tools)
    }

    async fn upsert_resource(&self, resource: &Resource) -> RegistryStoreResult<()> {
        self.inner.upsert_resource(resource).await
    }

    async fn load_resources(&self) -> RegistryStoreResult<Vec<Resource>> {
        self.inner.load_resources().await
    }
}
