//! Tool catalog service: an in-memory index in front of a durable store.

use crate::tool_registry::{
    domain::{
        McpServer, Resource, ServerFilter, ServerId, Tool, ToolFilter, ToolKey, ToolMetrics,
    },
    ports::{RegistryStore, RegistryStoreError},
};
use mockable::Clock;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use thiserror::Error;
use tokio::sync::Mutex as AsyncMutex;
use tracing::{debug, info};

/// Service-level errors for catalog operations.
#[derive(Debug, Clone, Error)]
pub enum ToolRegistryError {
    /// Store operation failed.
    #[error(transparent)]
    Store(#[from] RegistryStoreError),
    /// No server exists with the given identifier.
    #[error("MCP server {0} not found")]
    ServerNotFound(ServerId),
    /// No tool exists with the given key.
    #[error("tool '{name}' not found on MCP server {server_id}")]
    ToolNotFound {
        /// Server identifier.
        server_id: ServerId,
        /// Tool name.
        name: String,
    },
}

/// Result type for catalog operations.
pub type ToolRegistryResult<T> = Result<T, ToolRegistryError>;

/// Counts of records loaded by [`ToolRegistry::hydrate`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct HydrationSummary {
    /// Servers loaded.
    pub servers: usize,
    /// Tools loaded.
    pub tools: usize,
    /// Resources loaded.
    pub resources: usize,
}

type ResourceKey = (ServerId, String);

#[derive(Debug, Default)]
struct RegistryIndex {
    servers: HashMap<ServerId, McpServer>,
    server_order: Vec<ServerId>,
    tools: HashMap<ToolKey, Tool>,
    tool_order: Vec<ToolKey>,
    resources: HashMap<ResourceKey, Resource>,
    resource_order: Vec<ResourceKey>,
}

impl RegistryIndex {
    fn put_server(&mut self, server: McpServer) {
        let id = server.id();
        if self.servers.insert(id, server).is_none() {
            self.server_order.push(id);
        }
    }

    fn put_tool(&mut self, mut tool: Tool) -> Tool {
        let key = tool.key();
        if let Some(previous) = self.tools.get(&key) {
            tool.adopt_metrics(previous);
        } else {
            self.tool_order.push(key.clone());
        }
        self.tools.insert(key, tool.clone());
        tool
    }

    fn put_resource(&mut self, resource: Resource) {
        let key = (resource.server_id(), resource.uri().to_owned());
        if self.resources.insert(key.clone(), resource).is_none() {
            self.resource_order.push(key);
        }
    }

    fn remove_server(&mut self, server_id: ServerId) -> bool {
        let existed = self.servers.remove(&server_id).is_some();
        self.server_order.retain(|id| *id != server_id);
        self.tools.retain(|key, _| key.server_id != server_id);
        self.tool_order.retain(|key| key.server_id != server_id);
        self.resources.retain(|(owner, _), _| *owner != server_id);
        self.resource_order.retain(|(owner, _)| *owner != server_id);
        existed
    }

    fn ordered_tools(&self) -> impl Iterator<Item = &Tool> {
        self.tool_order.iter().filter_map(|key| self.tools.get(key))
    }
}

/// Catalog of servers, tools and resources.
///
/// The in-memory index is authoritative for reads during the process
/// lifetime. Every mutation is written through to the injected store, and
/// [`ToolRegistry::hydrate`] reloads the index at startup. Point lookups that
/// miss the index fall through to the store and repopulate the index.
///
/// Tool writes hold a per-tool gate from the index update until the store
/// acknowledges, so the store sees each tool's snapshots in index order.
pub struct ToolRegistry<S, C>
where
    S: RegistryStore,
    C: Clock + Send + Sync,
{
    store: Arc<S>,
    clock: Arc<C>,
    index: RwLock<RegistryIndex>,
    tool_gates: Mutex<HashMap<ToolKey, Arc<AsyncMutex<()>>>>,
}

impl<S, C> ToolRegistry<S, C>
where
    S: RegistryStore,
    C: Clock + Send + Sync,
{
    /// Creates an empty registry over `store`.
    #[must_use]
    pub fn new(store: Arc<S>, clock: Arc<C>) -> Self {
        Self {
            store,
            clock,
            index: RwLock::new(RegistryIndex::default()),
            tool_gates: Mutex::new(HashMap::new()),
        }
    }

    /// Returns the backing store.
    #[must_use]
    pub fn store(&self) -> &S {
        &self.store
    }

    fn tool_gate(&self, key: &ToolKey) -> Arc<AsyncMutex<()>> {
        let mut gates = self.tool_gates.lock().unwrap_or_else(PoisonError::into_inner);
        Arc::clone(gates.entry(key.clone()).or_default())
    }

    fn read_index(&self) -> ToolRegistryResult<RwLockReadGuard<'_, RegistryIndex>> {
        self.index.read().map_err(|err| {
            RegistryStoreError::persistence(std::io::Error::other(err.to_string())).into()
        })
    }

    fn write_index(&self) -> ToolRegistryResult<RwLockWriteGuard<'_, RegistryIndex>> {
        self.index.write().map_err(|err| {
            RegistryStoreError::persistence(std::io::Error::other(err.to_string())).into()
        })
    }

    /// Replaces the index with the store's contents.
    ///
    /// # Errors
    ///
    /// Returns store errors when any load fails; the index is left unchanged.
    pub async fn hydrate(&self) -> ToolRegistryResult<HydrationSummary> {
        let servers = self.store.load_servers().await?;
        let tools = self.store.load_tools().await?;
        let resources = self.store.load_resources().await?;

        let summary = HydrationSummary {
            servers: servers.len(),
            tools: tools.len(),
            resources: resources.len(),
        };

        let mut fresh = RegistryIndex::default();
        for server in servers {
            fresh.put_server(server);
        }
        for tool in tools {
            fresh.put_tool(tool);
        }
        for resource in resources {
            fresh.put_resource(resource);
        }
        *self.write_index()? = fresh;

        info!(
            servers = summary.servers,
            tools = summary.tools,
            resources = summary.resources,
            "tool registry hydrated"
        );
        Ok(summary)
    }

    /// Inserts or replaces a server record.
    ///
    /// # Errors
    ///
    /// Returns store errors when persistence fails.
    pub async fn register_server(&self, server: McpServer) -> ToolRegistryResult<()> {
        self.store.upsert_server(&server).await?;
        debug!(server_id = %server.id(), name = %server.name(), "server registered");
        self.write_index()?.put_server(server);
        Ok(())
    }

    /// Replaces an existing server record.
    ///
    /// # Errors
    ///
    /// Returns [`ToolRegistryError::ServerNotFound`] when the server is not
    /// indexed, or store errors when persistence fails.
    pub async fn update_server(&self, server: McpServer) -> ToolRegistryResult<()> {
        if !self.read_index()?.servers.contains_key(&server.id()) {
            return Err(ToolRegistryError::ServerNotFound(server.id()));
        }
        self.store.upsert_server(&server).await?;
        self.write_index()?.put_server(server);
        Ok(())
    }

    /// Returns a server by identifier.
    ///
    /// # Errors
    ///
    /// Returns store errors when an index miss cannot be resolved.
    pub async fn get_server(&self, server_id: ServerId) -> ToolRegistryResult<Option<McpServer>> {
        if let Some(server) = self.read_index()?.servers.get(&server_id).cloned() {
            return Ok(Some(server));
        }

        let found = self.store.find_server(server_id).await?;
        if let Some(server) = &found {
            self.write_index()?.put_server(server.clone());
        }
        Ok(found)
    }

    /// Returns indexed servers matching `filter`, in registration order.
    ///
    /// # Errors
    ///
    /// Returns an error when the index lock is poisoned.
    pub fn list_servers(&self, filter: &ServerFilter) -> ToolRegistryResult<Vec<McpServer>> {
        let index = self.read_index()?;
        Ok(index
            .server_order
            .iter()
            .filter_map(|id| index.servers.get(id))
            .filter(|server| filter.matches(server))
            .cloned()
            .collect())
    }

    /// Deletes a server and cascades to its tools and resources.
    ///
    /// # Errors
    ///
    /// Returns [`ToolRegistryError::ServerNotFound`] when neither the index
    /// nor the store knows the server, or store errors.
    pub async fn delete_server(&self, server_id: ServerId) -> ToolRegistryResult<()> {
        let indexed = self.read_index()?.servers.contains_key(&server_id);
        match self.store.delete_server(server_id).await {
            Ok(()) => {}
            Err(RegistryStoreError::NotFound(_)) if indexed => {}
            Err(RegistryStoreError::NotFound(_)) => {
                return Err(ToolRegistryError::ServerNotFound(server_id));
            }
            Err(err) => return Err(err.into()),
        }
        self.write_index()?.remove_server(server_id);
        self.tool_gates
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .retain(|key, _| key.server_id != server_id);
        info!(server_id = %server_id, "server deleted from registry");
        Ok(())
    }

    /// Inserts or replaces a tool, preserving metrics of an existing entry
    /// with the same `(server_id, name)` key.
    ///
    /// Returns the tool as stored.
    ///
    /// # Errors
    ///
    /// Returns [`ToolRegistryError::ServerNotFound`] when the owning server is
    /// not indexed, or store errors.
    pub async fn register_tool(&self, tool: Tool) -> ToolRegistryResult<Tool> {
        let key = tool.key();
        let gate = self.tool_gate(&key);
        let _persisting = gate.lock().await;
        let mut merged = tool;
        {
            let index = self.read_index()?;
            if !index.servers.contains_key(&key.server_id) {
                return Err(ToolRegistryError::ServerNotFound(key.server_id));
            }
            if let Some(previous) = index.tools.get(&key) {
                merged.adopt_metrics(previous);
            }
        }

        self.store.upsert_tool(&merged).await?;
        let stored = self.write_index()?.put_tool(merged);
        debug!(tool = %key, "tool registered");
        Ok(stored)
    }

    /// Returns a tool by its composite key.
    ///
    /// # Errors
    ///
    /// Returns store errors when an index miss cannot be resolved.
    pub async fn get_tool(
        &self,
        server_id: ServerId,
        name: &str,
    ) -> ToolRegistryResult<Option<Tool>> {
        let key = ToolKey::new(server_id, name);
        if let Some(tool) = self.read_index()?.tools.get(&key).cloned() {
            return Ok(Some(tool));
        }

        let found = self.store.find_tool(server_id, name).await?;
        match found {
            Some(tool) => Ok(Some(self.write_index()?.put_tool(tool))),
            None => Ok(None),
        }
    }

    /// Returns indexed tools, optionally for one server, matching `filter`.
    ///
    /// # Errors
    ///
    /// Returns an error when the index lock is poisoned.
    pub fn list_tools(
        &self,
        server_id: Option<ServerId>,
        filter: &ToolFilter,
    ) -> ToolRegistryResult<Vec<Tool>> {
        let index = self.read_index()?;
        Ok(index
            .ordered_tools()
            .filter(|tool| server_id.is_none_or(|id| tool.server_id() == id))
            .filter(|tool| filter.matches(tool))
            .cloned()
            .collect())
    }

    /// Returns up to `limit` tools whose name or description contains
    /// `query`, case-insensitively, in index order.
    ///
    /// # Errors
    ///
    /// Returns an error when the index lock is poisoned.
    pub fn search_tools(&self, query: &str, limit: usize) -> ToolRegistryResult<Vec<Tool>> {
        let lowered = query.trim().to_lowercase();
        let index = self.read_index()?;
        Ok(index
            .ordered_tools()
            .filter(|tool| tool.matches_query(&lowered))
            .take(limit)
            .cloned()
            .collect())
    }

    /// Records one execution against a tool's rolling metrics.
    ///
    /// The read-modify-write happens inside a single index write lock; the
    /// resulting snapshot is persisted before the next update of the same
    /// tool starts.
    ///
    /// # Errors
    ///
    /// Returns [`ToolRegistryError::ToolNotFound`] when the tool is not
    /// indexed, or store errors.
    pub async fn update_tool_metrics(
        &self,
        server_id: ServerId,
        name: &str,
        duration_ms: u64,
        success: bool,
    ) -> ToolRegistryResult<ToolMetrics> {
        let key = ToolKey::new(server_id, name);
        let gate = self.tool_gate(&key);
        let _persisting = gate.lock().await;
        let snapshot = {
            let mut index = self.write_index()?;
            let tool = index
                .tools
                .get_mut(&key)
                .ok_or_else(|| ToolRegistryError::ToolNotFound {
                    server_id,
                    name: name.to_owned(),
                })?;
            tool.record_execution(duration_ms, success, self.clock.utc());
            tool.clone()
        };

        self.store.upsert_tool(&snapshot).await?;
        Ok(snapshot.metrics().clone())
    }

    /// Inserts or replaces a resource.
    ///
    /// # Errors
    ///
    /// Returns [`ToolRegistryError::ServerNotFound`] when the owning server is
    /// not indexed, or store errors.
    pub async fn register_resource(&self, resource: Resource) -> ToolRegistryResult<()> {
        if !self
            .read_index()?
            .servers
            .contains_key(&resource.server_id())
        {
            return Err(ToolRegistryError::ServerNotFound(resource.server_id()));
        }
        self.store.upsert_resource(&resource).await?;
        self.write_index()?.put_resource(resource);
        Ok(())
    }

    /// Returns indexed resources, optionally for one server.
    ///
    /// # Errors
    ///
    /// Returns an error when the index lock is poisoned.
    pub fn list_resources(&self, server_id: Option<ServerId>) -> ToolRegistryResult<Vec<Resource>> {
        let index = self.read_index()?;
        Ok(index
            .resource_order
            .iter()
            .filter_map(|key| index.resources.get(key))
            .filter(|resource| server_id.is_none_or(|id| resource.server_id() == id))
            .cloned()
            .collect())
    }
}
