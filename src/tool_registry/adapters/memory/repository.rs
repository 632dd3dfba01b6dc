//! In-memory registry store.

use crate::tool_registry::{
    domain::{McpServer, Resource, ServerId, Tool, ToolKey},
    ports::{RegistryStore, RegistryStoreError, RegistryStoreResult},
};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

/// Thread-safe in-memory registry store.
///
/// Cloning shares the underlying state, so a test can keep a handle to the
/// store it passed into a registry and inspect what was written.
#[derive(Debug, Clone, Default)]
pub struct InMemoryRegistryStore {
    state: Arc<RwLock<InMemoryStoreState>>,
}

#[derive(Debug, Default)]
struct InMemoryStoreState {
    servers: HashMap<ServerId, McpServer>,
    tools: HashMap<ToolKey, Tool>,
    resources: HashMap<(ServerId, String), Resource>,
}

impl InMemoryRegistryStore {
    /// Creates an empty in-memory store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> RegistryStoreResult<RwLockReadGuard<'_, InMemoryStoreState>> {
        self.state.read().map_err(|err| {
            RegistryStoreError::persistence(std::io::Error::other(err.to_string()))
        })
    }

    fn write(&self) -> RegistryStoreResult<RwLockWriteGuard<'_, InMemoryStoreState>> {
        self.state.write().map_err(|err| {
            RegistryStoreError::persistence(std::io::Error::other(err.to_string()))
        })
    }
}

#[async_trait]
impl RegistryStore for InMemoryRegistryStore {
    async fn upsert_server(&self, server: &McpServer) -> RegistryStoreResult<()> {
        self.write()?.servers.insert(server.id(), server.clone());
        Ok(())
    }

    async fn find_server(&self, server_id: ServerId) -> RegistryStoreResult<Option<McpServer>> {
        Ok(self.read()?.servers.get(&server_id).cloned())
    }

    async fn load_servers(&self) -> RegistryStoreResult<Vec<McpServer>> {
        let mut servers: Vec<McpServer> = self.read()?.servers.values().cloned().collect();
        servers.sort_by_key(McpServer::created_at);
        Ok(servers)
    }

    async fn delete_server(&self, server_id: ServerId) -> RegistryStoreResult<()> {
        let mut state = self.write()?;
        if state.servers.remove(&server_id).is_none() {
            return Err(RegistryStoreError::NotFound(server_id));
        }
        state.tools.retain(|key, _| key.server_id != server_id);
        state.resources.retain(|(owner, _), _| *owner != server_id);
        Ok(())
    }

    async fn upsert_tool(&self, tool: &Tool) -> RegistryStoreResult<()> {
        self.write()?.tools.insert(tool.key(), tool.clone());
        Ok(())
    }

    async fn find_tool(
        &self,
        server_id: ServerId,
        name: &str,
    ) -> RegistryStoreResult<Option<Tool>> {
        let key = ToolKey::new(server_id, name);
        Ok(self.read()?.tools.get(&key).cloned())
    }

    async fn load_tools(&self) -> RegistryStoreResult<Vec<Tool>> {
        let mut tools: Vec<Tool> = self.read()?.tools.values().cloned().collect();
        tools.sort_by(|left, right| {
            left.discovered_at()
                .cmp(&right.discovered_at())
                .then_with(|| left.key().cmp(&right.key()))
        });
        Ok(tools)
    }

    async fn upsert_resource(&self, resource: &Resource) -> RegistryStoreResult<()> {
        self.write()?.resources.insert(
            (resource.server_id(), resource.uri().to_owned()),
            resource.clone(),
        );
        Ok(())
    }

    async fn load_resources(&self) -> RegistryStoreResult<Vec<Resource>> {
        let mut resources: Vec<Resource> = self.read()?.resources.values().cloned().collect();
        resources.sort_by(|left, right| {
            left.discovered_at()
                .cmp(&right.discovered_at())
                .then_with(|| left.uri().cmp(right.uri()))
        });
        Ok(resources)
    }
}
