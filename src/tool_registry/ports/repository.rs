//! Durable store port for the tool catalog.

use crate::tool_registry::domain::{McpServer, Resource, ServerId, Tool};
use async_trait::async_trait;
use std::sync::Arc;
use thiserror::Error;

/// Result type for registry store operations.
pub type RegistryStoreResult<T> = Result<T, RegistryStoreError>;

/// Persistence contract backing the registry's in-memory index.
///
/// Every write is an upsert keyed by the entity's natural key: server id,
/// `(server_id, name)` for tools and `(server_id, uri)` for resources.
#[async_trait]
pub trait RegistryStore: Send + Sync {
    /// Inserts or replaces a server record.
    async fn upsert_server(&self, server: &McpServer) -> RegistryStoreResult<()>;

    /// Finds a server by identifier.
    async fn find_server(&self, server_id: ServerId) -> RegistryStoreResult<Option<McpServer>>;

    /// Returns every stored server.
    async fn load_servers(&self) -> RegistryStoreResult<Vec<McpServer>>;

    /// Deletes a server together with its tools and resources.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryStoreError::NotFound`] when the server does not
    /// exist.
    async fn delete_server(&self, server_id: ServerId) -> RegistryStoreResult<()>;

    /// Inserts or replaces a tool record.
    async fn upsert_tool(&self, tool: &Tool) -> RegistryStoreResult<()>;

    /// Finds a tool by its composite key.
    async fn find_tool(&self, server_id: ServerId, name: &str)
    -> RegistryStoreResult<Option<Tool>>;

    /// Returns every stored tool.
    async fn load_tools(&self) -> RegistryStoreResult<Vec<Tool>>;

    /// Inserts or replaces a resource record.
    async fn upsert_resource(&self, resource: &Resource) -> RegistryStoreResult<()>;

    /// Returns every stored resource.
    async fn load_resources(&self) -> RegistryStoreResult<Vec<Resource>>;
}

/// Errors returned by registry store implementations.
#[derive(Debug, Clone, Error)]
pub enum RegistryStoreError {
    /// The server was not found.
    #[error("MCP server not found: {0}")]
    NotFound(ServerId),

    /// Persisted data could not be reconstructed into domain types.
    #[error("invalid persisted registry data: {0}")]
    InvalidPersistedData(Arc<dyn std::error::Error + Send + Sync>),

    /// Persistence-layer failure.
    #[error("persistence error: {0}")]
    Persistence(Arc<dyn std::error::Error + Send + Sync>),
}

impl RegistryStoreError {
    /// Wraps persisted-data decoding or validation failures.
    pub fn invalid_persisted_data(err: impl std::error::Error + Send + Sync + 'static) -> Self {
        Self::InvalidPersistedData(Arc::new(err))
    }

    /// Wraps a persistence-layer failure.
    pub fn persistence(err: impl std::error::Error + Send + Sync + 'static) -> Self {
        Self::Persistence(Arc::new(err))
    }
}
