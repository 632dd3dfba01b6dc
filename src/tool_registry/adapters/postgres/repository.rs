//! `PostgreSQL` registry store.

use super::{
    models::{McpResourceRow, McpServerRow, McpToolRow},
    schema::{mcp_resources, mcp_servers, mcp_tools},
};
use crate::tool_registry::{
    domain::{
        HealthReport, McpServer, McpTransport, PersistedServerData, Resource, ServerId,
        ServerName, ServerStatus, Tool, ToolMetrics, UserId,
    },
    ports::{RegistryStore, RegistryStoreError, RegistryStoreResult},
};
use async_trait::async_trait;
use diesel::pg::PgConnection;
use diesel::prelude::*;
use diesel::r2d2::{ConnectionManager, Pool};
use diesel::upsert::excluded;
use std::collections::BTreeSet;
use std::time::Duration;

/// `PostgreSQL` connection pool type for registry adapters.
pub type RegistryPgPool = Pool<ConnectionManager<PgConnection>>;

/// `PostgreSQL`-backed registry store.
#[derive(Debug, Clone)]
pub struct PostgresRegistryStore {
    pool: RegistryPgPool,
}

impl PostgresRegistryStore {
    /// Creates a new store from a `PostgreSQL` pool.
    #[must_use]
    pub const fn new(pool: RegistryPgPool) -> Self {
        Self { pool }
    }

    /// Builds a pool for `database_url` and wraps it in a store.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryStoreError::Persistence`] when the pool cannot open
    /// its initial connections.
    pub fn connect(database_url: &str, max_size: u32) -> RegistryStoreResult<Self> {
        let manager = ConnectionManager::<PgConnection>::new(database_url);
        let pool = Pool::builder()
            .max_size(max_size)
            .build(manager)
            .map_err(RegistryStoreError::persistence)?;
        Ok(Self::new(pool))
    }

    async fn run_blocking<F, T>(&self, operation: F) -> RegistryStoreResult<T>
    where
        F: FnOnce(&mut PgConnection) -> RegistryStoreResult<T> + Send + 'static,
        T: Send + 'static,
    {
        let pool = self.pool.clone();
        tokio::task::spawn_blocking(move || {
            let mut connection = pool.get().map_err(RegistryStoreError::persistence)?;
            operation(&mut connection)
        })
        .await
        .map_err(RegistryStoreError::persistence)?
    }
}

#[async_trait]
impl RegistryStore for PostgresRegistryStore {
    async fn upsert_server(&self, server: &McpServer) -> RegistryStoreResult<()> {
        let row = server_to_row(server)?;
        self.run_blocking(move |connection| {
            diesel::insert_into(mcp_servers::table)
                .values(&row)
                .on_conflict(mcp_servers::id)
                .do_update()
                .set(&row)
                .execute(connection)
                .map_err(RegistryStoreError::persistence)?;
            Ok(())
        })
        .await
    }

    async fn find_server(&self, server_id: ServerId) -> RegistryStoreResult<Option<McpServer>> {
        self.run_blocking(move |connection| {
            let row = mcp_servers::table
                .filter(mcp_servers::id.eq(server_id.into_inner()))
                .select(McpServerRow::as_select())
                .first::<McpServerRow>(connection)
                .optional()
                .map_err(RegistryStoreError::persistence)?;
            row.map(row_to_server).transpose()
        })
        .await
    }

    async fn load_servers(&self) -> RegistryStoreResult<Vec<McpServer>> {
        self.run_blocking(move |connection| {
            let rows = mcp_servers::table
                .order(mcp_servers::created_at.asc())
                .select(McpServerRow::as_select())
                .load::<McpServerRow>(connection)
                .map_err(RegistryStoreError::persistence)?;
            rows.into_iter().map(row_to_server).collect()
        })
        .await
    }

    async fn delete_server(&self, server_id: ServerId) -> RegistryStoreResult<()> {
        let id = server_id.into_inner();
        self.run_blocking(move |connection| {
            connection.transaction::<_, RegistryStoreError, _>(|tx| {
                diesel::delete(mcp_tools::table.filter(mcp_tools::server_id.eq(id)))
                    .execute(tx)
                    .map_err(RegistryStoreError::persistence)?;
                diesel::delete(mcp_resources::table.filter(mcp_resources::server_id.eq(id)))
                    .execute(tx)
                    .map_err(RegistryStoreError::persistence)?;
                let deleted = diesel::delete(mcp_servers::table.filter(mcp_servers::id.eq(id)))
                    .execute(tx)
                    .map_err(RegistryStoreError::persistence)?;
                if deleted == 0 {
                    return Err(RegistryStoreError::NotFound(server_id));
                }
                Ok(())
            })
        })
        .await
    }

    async fn upsert_tool(&self, tool: &Tool) -> RegistryStoreResult<()> {
        let row = tool_to_row(tool)?;
        self.run_blocking(move |connection| {
            diesel::insert_into(mcp_tools::table)
                .values(&row)
                .on_conflict((mcp_tools::server_id, mcp_tools::name))
                .do_update()
                .set((
                    mcp_tools::definition.eq(excluded(mcp_tools::definition)),
                    mcp_tools::metrics.eq(excluded(mcp_tools::metrics)),
                    mcp_tools::discovered_at.eq(excluded(mcp_tools::discovered_at)),
                ))
                .execute(connection)
                .map_err(RegistryStoreError::persistence)?;
            Ok(())
        })
        .await
    }

    async fn find_tool(
        &self,
        server_id: ServerId,
        name: &str,
    ) -> RegistryStoreResult<Option<Tool>> {
        let tool_name = name.to_owned();
        self.run_blocking(move |connection| {
            let row = mcp_tools::table
                .filter(mcp_tools::server_id.eq(server_id.into_inner()))
                .filter(mcp_tools::name.eq(&tool_name))
                .select(McpToolRow::as_select())
                .first::<McpToolRow>(connection)
                .optional()
                .map_err(RegistryStoreError::persistence)?;
            row.map(row_to_tool).transpose()
        })
        .await
    }

    async fn load_tools(&self) -> RegistryStoreResult<Vec<Tool>> {
        self.run_blocking(move |connection| {
            let rows = mcp_tools::table
                .order((mcp_tools::discovered_at.asc(), mcp_tools::name.asc()))
                .select(McpToolRow::as_select())
                .load::<McpToolRow>(connection)
                .map_err(RegistryStoreError::persistence)?;
            rows.into_iter().map(row_to_tool).collect()
        })
        .await
    }

    async fn upsert_resource(&self, resource: &Resource) -> RegistryStoreResult<()> {
        let row = McpResourceRow {
            server_id: resource.server_id().into_inner(),
            uri: resource.uri().to_owned(),
            definition: serde_json::to_value(resource).map_err(RegistryStoreError::persistence)?,
            discovered_at: resource.discovered_at(),
        };
        self.run_blocking(move |connection| {
            diesel::insert_into(mcp_resources::table)
                .values(&row)
                .on_conflict((mcp_resources::server_id, mcp_resources::uri))
                .do_update()
                .set((
                    mcp_resources::definition.eq(excluded(mcp_resources::definition)),
                    mcp_resources::discovered_at.eq(excluded(mcp_resources::discovered_at)),
                ))
                .execute(connection)
                .map_err(RegistryStoreError::persistence)?;
            Ok(())
        })
        .await
    }

    async fn load_resources(&self) -> RegistryStoreResult<Vec<Resource>> {
        self.run_blocking(move |connection| {
            let rows = mcp_resources::table
                .order((mcp_resources::discovered_at.asc(), mcp_resources::uri.asc()))
                .select(McpResourceRow::as_select())
                .load::<McpResourceRow>(connection)
                .map_err(RegistryStoreError::persistence)?;
            rows.into_iter()
                .map(|row| {
                    serde_json::from_value(row.definition)
                        .map_err(RegistryStoreError::invalid_persisted_data)
                })
                .collect()
        })
        .await
    }
}

impl From<diesel::result::Error> for RegistryStoreError {
    fn from(err: diesel::result::Error) -> Self {
        Self::persistence(err)
    }
}

pub(super) fn server_to_row(server: &McpServer) -> RegistryStoreResult<McpServerRow> {
    let transport =
        serde_json::to_value(server.transport()).map_err(RegistryStoreError::persistence)?;
    let tags = serde_json::to_value(server.tags()).map_err(RegistryStoreError::persistence)?;
    let last_health = server
        .last_health()
        .map(serde_json::to_value)
        .transpose()
        .map_err(RegistryStoreError::persistence)?;
    let timeout_ms = i64::try_from(server.timeout().as_millis()).unwrap_or(i64::MAX);
    let tool_count = i32::try_from(server.tool_count()).unwrap_or(i32::MAX);

    Ok(McpServerRow {
        id: server.id().into_inner(),
        name: server.name().as_str().to_owned(),
        transport,
        status: server.status().as_str().to_owned(),
        owner_id: server.owner_id().map(|owner| owner.as_str().to_owned()),
        tags,
        auto_start: server.auto_start(),
        timeout_ms,
        tool_count,
        last_discovery: server.last_discovery(),
        catalog_fingerprint: server.catalog_fingerprint().map(str::to_owned),
        error_message: server.error_message().map(str::to_owned),
        last_health,
        created_at: server.created_at(),
        updated_at: server.updated_at(),
    })
}

pub(super) fn row_to_server(row: McpServerRow) -> RegistryStoreResult<McpServer> {
    let McpServerRow {
        id,
        name,
        transport,
        status,
        owner_id,
        tags,
        auto_start,
        timeout_ms,
        tool_count,
        last_discovery,
        catalog_fingerprint,
        error_message,
        last_health,
        created_at,
        updated_at,
    } = row;

    let parsed_name = ServerName::new(name).map_err(RegistryStoreError::invalid_persisted_data)?;
    let parsed_transport: McpTransport =
        serde_json::from_value(transport).map_err(RegistryStoreError::invalid_persisted_data)?;
    let parsed_status = ServerStatus::try_from(status.as_str())
        .map_err(RegistryStoreError::invalid_persisted_data)?;
    let parsed_tags: BTreeSet<String> =
        serde_json::from_value(tags).map_err(RegistryStoreError::invalid_persisted_data)?;
    let parsed_health: Option<HealthReport> = last_health
        .map(serde_json::from_value)
        .transpose()
        .map_err(RegistryStoreError::invalid_persisted_data)?;
    let timeout = u64::try_from(timeout_ms)
        .map(Duration::from_millis)
        .map_err(RegistryStoreError::invalid_persisted_data)?;
    let parsed_tool_count =
        u32::try_from(tool_count).map_err(RegistryStoreError::invalid_persisted_data)?;

    Ok(McpServer::from_persisted(PersistedServerData {
        id: ServerId::from_uuid(id),
        name: parsed_name,
        transport: parsed_transport,
        status: parsed_status,
        owner_id: owner_id.map(UserId::new),
        tags: parsed_tags,
        auto_start,
        timeout,
        tool_count: parsed_tool_count,
        last_discovery,
        catalog_fingerprint,
        error_message,
        last_health: parsed_health,
        created_at,
        updated_at,
    }))
}

pub(super) fn tool_to_row(tool: &Tool) -> RegistryStoreResult<McpToolRow> {
    Ok(McpToolRow {
        server_id: tool.server_id().into_inner(),
        name: tool.name().to_owned(),
        definition: serde_json::to_value(tool).map_err(RegistryStoreError::persistence)?,
        metrics: serde_json::to_value(tool.metrics()).map_err(RegistryStoreError::persistence)?,
        discovered_at: tool.discovered_at(),
    })
}

pub(super) fn row_to_tool(row: McpToolRow) -> RegistryStoreResult<Tool> {
    let tool: Tool =
        serde_json::from_value(row.definition).map_err(RegistryStoreError::invalid_persisted_data)?;
    let metrics: ToolMetrics =
        serde_json::from_value(row.metrics).map_err(RegistryStoreError::invalid_persisted_data)?;
    Ok(tool.with_metrics(metrics))
}
