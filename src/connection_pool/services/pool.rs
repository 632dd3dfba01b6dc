//! Live connections keyed by server, plus discovery, execution and probes.

use super::catalog::{resource_from_descriptor, tool_from_descriptor};
use crate::{
    connection_pool::domain::{
        BatchItem, ExecutionOptions, ExecutionOutcome, FailureKind, PoolError, PoolResult,
    },
    tool_registry::domain::{
        HealthReport, McpServer, Resource, ServerId, Tool, TransportKind, duration_to_millis,
    },
    transport::ports::{TransportClient, TransportConnector},
};
use futures::future::join_all;
use mockable::Clock;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::Duration;
use tokio::sync::Semaphore;
use tokio::time::Instant;
use tracing::{debug, info, warn};

/// Default deadline for health probes.
pub const DEFAULT_HEALTH_TIMEOUT: Duration = Duration::from_secs(5);

/// Default cap on concurrently running batch items.
pub const DEFAULT_MAX_BATCH_CONCURRENCY: usize = 8;

/// Pool tuning.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolSettings {
    /// Deadline for the `tools/list` health probe.
    pub health_timeout: Duration,
    /// Maximum batch items in flight at once; at least one.
    pub max_batch_concurrency: usize,
}

impl Default for PoolSettings {
    fn default() -> Self {
        Self {
            health_timeout: DEFAULT_HEALTH_TIMEOUT,
            max_batch_concurrency: DEFAULT_MAX_BATCH_CONCURRENCY,
        }
    }
}

struct PoolEntry {
    client: Arc<dyn TransportClient>,
    healthy: bool,
}

/// Owns every live connection; the only component that opens transports.
pub struct ConnectionPool<C>
where
    C: Clock + Send + Sync,
{
    connector: Arc<dyn TransportConnector>,
    clock: Arc<C>,
    settings: PoolSettings,
    entries: RwLock<HashMap<ServerId, PoolEntry>>,
}

impl<C> ConnectionPool<C>
where
    C: Clock + Send + Sync,
{
    /// Creates an empty pool.
    #[must_use]
    pub fn new(connector: Arc<dyn TransportConnector>, clock: Arc<C>, settings: PoolSettings) -> Self {
        Self {
            connector,
            clock,
            settings,
            entries: RwLock::new(HashMap::new()),
        }
    }

    /// Returns the pool settings.
    #[must_use]
    pub const fn settings(&self) -> PoolSettings {
        self.settings
    }

    fn read_entries(&self) -> PoolResult<RwLockReadGuard<'_, HashMap<ServerId, PoolEntry>>> {
        self.entries.read().map_err(PoolError::poisoned)
    }

    fn write_entries(&self) -> PoolResult<RwLockWriteGuard<'_, HashMap<ServerId, PoolEntry>>> {
        self.entries.write().map_err(PoolError::poisoned)
    }

    /// Connects to `server` and performs the MCP handshake.
    ///
    /// # Errors
    ///
    /// Returns [`PoolError::UnsupportedTransport`] for SSE and WebSocket
    /// servers, [`PoolError::AlreadyConnected`] when a connection exists,
    /// [`PoolError::TimedOut`] when connecting and the handshake together
    /// overrun [`McpServer::timeout`], and [`PoolError::Transport`] when
    /// connecting or the handshake fails. A connection whose handshake fails
    /// is closed before returning.
    pub async fn start_server(&self, server: &McpServer) -> PoolResult<Arc<dyn TransportClient>> {
        let server_id = server.id();
        let kind = server.transport().kind();
        if matches!(kind, TransportKind::Sse | TransportKind::Websocket) {
            return Err(PoolError::UnsupportedTransport(kind));
        }
        if self.read_entries()?.contains_key(&server_id) {
            return Err(PoolError::AlreadyConnected(server_id));
        }

        let deadline = Instant::now() + server.timeout();
        let client = tokio::time::timeout_at(deadline, self.connector.connect(server))
            .await
            .map_err(|_| PoolError::timed_out(server_id, server.timeout()))??;
        let handshake = tokio::time::timeout_at(deadline, client.initialize())
            .await
            .map_err(|_| PoolError::timed_out(server_id, server.timeout()))
            .and_then(|initialized| initialized.map_err(PoolError::from));
        if let Err(err) = handshake {
            close_quietly(server_id, client.as_ref()).await;
            return Err(err);
        }

        let raced = {
            let mut entries = self.write_entries()?;
            if entries.contains_key(&server_id) {
                true
            } else {
                entries.insert(
                    server_id,
                    PoolEntry {
                        client: Arc::clone(&client),
                        healthy: true,
                    },
                );
                false
            }
        };
        if raced {
            close_quietly(server_id, client.as_ref()).await;
            return Err(PoolError::AlreadyConnected(server_id));
        }

        info!(%server_id, name = %server.name(), transport = %kind, "server connected");
        Ok(client)
    }

    /// Removes the server's connection from the pool, then closes it.
    ///
    /// # Errors
    ///
    /// Returns [`PoolError::NotConnected`] when no connection exists and
    /// [`PoolError::Transport`] when closing fails.
    pub async fn stop_server(&self, server_id: ServerId) -> PoolResult<()> {
        let entry = self
            .write_entries()?
            .remove(&server_id)
            .ok_or(PoolError::NotConnected(server_id))?;
        entry.client.close().await?;
        info!(%server_id, "server disconnected");
        Ok(())
    }

    /// Closes every connection, returning the servers that were connected.
    ///
    /// # Errors
    ///
    /// Returns an error when the pool lock is poisoned; close failures are
    /// logged.
    pub async fn close_all(&self) -> PoolResult<Vec<ServerId>> {
        let drained: Vec<(ServerId, PoolEntry)> = self.write_entries()?.drain().collect();
        let mut closed = Vec::with_capacity(drained.len());
        for (server_id, entry) in drained {
            close_quietly(server_id, entry.client.as_ref()).await;
            closed.push(server_id);
        }
        Ok(closed)
    }

    /// Returns the live connection for `server_id`.
    ///
    /// # Errors
    ///
    /// Returns [`PoolError::NotConnected`] when the server has none.
    pub fn get_connection(&self, server_id: ServerId) -> PoolResult<Arc<dyn TransportClient>> {
        self.read_entries()?
            .get(&server_id)
            .map(|entry| Arc::clone(&entry.client))
            .ok_or(PoolError::NotConnected(server_id))
    }

    /// Returns the servers with a pooled connection.
    ///
    /// # Errors
    ///
    /// Returns an error when the pool lock is poisoned.
    pub fn active_servers(&self) -> PoolResult<Vec<ServerId>> {
        let mut servers: Vec<ServerId> = self.read_entries()?.keys().copied().collect();
        servers.sort();
        Ok(servers)
    }

    /// Returns the last probe verdict for a pooled server.
    ///
    /// # Errors
    ///
    /// Returns an error when the pool lock is poisoned.
    pub fn is_healthy(&self, server_id: ServerId) -> PoolResult<Option<bool>> {
        Ok(self
            .read_entries()?
            .get(&server_id)
            .map(|entry| entry.healthy))
    }

    /// Lists the server's tools and maps them onto registry entities.
    ///
    /// Descriptors that fail validation are skipped with a warning.
    ///
    /// # Errors
    ///
    /// Returns [`PoolError::NotConnected`] or the transport failure.
    pub async fn discover_tools(&self, server: &McpServer) -> PoolResult<Vec<Tool>> {
        let client = self.get_connection(server.id())?;
        let descriptors = client.list_tools().await?;
        let discovered_at = self.clock.utc();

        let tools: Vec<Tool> = descriptors
            .into_iter()
            .filter_map(|descriptor| {
                let name = descriptor.name.clone();
                tool_from_descriptor(server, descriptor, discovered_at)
                    .inspect_err(|err| {
                        warn!(server_id = %server.id(), tool = %name, %err, "skipping tool");
                    })
                    .ok()
            })
            .collect();
        debug!(server_id = %server.id(), count = tools.len(), "tools discovered");
        Ok(tools)
    }

    /// Lists the server's resources and maps them onto registry entities.
    ///
    /// # Errors
    ///
    /// Returns [`PoolError::NotConnected`] or the transport failure.
    pub async fn discover_resources(&self, server: &McpServer) -> PoolResult<Vec<Resource>> {
        let client = self.get_connection(server.id())?;
        let descriptors = client.list_resources().await?;
        let discovered_at = self.clock.utc();

        Ok(descriptors
            .into_iter()
            .filter_map(|descriptor| {
                let uri = descriptor.uri.clone();
                resource_from_descriptor(server, descriptor, discovered_at)
                    .inspect_err(|err| {
                        warn!(server_id = %server.id(), %uri, %err, "skipping resource");
                    })
                    .ok()
            })
            .collect())
    }

    /// Reads a resource through the server's connection.
    ///
    /// # Errors
    ///
    /// Returns [`PoolError::NotConnected`] or the transport failure.
    pub async fn read_resource(&self, server_id: ServerId, uri: &str) -> PoolResult<Value> {
        let client = self.get_connection(server_id)?;
        Ok(client.read_resource(uri).await?)
    }

    /// Runs one tool call under its deadline.
    ///
    /// Every failure, including the deadline, is returned as a
    /// [`ExecutionOutcome::Failure`]; the duration covers only the
    /// transport call.
    pub async fn execute_tool(
        &self,
        server_id: ServerId,
        tool: &Tool,
        parameters: Value,
        options: ExecutionOptions,
    ) -> ExecutionOutcome {
        let client = match self.get_connection(server_id) {
            Ok(client) => client,
            Err(err) => {
                return ExecutionOutcome::failure(FailureKind::NotConnected, err.to_string(), 0);
            }
        };

        let deadline = options.timeout_for(tool);
        let started = Instant::now();
        let call = tokio::time::timeout(deadline, client.call_tool(tool.name(), parameters)).await;
        let duration_ms = duration_to_millis(started.elapsed());

        match call {
            Ok(Ok(result)) => {
                debug!(%server_id, tool = tool.name(), duration_ms, "tool call succeeded");
                ExecutionOutcome::success(result, duration_ms)
            }
            Ok(Err(err)) => {
                debug!(%server_id, tool = tool.name(), duration_ms, %err, "tool call failed");
                ExecutionOutcome::from_transport_error(&err, duration_ms)
            }
            Err(_) => {
                let limit_ms = duration_to_millis(deadline);
                warn!(%server_id, tool = tool.name(), limit_ms, "tool call timed out");
                ExecutionOutcome::failure(
                    FailureKind::Timeout,
                    format!("tool '{}' timed out after {limit_ms} ms", tool.name()),
                    duration_ms,
                )
            }
        }
    }

    /// Probes the server with a short `tools/list`.
    ///
    /// A dead process short-circuits to unhealthy. The verdict is recorded on
    /// the pool entry; the connection stays open either way.
    ///
    /// # Errors
    ///
    /// Returns [`PoolError::NotConnected`] when the server has no
    /// connection.
    pub async fn check_health(&self, server_id: ServerId) -> PoolResult<HealthReport> {
        let client = self.get_connection(server_id)?;

        let report = if client.is_alive() {
            let started = Instant::now();
            let probe = tokio::time::timeout(self.settings.health_timeout, client.list_tools()).await;
            let elapsed_ms = duration_to_millis(started.elapsed());
            match probe {
                Ok(Ok(_)) => HealthReport::healthy(elapsed_ms, self.clock.utc()),
                Ok(Err(err)) => HealthReport::unhealthy(err.to_string(), self.clock.utc()),
                Err(_) => HealthReport::unhealthy(
                    format!(
                        "health probe timed out after {} ms",
                        duration_to_millis(self.settings.health_timeout)
                    ),
                    self.clock.utc(),
                ),
            }
        } else {
            HealthReport::unhealthy("server process has exited", self.clock.utc())
        };

        if let Some(entry) = self.write_entries()?.get_mut(&server_id) {
            entry.healthy = report.is_healthy();
        }
        if !report.is_healthy() {
            warn!(%server_id, error = report.error().unwrap_or_default(), "health probe failed");
        }
        Ok(report)
    }

    /// Runs `items` concurrently, at most
    /// [`PoolSettings::max_batch_concurrency`] at a time.
    ///
    /// The returned outcomes line up with `items` by index.
    pub async fn batch_execute_tools(&self, items: Vec<BatchItem>) -> Vec<ExecutionOutcome> {
        let permits = Semaphore::new(self.settings.max_batch_concurrency.max(1));
        let gate = &permits;

        let mut indexed = join_all(items.into_iter().enumerate().map(|(index, item)| async move {
            let Ok(_permit) = gate.acquire().await else {
                let closed = ExecutionOutcome::failure(
                    FailureKind::Unavailable,
                    "batch admission closed",
                    0,
                );
                return (index, closed);
            };
            let outcome = self
                .execute_tool(item.server_id, &item.tool, item.parameters, item.options)
                .await;
            (index, outcome)
        }))
        .await;

        indexed.sort_by_key(|(index, _)| *index);
        indexed.into_iter().map(|(_, outcome)| outcome).collect()
    }
}

async fn close_quietly(server_id: ServerId, client: &dyn TransportClient) {
    if let Err(err) = client.close().await {
        warn!(%server_id, %err, "closing connection failed");
    }
}
