//! Authorised, audited orchestration of the registry and connection pool.

use super::monitor::MonitorHandle;
use crate::{
    connection_pool::{
        domain::{ExecutionOptions, ExecutionOutcome, FailureKind, PoolError},
        services::ConnectionPool,
    },
    gateway::{
        domain::{
            AuditEvent, AuditEventType, GatewayError, GatewayResult, PendingExecution,
            ServerDefinition, ServerStatusReport, Severity, StartServerResponse,
            ToolCallRequest, ToolExecutionResult,
        },
        ports::{AuditSink, SecurityPolicy},
    },
    resilience::{
        adapters::PoolExecutor,
        domain::{CircuitBreakerConfig, CircuitState},
        ports::ToolExecutor,
        services::{CircuitBreaker, guard_outcome},
    },
    tool_registry::{
        domain::{
            HealthReport, McpServer, Resource, ServerFilter, ServerId, ServerStatus, Tool,
            ToolFilter, ToolKey, UserId,
        },
        ports::RegistryStore,
        services::ToolRegistry,
    },
};
use futures::future::join_all;
use mockable::Clock;
use serde_json::{Value, json};
use sha2::{Digest, Sha256};
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, PoisonError, RwLock};
use std::time::Duration;
use tokio::sync::Semaphore;
use tracing::{debug, info, warn};

/// Default period between health passes.
pub const DEFAULT_HEALTH_INTERVAL: Duration = Duration::from_secs(30);

/// Default cap on concurrently running batch requests.
pub const DEFAULT_BATCH_CONCURRENCY: usize = 8;

/// Gateway tuning.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GatewaySettings {
    /// Breaker configuration applied to every tool.
    pub circuit_breaker: CircuitBreakerConfig,
    /// Period of the background health monitor.
    pub health_interval: Duration,
    /// Maximum batch requests in flight at once; at least one.
    pub max_batch_concurrency: usize,
}

impl Default for GatewaySettings {
    fn default() -> Self {
        Self {
            circuit_breaker: CircuitBreakerConfig::default(),
            health_interval: DEFAULT_HEALTH_INTERVAL,
            max_batch_concurrency: DEFAULT_BATCH_CONCURRENCY,
        }
    }
}

/// Entry point for every tool-gateway operation.
///
/// Each operation consults the [`SecurityPolicy`] before touching state and
/// records one [`AuditEvent`]. Tool calls run through a per-tool
/// [`CircuitBreaker`] in front of either the pool or a registered
/// load-balanced route.
pub struct Gateway<S, C>
where
    S: RegistryStore + 'static,
    C: Clock + Send + Sync + 'static,
{
    registry: Arc<ToolRegistry<S, C>>,
    pool: Arc<ConnectionPool<C>>,
    security: Arc<dyn SecurityPolicy>,
    audit: Arc<dyn AuditSink>,
    clock: Arc<C>,
    settings: GatewaySettings,
    executor: Arc<dyn ToolExecutor>,
    breakers: Mutex<HashMap<ToolKey, Arc<CircuitBreaker>>>,
    routes: RwLock<HashMap<ToolKey, Arc<dyn ToolExecutor>>>,
    monitor: Mutex<Option<MonitorHandle>>,
}

impl<S, C> Gateway<S, C>
where
    S: RegistryStore + 'static,
    C: Clock + Send + Sync + 'static,
{
    /// Wires a gateway whose tool calls go straight to `pool`.
    #[must_use]
    pub fn new(
        registry: Arc<ToolRegistry<S, C>>,
        pool: Arc<ConnectionPool<C>>,
        security: Arc<dyn SecurityPolicy>,
        audit: Arc<dyn AuditSink>,
        clock: Arc<C>,
        settings: GatewaySettings,
    ) -> Self {
        let executor: Arc<dyn ToolExecutor> = Arc::new(PoolExecutor::new(Arc::clone(&pool)));
        Self {
            registry,
            pool,
            security,
            audit,
            clock,
            settings,
            executor,
            breakers: Mutex::new(HashMap::new()),
            routes: RwLock::new(HashMap::new()),
            monitor: Mutex::new(None),
        }
    }

    /// Replaces the default executor, for example with a retry layer over
    /// the pool.
    #[must_use]
    pub fn with_executor(mut self, executor: Arc<dyn ToolExecutor>) -> Self {
        self.executor = executor;
        self
    }

    /// Returns the registry.
    #[must_use]
    pub const fn registry(&self) -> &Arc<ToolRegistry<S, C>> {
        &self.registry
    }

    /// Returns the connection pool.
    #[must_use]
    pub const fn pool(&self) -> &Arc<ConnectionPool<C>> {
        &self.pool
    }

    /// Returns the gateway settings.
    #[must_use]
    pub const fn settings(&self) -> GatewaySettings {
        self.settings
    }

    /// Validates and registers a server, starting it when the definition
    /// asks for `auto_start`.
    ///
    /// A failed auto-start is logged and left visible in the server status;
    /// the registration itself still succeeds.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::PermissionDenied`], [`GatewayError::Validation`]
    /// for an invalid definition, or registry errors.
    pub async fn register_server(
        &self,
        definition: &ServerDefinition,
        user: Option<&UserId>,
    ) -> GatewayResult<ServerId> {
        if !self.security.can_register_server(user, definition).await {
            return Err(self
                .deny(user, "register_server", json!({ "name": definition.name }))
                .await);
        }

        let built = definition.build(user.cloned(), self.clock.as_ref());
        if let Err(err) = &built {
            self.emit(
                AuditEventType::ValidationFailed,
                user,
                json!({ "operation": "register_server", "name": definition.name, "error": err.to_string() }),
                Severity::Warning,
            )
            .await;
        }
        let server = built?;
        let server_id = server.id();
        let auto_start = server.auto_start();
        self.registry.register_server(server).await?;
        info!(%server_id, name = %definition.name, transport = %definition.transport, "server registered");
        self.emit(
            AuditEventType::ServerRegistered,
            user,
            json!({ "server_id": server_id, "name": definition.name, "transport": definition.transport }),
            Severity::Info,
        )
        .await;

        if !auto_start {
            return Ok(server_id);
        }
        if let Err(err) = self.start_server(server_id, user).await {
            warn!(%server_id, %err, "auto-start failed");
        }
        Ok(server_id)
    }

    /// Connects a server, performs the handshake and discovers its catalog.
    ///
    /// The server only becomes `running` once the initial `tools/list`
    /// succeeds within its timeout; otherwise the connection is closed.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::ServerNotFound`],
    /// [`GatewayError::PermissionDenied`], [`GatewayError::Runtime`] when the
    /// current status cannot move to `starting`, or the connection,
    /// handshake, discovery or [`GatewayError::Timeout`] failure after the
    /// server has been marked `error`.
    pub async fn start_server(
        &self,
        server_id: ServerId,
        user: Option<&UserId>,
    ) -> GatewayResult<StartServerResponse> {
        let mut server = self.load_server(server_id).await?;
        self.authorize_manage(user, &server, "start_server").await?;
        server.mark_starting(self.clock.as_ref())?;
        self.registry.update_server(server.clone()).await?;

        let started = self.pool.start_server(&server).await;
        if let Err(err) = &started {
            self.record_start_failure(server.clone(), user, &err.to_string())
                .await;
        }
        started?;

        let deadline = server.timeout();
        let listing = tokio::time::timeout(deadline, self.pool.discover_tools(&server))
            .await
            .map_err(|_| PoolError::timed_out(server_id, deadline))
            .and_then(|listed| listed);
        let discovered = match listing {
            Ok(discovered) => discovered,
            Err(err) => {
                self.disconnect(server_id).await;
                let message = format!("initial tool discovery failed: {err}");
                self.record_start_failure(server, user, &message).await;
                return Err(err.into());
            }
        };

        server.mark_running(self.clock.as_ref())?;
        self.registry.update_server(server.clone()).await?;
        let (tools, _) = self.store_catalog(&mut server, discovered).await?;
        let tools_available = tools.len();
        let status = server.status();
        info!(%server_id, tools_available, "server started");
        self.emit(
            AuditEventType::ServerStarted,
            user,
            json!({ "server_id": server_id, "tools_available": tools_available }),
            Severity::Info,
        )
        .await;

        Ok(StartServerResponse {
            success: true,
            status,
            tools_available,
        })
    }

    async fn record_start_failure(
        &self,
        mut server: McpServer,
        user: Option<&UserId>,
        message: &str,
    ) {
        let server_id = server.id();
        warn!(%server_id, error = message, "server failed to start");
        match server.mark_error(message, self.clock.as_ref()) {
            Ok(()) => self.persist_best_effort(server).await,
            Err(err) => warn!(%server_id, %err, "could not record start failure"),
        }
        self.emit(
            AuditEventType::ServerStartFailed,
            user,
            json!({ "server_id": server_id, "error": message }),
            Severity::Error,
        )
        .await;
    }

    /// Closes a server's connection and marks it stopped.
    ///
    /// Stopping a server without a connection only updates its status.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::ServerNotFound`],
    /// [`GatewayError::PermissionDenied`] or registry errors.
    pub async fn stop_server(&self, server_id: ServerId, user: Option<&UserId>) -> GatewayResult<()> {
        let mut server = self.load_server(server_id).await?;
        self.authorize_manage(user, &server, "stop_server").await?;
        self.disconnect(server_id).await;

        if server.status() != ServerStatus::Stopped {
            server.mark_stopped(self.clock.as_ref())?;
            self.registry.update_server(server).await?;
        }
        info!(%server_id, "server stopped");
        self.emit(
            AuditEventType::ServerStopped,
            user,
            json!({ "server_id": server_id }),
            Severity::Info,
        )
        .await;
        Ok(())
    }

    /// Stops and removes a server with its tools and resources.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::ServerNotFound`],
    /// [`GatewayError::PermissionDenied`] or registry errors.
    pub async fn delete_server(
        &self,
        server_id: ServerId,
        user: Option<&UserId>,
    ) -> GatewayResult<()> {
        let server = self.load_server(server_id).await?;
        self.authorize_manage(user, &server, "delete_server").await?;
        self.disconnect(server_id).await;
        self.registry.delete_server(server_id).await?;
        self.forget_tools(server_id);

        info!(%server_id, name = %server.name(), "server deleted");
        self.emit(
            AuditEventType::ServerDeleted,
            user,
            json!({ "server_id": server_id, "name": server.name().as_str() }),
            Severity::Info,
        )
        .await;
        Ok(())
    }

    async fn disconnect(&self, server_id: ServerId) {
        match self.pool.stop_server(server_id).await {
            Ok(()) | Err(PoolError::NotConnected(_)) => {}
            Err(err) => warn!(%server_id, %err, "connection did not close cleanly"),
        }
    }

    fn forget_tools(&self, server_id: ServerId) {
        self.breakers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .retain(|key, _| key.server_id != server_id);
        self.routes
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .retain(|key, _| key.server_id != server_id);
    }

    /// Lists the server's tools and resources and persists them.
    ///
    /// Resources are refreshed best effort. A failed listing marks the
    /// server unhealthy before the error is returned.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::ServerNotFound`],
    /// [`GatewayError::PermissionDenied`], the listing failure, or registry
    /// errors.
    pub async fn discover_tools(
        &self,
        server_id: ServerId,
        user: Option<&UserId>,
    ) -> GatewayResult<Vec<Tool>> {
        let mut server = self.load_server(server_id).await?;
        self.authorize_manage(user, &server, "discover_tools").await?;

        let discovered = self.pool.discover_tools(&server).await;
        if let Err(err) = &discovered {
            self.record_discovery_failure(server.clone(), user, &err.to_string())
                .await;
        }

        let (tools, resource_count) = self.store_catalog(&mut server, discovered?).await?;
        let tool_count = u32::try_from(tools.len()).unwrap_or(u32::MAX);

        info!(%server_id, tool_count, resource_count, "catalog discovered");
        self.emit(
            AuditEventType::ToolsDiscovered,
            user,
            json!({ "server_id": server_id, "tool_count": tool_count, "resource_count": resource_count }),
            Severity::Info,
        )
        .await;
        Ok(tools)
    }

    async fn record_discovery_failure(
        &self,
        mut server: McpServer,
        user: Option<&UserId>,
        message: &str,
    ) {
        let server_id = server.id();
        warn!(%server_id, error = message, "tool discovery failed");
        let report = HealthReport::unhealthy(format!("discovery failed: {message}"), self.clock.utc());
        if server.apply_health(report, self.clock.as_ref()).is_ok() {
            self.persist_best_effort(server).await;
        }
        self.emit(
            AuditEventType::DiscoveryFailed,
            user,
            json!({ "server_id": server_id, "error": message }),
            Severity::Error,
        )
        .await;
    }

    /// Persists a fresh catalog and stamps the server with its fingerprint.
    async fn store_catalog(
        &self,
        server: &mut McpServer,
        discovered: Vec<Tool>,
    ) -> GatewayResult<(Vec<Tool>, usize)> {
        let mut tools = Vec::with_capacity(discovered.len());
        for tool in discovered {
            tools.push(self.registry.register_tool(tool).await?);
        }
        let resource_count = self.refresh_resources(server).await;
        let tool_count = u32::try_from(tools.len()).unwrap_or(u32::MAX);
        server.record_discovery(tool_count, catalog_fingerprint(&tools), self.clock.as_ref());
        self.registry.update_server(server.clone()).await?;
        Ok((tools, resource_count))
    }

    async fn refresh_resources(&self, server: &McpServer) -> usize {
        let server_id = server.id();
        let listing = tokio::time::timeout(server.timeout(), self.pool.discover_resources(server))
            .await
            .map_err(|_| PoolError::timed_out(server_id, server.timeout()))
            .and_then(|listed| listed);
        let Ok(resources) =
            listing.inspect_err(|err| debug!(%server_id, %err, "resource listing skipped"))
        else {
            return 0;
        };

        let mut stored = 0_usize;
        for resource in resources {
            let uri = resource.uri().to_owned();
            if let Err(err) = self.registry.register_resource(resource).await {
                warn!(%server_id, uri, %err, "resource not stored");
                continue;
            }
            stored = stored.saturating_add(1);
        }
        stored
    }

    /// Runs one tool call.
    ///
    /// Lookup, permission and parameter problems are errors; everything that
    /// happens once the call is dispatched comes back as a failed
    /// [`ToolExecutionResult`].
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::ServerNotFound`],
    /// [`GatewayError::ToolNotFound`], [`GatewayError::PermissionDenied`] or
    /// [`GatewayError::Validation`] without contacting any transport.
    pub async fn execute_tool(
        &self,
        server_id: ServerId,
        tool_name: &str,
        parameters: Value,
        user: Option<&UserId>,
        options: ExecutionOptions,
    ) -> GatewayResult<ToolExecutionResult> {
        let server = self.load_server(server_id).await?;
        let tool = self
            .registry
            .get_tool(server_id, tool_name)
            .await?
            .ok_or_else(|| GatewayError::ToolNotFound {
                server_id,
                tool: tool_name.to_owned(),
            })?;
        if !self.security.can_execute_tool(user, &server, &tool).await {
            return Err(self
                .deny(user, "execute_tool", json!({ "server_id": server_id, "tool": tool_name }))
                .await);
        }
        self.validate_parameters(user, &tool, &parameters).await?;

        let pending = PendingExecution::start(
            server_id,
            tool_name,
            parameters,
            user.cloned(),
            self.clock.as_ref(),
        );
        let key = tool.key();
        let executor = self.route_for(&key);
        let breaker = self.breaker_for(&key);
        let outcome = guard_outcome(
            &breaker,
            executor.execute(server_id, &tool, pending.parameters().clone(), options),
        )
        .await;
        self.record_metrics(server_id, tool_name, &outcome).await;

        let execution = pending.finish(&outcome, self.clock.as_ref());
        let result = ToolExecutionResult::from(&execution);
        info!(
            %server_id,
            tool = tool_name,
            execution_id = %execution.id,
            success = result.success,
            duration_ms = result.duration_ms,
            "tool executed"
        );
        self.emit(
            AuditEventType::ToolExecuted,
            user,
            json!({
                "execution_id": execution.id,
                "server_id": server_id,
                "tool": tool_name,
                "status": execution.status,
                "duration_ms": execution.duration_ms,
                "error": execution.error,
                "failure_kind": execution.failure_kind,
            }),
            if result.success { Severity::Info } else { Severity::Warning },
        )
        .await;
        Ok(result)
    }

    async fn validate_parameters(
        &self,
        user: Option<&UserId>,
        tool: &Tool,
        parameters: &Value,
    ) -> GatewayResult<()> {
        let missing = tool.missing_params(parameters);
        let problem = if missing.is_empty() {
            let accepted = self
                .security
                .validate_tool_parameters(user, tool.name(), parameters)
                .await;
            (!accepted).then(|| format!("parameters for '{}' were rejected", tool.name()))
        } else {
            Some(format!("missing required parameters: {}", missing.join(", ")))
        };

        let Some(message) = problem else {
            return Ok(());
        };
        self.emit(
            AuditEventType::ValidationFailed,
            user,
            json!({ "server_id": tool.server_id(), "tool": tool.name(), "error": message }),
            Severity::Warning,
        )
        .await;
        Err(GatewayError::Validation(message))
    }

    async fn record_metrics(&self, server_id: ServerId, tool_name: &str, outcome: &ExecutionOutcome) {
        if outcome.failure_kind() == Some(FailureKind::CircuitOpen) {
            return;
        }
        let updated = self
            .registry
            .update_tool_metrics(server_id, tool_name, outcome.duration_ms(), outcome.is_success())
            .await;
        if let Err(err) = updated {
            warn!(%server_id, tool = tool_name, %err, "tool metrics not recorded");
        }
    }

    /// Runs `requests` concurrently, at most
    /// [`GatewaySettings::max_batch_concurrency`] at a time.
    ///
    /// Results line up with `requests` by index; requests that fail lookup,
    /// authorisation or validation become failed results.
    pub async fn batch_execute_tools(
        &self,
        requests: Vec<ToolCallRequest>,
        user: Option<&UserId>,
    ) -> Vec<ToolExecutionResult> {
        let permits = Semaphore::new(self.settings.max_batch_concurrency.max(1));
        let gate = &permits;
        debug!(requests = requests.len(), "batch execution started");

        join_all(requests.into_iter().map(|request| async move {
            let Ok(_permit) = gate.acquire().await else {
                return ToolExecutionResult::rejected(
                    FailureKind::Unavailable,
                    "batch admission closed",
                );
            };
            self.execute_tool(
                request.server_id,
                &request.tool_name,
                request.parameters,
                user,
                request.options,
            )
            .await
            .unwrap_or_else(|err| ToolExecutionResult::rejected(err.failure_kind(), err.to_string()))
        }))
        .await
    }

    /// Routes a tool through `executor` instead of the pool, typically a
    /// [`BalancedExecutor`](crate::resilience::services::BalancedExecutor).
    ///
    /// The per-tool breaker still applies in front of the route.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::ServerNotFound`],
    /// [`GatewayError::PermissionDenied`] or [`GatewayError::ToolNotFound`].
    pub async fn register_balanced_tool(
        &self,
        server_id: ServerId,
        tool_name: &str,
        executor: Arc<dyn ToolExecutor>,
        user: Option<&UserId>,
    ) -> GatewayResult<()> {
        let server = self.load_server(server_id).await?;
        self.authorize_manage(user, &server, "register_balanced_tool")
            .await?;
        if self.registry.get_tool(server_id, tool_name).await?.is_none() {
            return Err(GatewayError::ToolNotFound {
                server_id,
                tool: tool_name.to_owned(),
            });
        }

        self.routes
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(ToolKey::new(server_id, tool_name), executor);
        info!(%server_id, tool = tool_name, "tool routed through balanced executor");
        Ok(())
    }

    fn route_for(&self, key: &ToolKey) -> Arc<dyn ToolExecutor> {
        self.routes
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(key)
            .cloned()
            .unwrap_or_else(|| Arc::clone(&self.executor))
    }

    fn breaker_for(&self, key: &ToolKey) -> Arc<CircuitBreaker> {
        let mut breakers = self.breakers.lock().unwrap_or_else(PoisonError::into_inner);
        Arc::clone(breakers.entry(key.clone()).or_insert_with(|| {
            Arc::new(CircuitBreaker::new(key.to_string(), self.settings.circuit_breaker))
        }))
    }

    /// Returns the breaker state of a tool that has executed at least once.
    #[must_use]
    pub fn circuit_state(&self, server_id: ServerId, tool_name: &str) -> Option<CircuitState> {
        self.breakers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&ToolKey::new(server_id, tool_name))
            .map(|breaker| breaker.state())
    }

    fn circuits_for(&self, server_id: ServerId) -> Vec<(String, CircuitState)> {
        let mut circuits: Vec<(String, CircuitState)> = self
            .breakers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .filter(|(key, _)| key.server_id == server_id)
            .map(|(key, breaker)| (key.name.clone(), breaker.state()))
            .collect();
        circuits.sort_by(|left, right| left.0.cmp(&right.0));
        circuits
    }

    /// Returns the servers matching `filter` that `user` may see.
    ///
    /// # Errors
    ///
    /// Returns registry errors.
    pub async fn list_servers(
        &self,
        user: Option<&UserId>,
        filter: &ServerFilter,
    ) -> GatewayResult<Vec<McpServer>> {
        let mut visible = Vec::new();
        for server in self.registry.list_servers(filter)? {
            if self.security.can_access_server(user, &server).await {
                visible.push(server);
            }
        }
        Ok(visible)
    }

    async fn accessible_server_ids(&self, user: Option<&UserId>) -> GatewayResult<HashSet<ServerId>> {
        Ok(self
            .list_servers(user, &ServerFilter::default())
            .await?
            .iter()
            .map(McpServer::id)
            .collect())
    }

    /// Returns tools, optionally for one server, matching `filter` on
    /// servers `user` may see.
    ///
    /// # Errors
    ///
    /// Returns registry errors.
    pub async fn list_tools(
        &self,
        server_id: Option<ServerId>,
        filter: &ToolFilter,
        user: Option<&UserId>,
    ) -> GatewayResult<Vec<Tool>> {
        let visible = self.accessible_server_ids(user).await?;
        Ok(self
            .registry
            .list_tools(server_id, filter)?
            .into_iter()
            .filter(|tool| visible.contains(&tool.server_id()))
            .collect())
    }

    /// Returns up to `limit` visible tools whose name or description
    /// contains `query`.
    ///
    /// # Errors
    ///
    /// Returns registry errors.
    pub async fn search_tools(
        &self,
        query: &str,
        limit: usize,
        user: Option<&UserId>,
    ) -> GatewayResult<Vec<Tool>> {
        let visible = self.accessible_server_ids(user).await?;
        Ok(self
            .registry
            .search_tools(query, usize::MAX)?
            .into_iter()
            .filter(|tool| visible.contains(&tool.server_id()))
            .take(limit)
            .collect())
    }

    /// Returns visible resources, optionally for one server.
    ///
    /// # Errors
    ///
    /// Returns registry errors.
    pub async fn list_resources(
        &self,
        server_id: Option<ServerId>,
        user: Option<&UserId>,
    ) -> GatewayResult<Vec<Resource>> {
        let visible = self.accessible_server_ids(user).await?;
        Ok(self
            .registry
            .list_resources(server_id)?
            .into_iter()
            .filter(|resource| visible.contains(&resource.server_id()))
            .collect())
    }

    /// Reads a resource from a connected server.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::ServerNotFound`],
    /// [`GatewayError::PermissionDenied`] or the transport failure.
    pub async fn read_resource(
        &self,
        server_id: ServerId,
        uri: &str,
        user: Option<&UserId>,
    ) -> GatewayResult<Value> {
        let server = self.load_server(server_id).await?;
        self.authorize_access(user, &server, "read_resource").await?;
        let content = self.pool.read_resource(server_id, uri).await?;
        self.emit(
            AuditEventType::ResourceRead,
            user,
            json!({ "server_id": server_id, "uri": uri }),
            Severity::Info,
        )
        .await;
        Ok(content)
    }

    /// Returns a server's status, connection and breaker snapshot.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::ServerNotFound`] or
    /// [`GatewayError::PermissionDenied`].
    pub async fn get_server_status(
        &self,
        server_id: ServerId,
        user: Option<&UserId>,
    ) -> GatewayResult<ServerStatusReport> {
        let server = self.load_server(server_id).await?;
        self.authorize_access(user, &server, "get_server_status")
            .await?;
        let connected = self.pool.get_connection(server_id).is_ok();
        Ok(ServerStatusReport::new(
            &server,
            connected,
            self.circuits_for(server_id),
        ))
    }

    /// Probes one server now and records the verdict.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::ServerNotFound`],
    /// [`GatewayError::PermissionDenied`], a connection error when the
    /// server is not connected, or registry errors.
    pub async fn check_server_health(
        &self,
        server_id: ServerId,
        user: Option<&UserId>,
    ) -> GatewayResult<HealthReport> {
        let server = self.load_server(server_id).await?;
        self.authorize_access(user, &server, "check_server_health")
            .await?;
        let report = self.pool.check_health(server_id).await?;
        self.apply_health_report(server_id, report.clone()).await?;
        Ok(report)
    }

    async fn apply_health_report(
        &self,
        server_id: ServerId,
        report: HealthReport,
    ) -> GatewayResult<ServerStatus> {
        let mut server = self.load_server(server_id).await?;
        let previous = server.apply_health(report, self.clock.as_ref())?;
        let current = server.status();
        let error = server.error_message().map(str::to_owned);
        self.registry.update_server(server).await?;

        if previous != current {
            let severity = if current == ServerStatus::Unhealthy {
                warn!(%server_id, error = error.as_deref(), "server became unhealthy");
                Severity::Warning
            } else {
                info!(%server_id, "server recovered");
                Severity::Info
            };
            self.emit(
                AuditEventType::HealthChanged,
                None,
                json!({ "server_id": server_id, "from": previous, "to": current, "error": error }),
                severity,
            )
            .await;
        }
        Ok(current)
    }

    /// Probes every connected server once, returning how many verdicts were
    /// recorded.
    pub async fn run_health_pass(&self) -> usize {
        let active = self
            .pool
            .active_servers()
            .inspect_err(|err| warn!(%err, "health pass skipped"))
            .unwrap_or_default();

        let mut checked = 0_usize;
        for server_id in active {
            let probed = match self.pool.check_health(server_id).await {
                Ok(report) => self.apply_health_report(server_id, report).await,
                Err(err) => Err(err.into()),
            };
            if let Err(err) = probed {
                debug!(%server_id, %err, "health verdict not recorded");
                continue;
            }
            checked = checked.saturating_add(1);
        }
        checked
    }

    /// Starts the background health monitor unless one is already running.
    ///
    /// The task holds only a weak reference, so dropping the last gateway
    /// handle also ends it.
    pub fn spawn_health_monitor(self: &Arc<Self>) {
        let mut slot = self.monitor.lock().unwrap_or_else(PoisonError::into_inner);
        if slot.is_some() {
            debug!("health monitor already running");
            return;
        }
        *slot = Some(MonitorHandle::spawn(
            Arc::downgrade(self),
            self.settings.health_interval,
        ));
    }

    /// Returns whether the background health monitor is running.
    #[must_use]
    pub fn is_monitoring(&self) -> bool {
        self.monitor
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }

    /// Stops the background health monitor, waiting for a pass in progress.
    pub async fn stop_health_monitor(&self) {
        let handle = self
            .monitor
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(running) = handle {
            running.stop().await;
        }
    }

    /// Stops the monitor, closes every connection and marks the affected
    /// servers stopped.
    ///
    /// Returns the servers that were connected.
    ///
    /// # Errors
    ///
    /// Returns an error when the pool lock is poisoned; per-server status
    /// updates are best effort.
    pub async fn shutdown(&self) -> GatewayResult<Vec<ServerId>> {
        self.stop_health_monitor().await;
        let closed = self.pool.close_all().await?;
        for server_id in &closed {
            let loaded = self.load_server(*server_id).await;
            let Ok(mut server) =
                loaded.inspect_err(|err| warn!(%server_id, %err, "stopped server not found"))
            else {
                continue;
            };
            if server.mark_stopped(self.clock.as_ref()).is_ok() {
                self.persist_best_effort(server).await;
            }
        }
        info!(servers = closed.len(), "gateway shut down");
        Ok(closed)
    }

    async fn load_server(&self, server_id: ServerId) -> GatewayResult<McpServer> {
        self.registry
            .get_server(server_id)
            .await?
            .ok_or(GatewayError::ServerNotFound(server_id))
    }

    async fn persist_best_effort(&self, server: McpServer) {
        let server_id = server.id();
        if let Err(err) = self.registry.update_server(server).await {
            warn!(%server_id, %err, "server status not persisted");
        }
    }

    async fn authorize_manage(
        &self,
        user: Option<&UserId>,
        server: &McpServer,
        operation: &str,
    ) -> GatewayResult<()> {
        if self.security.can_manage_server(user, server).await {
            return Ok(());
        }
        Err(self
            .deny(user, operation, json!({ "server_id": server.id() }))
            .await)
    }

    async fn authorize_access(
        &self,
        user: Option<&UserId>,
        server: &McpServer,
        operation: &str,
    ) -> GatewayResult<()> {
        if self.security.can_access_server(user, server).await {
            return Ok(());
        }
        Err(self
            .deny(user, operation, json!({ "server_id": server.id() }))
            .await)
    }

    async fn deny(&self, user: Option<&UserId>, operation: &str, target: Value) -> GatewayError {
        warn!(user = user.map(UserId::as_str), operation, "permission denied");
        self.emit(
            AuditEventType::PermissionDenied,
            user,
            json!({ "operation": operation, "target": target }),
            Severity::Warning,
        )
        .await;
        GatewayError::PermissionDenied(format!("{operation} is not permitted"))
    }

    async fn emit(
        &self,
        event_type: AuditEventType,
        user: Option<&UserId>,
        details: Value,
        severity: Severity,
    ) {
        let event = AuditEvent::new(event_type, user.cloned(), details, severity, self.clock.utc());
        if let Err(err) = self.audit.log(&event).await {
            warn!(event = event_type.as_str(), %err, "audit event not recorded");
        }
    }
}

/// Hashes the sorted tool names and input schemas of a catalog.
fn catalog_fingerprint(tools: &[Tool]) -> String {
    let mut entries: Vec<(&str, String)> = tools
        .iter()
        .map(|tool| (tool.name(), tool.input_schema().to_string()))
        .collect();
    entries.sort();

    let mut hasher = Sha256::new();
    for (name, schema) in entries {
        hasher.update(name.as_bytes());
        hasher.update([0]);
        hasher.update(schema.as_bytes());
        hasher.update([0]);
    }
    format!("{:x}", hasher.finalize())
}
