//! Scripted in-memory MCP client and connector for tests.

use crate::{
    tool_registry::domain::McpServer,
    transport::{
        domain::{
            InitializeResult, MCP_PROTOCOL_VERSION, PeerInfo, ResourceDescriptor, ToolDescriptor,
            TransportError, TransportResult,
        },
        ports::{TransportClient, TransportConnector},
    },
};
use async_trait::async_trait;
use serde_json::{Value, json};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

#[derive(Debug, Clone)]
struct ToolScript {
    delay: Duration,
    outcome: TransportResult<Value>,
}

/// A recorded `tools/call`.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordedCall {
    /// Tool name.
    pub name: String,
    /// Arguments as sent.
    pub arguments: Value,
}

/// In-memory [`TransportClient`] with scripted catalog and tool behaviour.
///
/// Unscripted tools echo their arguments back.
#[derive(Debug)]
pub struct InMemoryTransportClient {
    tools: Vec<ToolDescriptor>,
    resources: Vec<ResourceDescriptor>,
    contents: HashMap<String, Value>,
    scripts: HashMap<String, ToolScript>,
    initialize_failure: Option<TransportError>,
    initialize_delay: Duration,
    list_delay: Duration,
    probe_failure: Mutex<Option<TransportError>>,
    initialized: AtomicBool,
    alive: AtomicBool,
    calls: Mutex<Vec<RecordedCall>>,
    close_count: AtomicUsize,
}

impl Default for InMemoryTransportClient {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryTransportClient {
    /// Creates a client with an empty catalog.
    #[must_use]
    pub fn new() -> Self {
        Self {
            tools: Vec::new(),
            resources: Vec::new(),
            contents: HashMap::new(),
            scripts: HashMap::new(),
            initialize_failure: None,
            initialize_delay: Duration::ZERO,
            list_delay: Duration::ZERO,
            probe_failure: Mutex::new(None),
            initialized: AtomicBool::new(false),
            alive: AtomicBool::new(true),
            calls: Mutex::new(Vec::new()),
            close_count: AtomicUsize::new(0),
        }
    }

    /// Adds a tool to the advertised catalog.
    #[must_use]
    pub fn with_tool(mut self, descriptor: ToolDescriptor) -> Self {
        self.tools.push(descriptor);
        self
    }

    /// Adds a resource with the content returned by `resources/read`.
    #[must_use]
    pub fn with_resource(mut self, descriptor: ResourceDescriptor, content: Value) -> Self {
        self.contents.insert(descriptor.uri.clone(), content);
        self.resources.push(descriptor);
        self
    }

    /// Makes `name` answer with `result`.
    #[must_use]
    pub fn with_tool_result(mut self, name: impl Into<String>, result: Value) -> Self {
        self.script(name.into()).outcome = Ok(result);
        self
    }

    /// Makes `name` fail with `error`.
    #[must_use]
    pub fn with_tool_error(mut self, name: impl Into<String>, error: TransportError) -> Self {
        self.script(name.into()).outcome = Err(error);
        self
    }

    /// Delays every answer from `name`.
    #[must_use]
    pub fn with_tool_delay(mut self, name: impl Into<String>, delay: Duration) -> Self {
        self.script(name.into()).delay = delay;
        self
    }

    /// Makes the handshake fail.
    #[must_use]
    pub fn with_initialize_failure(mut self, error: TransportError) -> Self {
        self.initialize_failure = Some(error);
        self
    }

    /// Delays the handshake answer.
    #[must_use]
    pub const fn with_initialize_delay(mut self, delay: Duration) -> Self {
        self.initialize_delay = delay;
        self
    }

    /// Delays catalog listings.
    #[must_use]
    pub const fn with_list_delay(mut self, delay: Duration) -> Self {
        self.list_delay = delay;
        self
    }

    /// Makes `tools/list` fail until cleared with `None`.
    pub fn set_probe_failure(&self, error: Option<TransportError>) {
        if let Ok(mut slot) = self.probe_failure.lock() {
            *slot = error;
        }
    }

    /// Simulates the peer process dying.
    pub fn kill(&self) {
        self.alive.store(false, Ordering::Release);
    }

    /// Returns every recorded tool call in arrival order.
    #[must_use]
    pub fn calls(&self) -> Vec<RecordedCall> {
        self.calls
            .lock()
            .map(|calls| calls.clone())
            .unwrap_or_default()
    }

    /// Returns how many times `close` was called.
    #[must_use]
    pub fn close_count(&self) -> usize {
        self.close_count.load(Ordering::Acquire)
    }

    fn script(&mut self, name: String) -> &mut ToolScript {
        let echo = json!({ "tool": &name });
        self.scripts.entry(name).or_insert(ToolScript {
            delay: Duration::ZERO,
            outcome: Ok(echo),
        })
    }

    fn revive(&self) {
        self.alive.store(true, Ordering::Release);
        self.initialized.store(false, Ordering::Release);
    }

    fn ensure_ready(&self, operation: &str) -> TransportResult<()> {
        if !self.alive.load(Ordering::Acquire) {
            return Err(TransportError::Closed);
        }
        if !self.initialized.load(Ordering::Acquire) {
            return Err(TransportError::Protocol(format!(
                "{operation} called before initialize"
            )));
        }
        Ok(())
    }

    async fn pause(delay: Duration) {
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
    }
}

#[async_trait]
impl TransportClient for InMemoryTransportClient {
    async fn initialize(&self) -> TransportResult<InitializeResult> {
        Self::pause(self.initialize_delay).await;
        if let Some(error) = &self.initialize_failure {
            return Err(error.clone());
        }
        self.initialized.store(true, Ordering::Release);
        Ok(InitializeResult {
            protocol_version: MCP_PROTOCOL_VERSION.to_owned(),
            capabilities: json!({ "tools": {} }),
            server_info: PeerInfo {
                name: "in-memory".to_owned(),
                version: env!("CARGO_PKG_VERSION").to_owned(),
            },
        })
    }

    async fn list_tools(&self) -> TransportResult<Vec<ToolDescriptor>> {
        self.ensure_ready("tools/list")?;
        Self::pause(self.list_delay).await;
        let failure = self.probe_failure.lock().ok().and_then(|slot| slot.clone());
        failure.map_or_else(|| Ok(self.tools.clone()), Err)
    }

    async fn list_resources(&self) -> TransportResult<Vec<ResourceDescriptor>> {
        self.ensure_ready("resources/list")?;
        Self::pause(self.list_delay).await;
        Ok(self.resources.clone())
    }

    async fn call_tool(&self, name: &str, arguments: Value) -> TransportResult<Value> {
        self.ensure_ready("tools/call")?;
        if let Ok(mut calls) = self.calls.lock() {
            calls.push(RecordedCall {
                name: name.to_owned(),
                arguments: arguments.clone(),
            });
        }

        let Some(script) = self.scripts.get(name) else {
            return Ok(json!({ "tool": name, "arguments": arguments }));
        };
        Self::pause(script.delay).await;
        script.outcome.clone()
    }

    async fn read_resource(&self, uri: &str) -> TransportResult<Value> {
        self.ensure_ready("resources/read")?;
        self.contents.get(uri).cloned().ok_or_else(|| TransportError::Remote {
            code: -32002,
            message: format!("resource not found: {uri}"),
        })
    }

    async fn close(&self) -> TransportResult<()> {
        self.close_count.fetch_add(1, Ordering::AcqRel);
        self.initialized.store(false, Ordering::Release);
        self.alive.store(false, Ordering::Release);
        Ok(())
    }

    fn is_alive(&self) -> bool {
        self.alive.load(Ordering::Acquire)
    }
}

/// Connector handing out [`InMemoryTransportClient`]s keyed by server name.
///
/// Servers without a scripted client get a fresh echo client.
#[derive(Debug, Default)]
pub struct InMemoryTransportConnector {
    clients: HashMap<String, Arc<InMemoryTransportClient>>,
    failures: HashMap<String, TransportError>,
    connects: AtomicUsize,
}

impl InMemoryTransportConnector {
    /// Creates a connector with no scripted clients.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Serves `client` for the server named `server_name`.
    #[must_use]
    pub fn with_client(
        mut self,
        server_name: impl Into<String>,
        client: Arc<InMemoryTransportClient>,
    ) -> Self {
        self.clients.insert(server_name.into(), client);
        self
    }

    /// Fails every connection attempt for `server_name`.
    #[must_use]
    pub fn with_connect_failure(
        mut self,
        server_name: impl Into<String>,
        error: TransportError,
    ) -> Self {
        self.failures.insert(server_name.into(), error);
        self
    }

    /// Returns how many connections were attempted.
    #[must_use]
    pub fn connect_count(&self) -> usize {
        self.connects.load(Ordering::Acquire)
    }
}

#[async_trait]
impl TransportConnector for InMemoryTransportConnector {
    async fn connect(&self, server: &McpServer) -> TransportResult<Arc<dyn TransportClient>> {
        self.connects.fetch_add(1, Ordering::AcqRel);
        let name = server.name().as_str();
        if let Some(error) = self.failures.get(name) {
            return Err(error.clone());
        }

        let client = self.clients.get(name).map_or_else(
            || Arc::new(InMemoryTransportClient::new()),
            |scripted| {
                scripted.revive();
                Arc::clone(scripted)
            },
        );
        Ok(client)
    }
}
