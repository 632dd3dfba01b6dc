//! Shared wiring for in-memory gateway integration tests.

use mockable::DefaultClock;
use rstest::fixture;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use toolgate::{
    connection_pool::services::{ConnectionPool, PoolSettings},
    gateway::{
        adapters::{DefaultSecurityPolicy, InMemoryAuditSink},
        domain::ServerDefinition,
        services::{Gateway, GatewaySettings},
    },
    resilience::domain::CircuitBreakerConfig,
    tool_registry::{
        adapters::memory::InMemoryRegistryStore, domain::ServerId, services::ToolRegistry,
    },
    transport::{
        adapters::memory::{InMemoryTransportClient, InMemoryTransportConnector},
        domain::ToolDescriptor,
    },
};

/// Gateway type used throughout the in-memory suite.
pub type TestGateway = Gateway<InMemoryRegistryStore, DefaultClock>;

/// A gateway together with the fakes it talks to.
pub struct GatewayContext {
    /// Gateway under test.
    pub gateway: Arc<TestGateway>,
    /// Connector handing out scripted clients.
    pub connector: Arc<InMemoryTransportConnector>,
    /// Audit events emitted by the gateway.
    pub audit: Arc<InMemoryAuditSink>,
}

impl GatewayContext {
    /// Builds a permissive gateway over `connector`.
    pub fn new(connector: InMemoryTransportConnector) -> Self {
        let clock = Arc::new(DefaultClock);
        let connector = Arc::new(connector);
        let audit = Arc::new(InMemoryAuditSink::new());
        let registry = Arc::new(ToolRegistry::new(
            Arc::new(InMemoryRegistryStore::new()),
            Arc::clone(&clock),
        ));
        let pool = Arc::new(ConnectionPool::new(
            Arc::clone(&connector) as _,
            Arc::clone(&clock),
            PoolSettings::default(),
        ));
        let gateway = Gateway::new(
            registry,
            pool,
            Arc::new(DefaultSecurityPolicy::permissive()),
            Arc::clone(&audit) as _,
            clock,
            GatewaySettings {
                circuit_breaker: CircuitBreakerConfig::new(3, Duration::from_secs(30)),
                health_interval: Duration::from_secs(5),
                max_batch_concurrency: 4,
            },
        );
        Self {
            gateway: Arc::new(gateway),
            connector,
            audit,
        }
    }

    /// Registers, starts and discovers a stdio server.
    pub async fn running_server(&self, name: &str) -> ServerId {
        let server_id = self
            .gateway
            .register_server(&ServerDefinition::stdio(name, "echo"), None)
            .await
            .expect("registration should succeed");
        self.gateway
            .start_server(server_id, None)
            .await
            .expect("start should succeed");
        self.gateway
            .discover_tools(server_id, None)
            .await
            .expect("discovery should succeed");
        server_id
    }
}

/// A scripted server exposing one `echo_tool`.
#[fixture]
pub fn echo_client() -> Arc<InMemoryTransportClient> {
    Arc::new(
        InMemoryTransportClient::new()
            .with_tool(ToolDescriptor::new("echo_tool", "Echoes its arguments"))
            .with_tool_result("echo_tool", json!({ "content": [{ "type": "text", "text": "ok" }] })),
    )
}
