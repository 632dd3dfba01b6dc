//! Registry service tests over the in-memory store.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use crate::tool_registry::{
    adapters::memory::InMemoryRegistryStore,
    domain::{
        McpServer, McpTransport, Resource, ServerFilter, ServerId, ServerName, ServerStatus, Tool,
        ToolFilter,
    },
    ports::{RegistryStore, RegistryStoreResult},
    services::{ToolRegistry, ToolRegistryError},
};
use async_trait::async_trait;
use mockable::{Clock, DefaultClock};
use rstest::{fixture, rstest};
use serde_json::json;

type TestRegistry = ToolRegistry<InMemoryRegistryStore, DefaultClock>;

#[fixture]
fn store() -> InMemoryRegistryStore {
    InMemoryRegistryStore::new()
}

fn registry_over(store: &InMemoryRegistryStore) -> TestRegistry {
    ToolRegistry::new(Arc::new(store.clone()), Arc::new(DefaultClock))
}

fn server(name: &str) -> McpServer {
    McpServer::new(
        ServerName::new(name).expect("valid name"),
        McpTransport::stdio("echo").expect("valid transport"),
        &DefaultClock,
    )
}

fn tool(server_id: ServerId, name: &str, description: &str) -> Tool {
    Tool::new(
        server_id,
        name,
        description,
        json!({"type": "object"}),
        DefaultClock.utc(),
    )
    .expect("valid tool")
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn register_server_twice_overwrites(store: InMemoryRegistryStore) {
    let registry = registry_over(&store);
    let original = server("files");
    let server_id = original.id();
    registry
        .register_server(original.clone())
        .await
        .expect("first registration");

    let retagged = original.with_tags(vec!["local".to_owned()]);
    registry
        .register_server(retagged)
        .await
        .expect("second registration");

    let listed = registry
        .list_servers(&ServerFilter::default())
        .expect("listing");
    assert_eq!(listed.len(), 1);
    let stored = registry
        .get_server(server_id)
        .await
        .expect("lookup")
        .expect("server present");
    assert!(stored.tags().contains("local"));
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn update_server_requires_existing_record(store: InMemoryRegistryStore) {
    let registry = registry_over(&store);
    let unknown = server("ghost");
    let unknown_id = unknown.id();

    let result = registry.update_server(unknown).await;

    assert!(matches!(
        result,
        Err(ToolRegistryError::ServerNotFound(id)) if id == unknown_id
    ));
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn missing_lookups_return_none(store: InMemoryRegistryStore) {
    let registry = registry_over(&store);

    let missing_server = registry.get_server(ServerId::new()).await.expect("lookup");
    let missing_tool = registry
        .get_tool(ServerId::new(), "nothing")
        .await
        .expect("lookup");

    assert!(missing_server.is_none());
    assert!(missing_tool.is_none());
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn reregistering_tool_preserves_metrics(store: InMemoryRegistryStore) {
    let registry = registry_over(&store);
    let owner = server("files");
    let server_id = owner.id();
    registry.register_server(owner).await.expect("server");
    registry
        .register_tool(tool(server_id, "read", "Read a file"))
        .await
        .expect("tool");

    for success in [true, false, true] {
        registry
            .update_tool_metrics(server_id, "read", 10, success)
            .await
            .expect("metrics update");
    }
    let rediscovered = registry
        .register_tool(tool(server_id, "read", "Read a file, again"))
        .await
        .expect("re-registration");
    let after = registry
        .update_tool_metrics(server_id, "read", 40, true)
        .await
        .expect("metrics update");

    assert_eq!(rediscovered.metrics().execution_count, 3);
    assert_eq!(rediscovered.description(), "Read a file, again");
    assert_eq!(after.execution_count, 4);
    assert_eq!(after.success_count, 3);
    assert_eq!(after.average_duration_ms, 20.0);
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn metrics_updates_are_persisted(store: InMemoryRegistryStore) {
    let registry = registry_over(&store);
    let owner = server("files");
    let server_id = owner.id();
    registry.register_server(owner).await.expect("server");
    registry
        .register_tool(tool(server_id, "read", ""))
        .await
        .expect("tool");

    registry
        .update_tool_metrics(server_id, "read", 25, true)
        .await
        .expect("metrics update");

    let persisted = store
        .find_tool(server_id, "read")
        .await
        .expect("store lookup")
        .expect("tool persisted");
    assert_eq!(persisted.metrics().success_count, 1);
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn metrics_for_unknown_tool_is_not_found(store: InMemoryRegistryStore) {
    let registry = registry_over(&store);

    let result = registry
        .update_tool_metrics(ServerId::new(), "ghost", 1, true)
        .await;

    assert!(matches!(result, Err(ToolRegistryError::ToolNotFound { .. })));
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn register_tool_requires_known_server(store: InMemoryRegistryStore) {
    let registry = registry_over(&store);

    let result = registry
        .register_tool(tool(ServerId::new(), "orphan", ""))
        .await;

    assert!(matches!(result, Err(ToolRegistryError::ServerNotFound(_))));
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn search_is_case_insensitive_and_ordered(store: InMemoryRegistryStore) {
    let registry = registry_over(&store);
    let owner = server("files");
    let server_id = owner.id();
    registry.register_server(owner).await.expect("server");
    for (name, description) in [
        ("zeta_reader", "Reads FILES"),
        ("alpha_writer", "writes files"),
        ("net_fetch", "Downloads a URL"),
        ("file_stat", "Stat a path"),
    ] {
        registry
            .register_tool(tool(server_id, name, description))
            .await
            .expect("tool");
    }

    let all = registry.search_tools("FILE", 10).expect("search");
    let limited = registry.search_tools("file", 2).expect("search");

    let names: Vec<&str> = all.iter().map(Tool::name).collect();
    assert_eq!(names, vec!["zeta_reader", "alpha_writer", "file_stat"]);
    let limited_names: Vec<&str> = limited.iter().map(Tool::name).collect();
    assert_eq!(limited_names, vec!["zeta_reader", "alpha_writer"]);
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn list_tools_scopes_to_server(store: InMemoryRegistryStore) {
    let registry = registry_over(&store);
    let first = server("first");
    let second = server("second");
    let (first_id, second_id) = (first.id(), second.id());
    registry.register_server(first).await.expect("server");
    registry.register_server(second).await.expect("server");
    registry
        .register_tool(tool(first_id, "a", ""))
        .await
        .expect("tool");
    registry
        .register_tool(tool(second_id, "b", ""))
        .await
        .expect("tool");

    let scoped = registry
        .list_tools(Some(second_id), &ToolFilter::default())
        .expect("listing");
    let everything = registry
        .list_tools(None, &ToolFilter::default())
        .expect("listing");

    assert_eq!(scoped.len(), 1);
    assert_eq!(scoped.first().map(Tool::name), Some("b"));
    assert_eq!(everything.len(), 2);
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn delete_server_cascades(store: InMemoryRegistryStore) {
    let registry = registry_over(&store);
    let owner = server("files");
    let server_id = owner.id();
    registry.register_server(owner).await.expect("server");
    registry
        .register_tool(tool(server_id, "read", ""))
        .await
        .expect("tool");
    let resource = Resource::new(server_id, "file:///readme", "readme", DefaultClock.utc())
        .expect("valid resource");
    registry
        .register_resource(resource)
        .await
        .expect("resource");

    registry.delete_server(server_id).await.expect("delete");

    assert!(registry.get_server(server_id).await.expect("lookup").is_none());
    assert!(
        registry
            .list_tools(Some(server_id), &ToolFilter::default())
            .expect("listing")
            .is_empty()
    );
    assert!(
        registry
            .list_resources(Some(server_id))
            .expect("listing")
            .is_empty()
    );
    assert!(store.load_tools().await.expect("load").is_empty());
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn delete_unknown_server_is_not_found(store: InMemoryRegistryStore) {
    let registry = registry_over(&store);

    let result = registry.delete_server(ServerId::new()).await;

    assert!(matches!(result, Err(ToolRegistryError::ServerNotFound(_))));
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn hydrate_restores_index_from_store(store: InMemoryRegistryStore) {
    let writer = registry_over(&store);
    let owner = server("files");
    let server_id = owner.id();
    writer.register_server(owner).await.expect("server");
    writer
        .register_tool(tool(server_id, "read", "Read"))
        .await
        .expect("tool");
    writer
        .update_tool_metrics(server_id, "read", 5, true)
        .await
        .expect("metrics");

    let reader = registry_over(&store);
    let summary = reader.hydrate().await.expect("hydrate");

    assert_eq!((summary.servers, summary.tools, summary.resources), (1, 1, 0));
    let listed = reader
        .list_servers(&ServerFilter::default().with_status(ServerStatus::Registered))
        .expect("listing");
    assert_eq!(listed.len(), 1);
    let restored = reader
        .get_tool(server_id, "read")
        .await
        .expect("lookup")
        .expect("tool present");
    assert_eq!(restored.metrics().execution_count, 1);
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn index_miss_falls_through_to_store(store: InMemoryRegistryStore) {
    let registry = registry_over(&store);
    let external = server("external");
    let server_id = external.id();
    store.upsert_server(&external).await.expect("direct write");

    let found = registry.get_server(server_id).await.expect("lookup");
    let listed = registry
        .list_servers(&ServerFilter::default())
        .expect("listing");

    assert_eq!(found.map(|found_server| found_server.id()), Some(server_id));
    assert_eq!(listed.len(), 1);
}

/// Store whose second tool write is acknowledged late, letting later writes
/// overtake it unless the registry orders them.
struct LaggingToolStore {
    inner: InMemoryRegistryStore,
    tool_writes: AtomicUsize,
}

#[async_trait]
impl RegistryStore for LaggingToolStore {
    async fn upsert_server(&self, server: &McpServer) -> RegistryStoreResult<()> {
        self.inner.upsert_server(server).await
    }

    async fn find_server(&self, server_id: ServerId) -> RegistryStoreResult<Option<McpServer>> {
        self.inner.find_server(server_id).await
    }

    async fn load_servers(&self) -> RegistryStoreResult<Vec<McpServer>> {
        self.inner.load_servers().await
    }

    async fn delete_server(&self, server_id: ServerId) -> RegistryStoreResult<()> {
        self.inner.delete_server(server_id).await
    }

    async fn upsert_tool(&self, tool: &Tool) -> RegistryStoreResult<()> {
        if self.tool_writes.fetch_add(1, Ordering::SeqCst) == 1 {
            tokio::time::sleep(Duration::from_millis(50)).await;
        }
        self.inner.upsert_tool(tool).await
    }

    async fn find_tool(
        &self,
        server_id: ServerId,
        name: &str,
    ) -> RegistryStoreResult<Option<Tool>> {
        self.inner.find_tool(server_id, name).await
    }

    async fn load_tools(&self) -> RegistryStoreResult<Vec<Tool>> {
        self.inner.load_tools().await
    }

    async fn upsert_resource(&self, resource: &Resource) -> RegistryStoreResult<()> {
        self.inner.upsert_resource(resource).await
    }

    async fn load_resources(&self) -> RegistryStoreResult<Vec<Resource>> {
        self.inner.load_resources().await
    }
}

#[rstest]
#[tokio::test(start_paused = true)]
async fn concurrent_metric_updates_persist_in_order(store: InMemoryRegistryStore) {
    let lagging = LaggingToolStore {
        inner: store.clone(),
        tool_writes: AtomicUsize::new(0),
    };
    let registry = ToolRegistry::new(Arc::new(lagging), Arc::new(DefaultClock));
    let owner = server("files");
    let server_id = owner.id();
    registry.register_server(owner).await.expect("server");
    registry
        .register_tool(tool(server_id, "read", "Reads"))
        .await
        .expect("tool");

    let (first, second) = tokio::join!(
        registry.update_tool_metrics(server_id, "read", 10, true),
        registry.update_tool_metrics(server_id, "read", 30, true),
    );
    first.expect("first update");
    second.expect("second update");

    let restarted = registry_over(&store);
    restarted.hydrate().await.expect("hydrate");
    let stored = restarted
        .get_tool(server_id, "read")
        .await
        .expect("lookup")
        .expect("tool persisted");
    assert_eq!(stored.metrics().execution_count, 2);
    assert_eq!(stored.metrics().average_duration_ms, 20.0);
}
