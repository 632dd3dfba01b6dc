//! Discovery and catalogue upsert through the public gateway API.

use super::helpers::{GatewayContext, echo_client};
use rstest::rstest;
use serde_json::json;
use std::sync::Arc;
use toolgate::{
    connection_pool::domain::ExecutionOptions,
    tool_registry::domain::{ServerStatus, ToolFilter},
    transport::adapters::memory::{InMemoryTransportClient, InMemoryTransportConnector},
};

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn echo_server_discovers_one_fresh_tool(echo_client: Arc<InMemoryTransportClient>) {
    let context =
        GatewayContext::new(InMemoryTransportConnector::new().with_client("echo", echo_client));

    let server_id = context.running_server("echo").await;
    let tools = context
        .gateway
        .list_tools(Some(server_id), &ToolFilter::default(), None)
        .await
        .expect("listing should succeed");

    assert_eq!(tools.len(), 1);
    let tool = tools.first().expect("one tool");
    assert_eq!(tool.name(), "echo_tool");
    assert_eq!(tool.server_id(), server_id);
    assert_eq!(tool.metrics().execution_count, 0);

    let status = context
        .gateway
        .get_server_status(server_id, None)
        .await
        .expect("status should load");
    assert_eq!(status.status, ServerStatus::Running);
    assert_eq!(status.tool_count, 1);
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn rediscovery_keeps_execution_counts_growing(echo_client: Arc<InMemoryTransportClient>) {
    let context =
        GatewayContext::new(InMemoryTransportConnector::new().with_client("echo", echo_client));
    let server_id = context.running_server("echo").await;

    let mut observed = Vec::new();
    for _ in 0..3 {
        context
            .gateway
            .execute_tool(
                server_id,
                "echo_tool",
                json!({ "text": "hi" }),
                None,
                ExecutionOptions::default(),
            )
            .await
            .expect("execution should be accepted");
        context
            .gateway
            .discover_tools(server_id, None)
            .await
            .expect("rediscovery should succeed");
        let tool = context
            .gateway
            .registry()
            .get_tool(server_id, "echo_tool")
            .await
            .expect("lookup should succeed")
            .expect("tool should remain registered");
        observed.push(tool.metrics().execution_count);
    }

    assert_eq!(observed, vec![1, 2, 3]);
}
