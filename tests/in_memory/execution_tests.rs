//! Execution, batching and metrics through the public gateway API.

use super::helpers::{GatewayContext, echo_client};
use rstest::rstest;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use toolgate::{
    connection_pool::domain::{ExecutionOptions, FailureKind},
    gateway::domain::{AuditEventType, GatewayError, ToolCallRequest},
    tool_registry::domain::ServerId,
    transport::{
        adapters::memory::{InMemoryTransportClient, InMemoryTransportConnector},
        domain::ToolDescriptor,
    },
};

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn unknown_server_is_not_found_without_transport_traffic(
    echo_client: Arc<InMemoryTransportClient>,
) {
    let context = GatewayContext::new(
        InMemoryTransportConnector::new().with_client("echo", Arc::clone(&echo_client)),
    );
    let missing = ServerId::new();

    let result = context
        .gateway
        .execute_tool(
            missing,
            "echo_tool",
            json!({}),
            None,
            ExecutionOptions::default(),
        )
        .await;

    assert!(matches!(result, Err(GatewayError::ServerNotFound(id)) if id == missing));
    assert_eq!(context.connector.connect_count(), 0);
    assert!(echo_client.calls().is_empty());
}

#[rstest]
#[tokio::test(start_paused = true)]
async fn silent_tool_yields_a_timeout_result() {
    let client = Arc::new(
        InMemoryTransportClient::new()
            .with_tool(
                ToolDescriptor::new("stall", "Never answers in time")
                    .with_metadata(json!({ "timeout_seconds": 1 })),
            )
            .with_tool_delay("stall", Duration::from_secs(120)),
    );
    let context = GatewayContext::new(InMemoryTransportConnector::new().with_client("slow", client));
    let server_id = context.running_server("slow").await;

    let result = context
        .gateway
        .execute_tool(server_id, "stall", json!({}), None, ExecutionOptions::default())
        .await
        .expect("timeouts are reported as results");

    assert!(!result.success);
    assert_eq!(result.error_kind, Some(FailureKind::Timeout));
    assert!(
        result
            .error
            .as_deref()
            .is_some_and(|error| error.contains("timed out"))
    );
    assert!((1_000..1_100).contains(&result.duration_ms));
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn batch_results_follow_request_order(echo_client: Arc<InMemoryTransportClient>) {
    let context =
        GatewayContext::new(InMemoryTransportConnector::new().with_client("echo", echo_client));
    let server_id = context.running_server("echo").await;

    let results = context
        .gateway
        .batch_execute_tools(
            vec![
                ToolCallRequest::new(server_id, "echo_tool", json!({ "n": 1 })),
                ToolCallRequest::new(server_id, "no_such_tool", json!({ "n": 2 })),
                ToolCallRequest::new(server_id, "echo_tool", json!({ "n": 3 })),
            ],
            None,
        )
        .await;

    let successes: Vec<bool> = results.iter().map(|result| result.success).collect();
    assert_eq!(successes, vec![true, false, true]);
    let rejected = results.get(1).expect("second result");
    assert_eq!(rejected.error_kind, Some(FailureKind::NotFound));
    assert!(
        rejected
            .error
            .as_deref()
            .is_some_and(|error| error.contains("no_such_tool"))
    );
    let executed = context
        .audit
        .events()
        .iter()
        .filter(|event| event.event_type == AuditEventType::ToolExecuted)
        .count();
    assert_eq!(executed, 2);
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn average_duration_is_a_running_mean(echo_client: Arc<InMemoryTransportClient>) {
    let context =
        GatewayContext::new(InMemoryTransportConnector::new().with_client("echo", echo_client));
    let server_id = context.running_server("echo").await;

    let mut averages = Vec::new();
    for duration_ms in [100, 200, 300] {
        let metrics = context
            .gateway
            .registry()
            .update_tool_metrics(server_id, "echo_tool", duration_ms, true)
            .await
            .expect("metrics update should succeed");
        averages.push(metrics.average_duration_ms);
    }

    assert_eq!(averages, vec![100.0, 150.0, 200.0]);
}
