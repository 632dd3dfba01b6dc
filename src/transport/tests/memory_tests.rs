//! In-memory client and connector tests.

use crate::{
    tool_registry::domain::{McpServer, McpTransport, ServerName},
    transport::{
        adapters::memory::{InMemoryTransportClient, InMemoryTransportConnector},
        domain::{ToolDescriptor, TransportError},
        ports::{TransportClient, TransportConnector},
    },
};
use mockable::DefaultClock;
use rstest::rstest;
use serde_json::json;
use std::sync::Arc;

fn server(name: &str) -> McpServer {
    McpServer::new(
        ServerName::new(name).expect("valid name"),
        McpTransport::stdio("echo").expect("valid transport"),
        &DefaultClock,
    )
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn connector_serves_scripted_client_by_name() {
    let scripted = Arc::new(
        InMemoryTransportClient::new().with_tool(ToolDescriptor::new("echo_tool", "Echoes")),
    );
    let connector = InMemoryTransportConnector::new().with_client("files", Arc::clone(&scripted));

    let client = connector.connect(&server("files")).await.expect("connect");
    client.initialize().await.expect("handshake");
    let tools = client.list_tools().await.expect("listing");

    assert_eq!(tools.len(), 1);
    assert_eq!(connector.connect_count(), 1);
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn connector_reports_scripted_failures() {
    let connector = InMemoryTransportConnector::new()
        .with_connect_failure("broken", TransportError::Connection("refused".to_owned()));

    let result = connector.connect(&server("broken")).await;

    assert!(matches!(result, Err(TransportError::Connection(_))));
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn unscripted_tools_echo_arguments() {
    let client = InMemoryTransportClient::new();
    client.initialize().await.expect("handshake");

    let result = client
        .call_tool("anything", json!({"x": 1}))
        .await
        .expect("call");

    assert_eq!(result, json!({"tool": "anything", "arguments": {"x": 1}}));
    assert_eq!(client.calls().len(), 1);
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn killed_client_is_not_alive_and_rejects_calls() {
    let client = InMemoryTransportClient::new();
    client.initialize().await.expect("handshake");

    client.kill();

    assert!(!client.is_alive());
    assert_eq!(
        client.call_tool("anything", json!({})).await,
        Err(TransportError::Closed)
    );
}
