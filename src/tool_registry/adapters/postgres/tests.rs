//! Row conversion tests for the `PostgreSQL` registry store.

use super::models::McpServerRow;
use super::repository::{row_to_server, row_to_tool, server_to_row, tool_to_row};
use crate::tool_registry::{
    domain::{
        HealthReport, McpServer, McpTransport, ServerName, Tool, ToolCategory, UserId,
    },
    ports::RegistryStoreError,
};
use mockable::{Clock, DefaultClock};
use rstest::{fixture, rstest};
use serde_json::json;
use std::time::Duration;

#[fixture]
fn clock() -> DefaultClock {
    DefaultClock
}

#[fixture]
fn running_server(clock: DefaultClock) -> McpServer {
    let transport = McpTransport::stdio("python").expect("valid transport");
    let mut server = McpServer::new(
        ServerName::new("workspace_tools").expect("valid name"),
        transport,
        &clock,
    )
    .with_owner(Some(UserId::new("alice")))
    .with_tags(vec!["Files".to_owned(), "local".to_owned()])
    .with_timeout(Duration::from_secs(12))
    .expect("valid timeout");
    server.mark_starting(&clock).expect("start allowed");
    server.mark_running(&clock).expect("run allowed");
    server
        .apply_health(HealthReport::unhealthy("probe failed", clock.utc()), &clock)
        .expect("health accepted");
    server
}

#[rstest]
fn server_row_restores_every_field(running_server: McpServer) {
    let row = server_to_row(&running_server).expect("row conversion");

    assert_eq!(row.status, "unhealthy");
    assert_eq!(row.timeout_ms, 12_000);
    assert_eq!(row.tags, json!(["files", "local"]));

    let restored = row_to_server(row).expect("server restored");
    assert_eq!(restored, running_server);
}

#[rstest]
fn server_row_with_unknown_status_is_invalid(running_server: McpServer) {
    let row = McpServerRow {
        status: "paused".to_owned(),
        ..server_to_row(&running_server).expect("row conversion")
    };

    let result = row_to_server(row);

    assert!(matches!(
        result,
        Err(RegistryStoreError::InvalidPersistedData(_))
    ));
}

#[rstest]
fn tool_row_keeps_metrics_column_authoritative(clock: DefaultClock, running_server: McpServer) {
    let mut tool = Tool::new(
        running_server.id(),
        "read_file",
        "Read a file",
        json!({"type": "object"}),
        clock.utc(),
    )
    .expect("valid tool")
    .with_category(ToolCategory::Data);
    tool.record_execution(40, true, clock.utc());

    let mut row = tool_to_row(&tool).expect("row conversion");
    row.metrics["execution_count"] = json!(7);

    let restored = row_to_tool(row).expect("tool restored");
    assert_eq!(restored.metrics().execution_count, 7);
    assert_eq!(restored.category(), Some(ToolCategory::Data));
}
