//! Gateway orchestration tests over in-memory collaborators.

use super::harness::{Harness, HarnessBuilder, catalog_client};
use crate::{
    connection_pool::domain::{ExecutionOptions, ExecutionOutcome, FailureKind},
    gateway::{
        adapters::{DefaultSecurityPolicy, SecuritySettings},
        domain::{AuditEventType, GatewayError, ServerDefinition, ToolCallRequest},
        ports::{AuditSinkError, MockAuditSink, MockSecurityPolicy},
    },
    resilience::{domain::CircuitState, ports::MockToolExecutor},
    tool_registry::domain::{
        McpServer, ServerFilter, ServerId, ServerStatus, ToolFilter, UserId,
    },
    transport::{
        adapters::memory::{InMemoryTransportClient, InMemoryTransportConnector},
        domain::{ResourceDescriptor, ToolDescriptor, TransportError},
    },
};
use rstest::rstest;
use serde_json::json;
use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;

fn connector_with(client: &Arc<InMemoryTransportClient>) -> InMemoryTransportConnector {
    InMemoryTransportConnector::new().with_client("files", Arc::clone(client))
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn discovery_registers_catalog_for_started_server() {
    let client = Arc::new(
        InMemoryTransportClient::new().with_tool(ToolDescriptor::new("echo_tool", "Echoes")),
    );
    let harness = Harness::new(connector_with(&client));
    let server_id = harness
        .gateway
        .register_server(&ServerDefinition::stdio("files", "echo"), None)
        .await
        .expect("registered");

    let started = harness
        .gateway
        .start_server(server_id, None)
        .await
        .expect("started");
    let tools = harness
        .gateway
        .discover_tools(server_id, None)
        .await
        .expect("discovered");

    assert!(started.success);
    assert_eq!(started.status, ServerStatus::Running);
    assert_eq!(started.tools_available, 1);
    assert_eq!(tools.len(), 1);
    let tool = tools.first().expect("one tool");
    assert_eq!(tool.server_id(), server_id);
    assert_eq!(tool.name(), "echo_tool");
    assert_eq!(tool.metrics().execution_count, 0);

    let status = harness
        .gateway
        .get_server_status(server_id, None)
        .await
        .expect("status");
    assert_eq!(status.tool_count, 1);
    assert!(status.connected);
    assert!(status.last_discovery.is_some());
    assert_eq!(
        harness.events(),
        vec![
            AuditEventType::ServerRegistered,
            AuditEventType::ServerStarted,
            AuditEventType::ToolsDiscovered,
        ]
    );
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn identical_catalogs_share_a_fingerprint() {
    let harness = Harness::new(connector_with(&catalog_client()));
    let server_id = harness.running_server("files").await;
    let first = harness
        .gateway
        .registry()
        .get_server(server_id)
        .await
        .expect("lookup")
        .expect("server")
        .catalog_fingerprint()
        .map(str::to_owned);

    harness
        .gateway
        .discover_tools(server_id, None)
        .await
        .expect("rediscovered");
    let second = harness
        .gateway
        .registry()
        .get_server(server_id)
        .await
        .expect("lookup")
        .expect("server");

    assert!(first.as_deref().is_some_and(|hash| hash.len() == 64));
    assert_eq!(second.catalog_fingerprint(), first.as_deref());
    assert_eq!(second.tool_count(), 2);
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn invalid_definition_is_rejected_and_audited() {
    let harness = Harness::new(InMemoryTransportConnector::new());
    let definition = ServerDefinition {
        command: None,
        ..ServerDefinition::stdio("files", "echo")
    };

    let result = harness.gateway.register_server(&definition, None).await;

    assert!(matches!(result, Err(GatewayError::Validation(message)) if message.contains("'command'")));
    assert_eq!(harness.events(), vec![AuditEventType::ValidationFailed]);
    assert!(
        harness
            .gateway
            .list_servers(None, &ServerFilter::default())
            .await
            .expect("listing")
            .is_empty()
    );
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn auto_start_connects_during_registration() {
    let harness = Harness::new(connector_with(&catalog_client()));

    let server_id = harness
        .gateway
        .register_server(
            &ServerDefinition::stdio("files", "echo").with_auto_start(true),
            None,
        )
        .await
        .expect("registered");

    let status = harness
        .gateway
        .get_server_status(server_id, None)
        .await
        .expect("status");
    assert_eq!(status.status, ServerStatus::Running);
    assert_eq!(harness.connector.connect_count(), 1);
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn failed_start_records_error_status() {
    let connector = InMemoryTransportConnector::new()
        .with_connect_failure("files", TransportError::Connection("refused".to_owned()));
    let harness = Harness::new(connector);
    let server_id = harness
        .gateway
        .register_server(&ServerDefinition::stdio("files", "echo"), None)
        .await
        .expect("registered");

    let result = harness.gateway.start_server(server_id, None).await;

    assert!(matches!(result, Err(GatewayError::Connection(_))));
    let status = harness
        .gateway
        .get_server_status(server_id, None)
        .await
        .expect("status");
    assert_eq!(status.status, ServerStatus::Failed);
    assert!(status.error_message.is_some_and(|message| message.contains("refused")));
    assert!(!status.connected);
    assert!(harness.events().contains(&AuditEventType::ServerStartFailed));
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn failed_initial_discovery_fails_the_start() {
    let client = catalog_client();
    client.set_probe_failure(Some(TransportError::Protocol("garbled".to_owned())));
    let harness = Harness::new(connector_with(&client));
    let server_id = harness
        .gateway
        .register_server(&ServerDefinition::stdio("files", "echo"), None)
        .await
        .expect("registered");

    let result = harness.gateway.start_server(server_id, None).await;

    assert!(matches!(result, Err(GatewayError::Runtime(ref message)) if message.contains("garbled")));
    let status = harness
        .gateway
        .get_server_status(server_id, None)
        .await
        .expect("status");
    assert_eq!(status.status, ServerStatus::Failed);
    assert!(
        status
            .error_message
            .is_some_and(|message| message.contains("initial tool discovery"))
    );
    assert!(!status.connected);
    assert_eq!(client.close_count(), 1);
    assert!(!harness.events().contains(&AuditEventType::ServerStarted));

    client.set_probe_failure(None);
    let retried = harness
        .gateway
        .start_server(server_id, None)
        .await
        .expect("restart after the listing recovers");
    assert_eq!(retried.status, ServerStatus::Running);
}

#[rstest]
#[case::handshake(InMemoryTransportClient::new().with_initialize_delay(Duration::from_secs(86_400)))]
#[case::listing(
    InMemoryTransportClient::new()
        .with_tool(ToolDescriptor::new("echo_tool", "Echoes"))
        .with_list_delay(Duration::from_secs(86_400))
)]
#[tokio::test(start_paused = true)]
async fn silent_server_start_times_out(#[case] scripted: InMemoryTransportClient) {
    let client = Arc::new(scripted);
    let harness = Harness::new(connector_with(&client));
    let definition = ServerDefinition::stdio("files", "echo").with_timeout_seconds(5);
    let server_id = harness
        .gateway
        .register_server(&definition, None)
        .await
        .expect("registered");

    let first = tokio::time::timeout(
        Duration::from_secs(3_600),
        harness.gateway.start_server(server_id, None),
    )
    .await
    .expect("start should give up before the outer deadline");

    assert!(matches!(first, Err(GatewayError::Timeout(_))));
    let status = harness
        .gateway
        .get_server_status(server_id, None)
        .await
        .expect("status");
    assert_eq!(status.status, ServerStatus::Failed);
    assert!(!status.connected);
    assert_eq!(client.close_count(), 1);

    let second = harness.gateway.start_server(server_id, None).await;
    assert!(matches!(second, Err(GatewayError::Timeout(_))));
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn unknown_server_fails_without_contacting_transport() {
    let client = catalog_client();
    let harness = Harness::new(connector_with(&client));

    let result = harness
        .gateway
        .execute_tool(
            ServerId::new(),
            "echo_tool",
            json!({}),
            None,
            ExecutionOptions::default(),
        )
        .await;

    assert!(matches!(result, Err(GatewayError::ServerNotFound(_))));
    assert_eq!(harness.connector.connect_count(), 0);
    assert!(client.calls().is_empty());
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn unknown_tool_is_not_found() {
    let harness = Harness::new(connector_with(&catalog_client()));
    let server_id = harness.running_server("files").await;

    let result = harness
        .gateway
        .execute_tool(server_id, "missing", json!({}), None, ExecutionOptions::default())
        .await;

    assert!(matches!(
        result,
        Err(GatewayError::ToolNotFound { tool, .. }) if tool == "missing"
    ));
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn successful_execution_updates_metrics_and_audits() {
    let client = catalog_client();
    let harness = Harness::new(connector_with(&client));
    let server_id = harness.running_server("files").await;

    let result = harness
        .gateway
        .execute_tool(
            server_id,
            "echo_tool",
            json!({"text": "hi"}),
            None,
            ExecutionOptions::default(),
        )
        .await
        .expect("executed");

    assert!(result.success);
    assert_eq!(
        result.result,
        Some(json!({"tool": "echo_tool", "arguments": {"text": "hi"}}))
    );
    assert_eq!(client.calls().len(), 1);
    let metrics = harness.tool(server_id, "echo_tool").await.metrics().clone();
    assert_eq!(metrics.execution_count, 1);
    assert_eq!(metrics.success_count, 1);
    let executed = harness
        .audit
        .events()
        .into_iter()
        .find(|event| event.event_type == AuditEventType::ToolExecuted)
        .expect("execution audited");
    assert_eq!(
        executed.details.get("execution_id"),
        Some(&json!(result.execution_id))
    );
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn tool_failures_are_results_not_errors() {
    let client = Arc::new(
        InMemoryTransportClient::new()
            .with_tool(ToolDescriptor::new("broken", "Always fails"))
            .with_tool_error("broken", TransportError::ToolFailed("disk full".to_owned())),
    );
    let harness = Harness::new(connector_with(&client));
    let server_id = harness.running_server("files").await;

    let result = harness
        .gateway
        .execute_tool(server_id, "broken", json!({}), None, ExecutionOptions::default())
        .await
        .expect("dispatched");

    assert!(!result.success);
    assert_eq!(result.error_kind, Some(FailureKind::Tool));
    assert!(result.error.is_some_and(|message| message.contains("disk full")));
    let metrics = harness.tool(server_id, "broken").await.metrics().clone();
    assert_eq!(metrics.failure_count, 1);
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn missing_required_parameters_never_reach_transport() {
    let client = catalog_client();
    let harness = Harness::new(connector_with(&client));
    let server_id = harness.running_server("files").await;

    let result = harness
        .gateway
        .execute_tool(
            server_id,
            "read_file",
            json!({"path": null}),
            None,
            ExecutionOptions::default(),
        )
        .await;

    assert!(matches!(result, Err(GatewayError::Validation(message)) if message.contains("path")));
    assert!(client.calls().is_empty());
    assert!(harness.events().contains(&AuditEventType::ValidationFailed));
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn blocked_parameters_are_rejected() {
    let client = catalog_client();
    let harness = Harness::new(connector_with(&client));
    let server_id = harness.running_server("files").await;

    let result = harness
        .gateway
        .execute_tool(
            server_id,
            "read_file",
            json!({"path": "../../etc/passwd"}),
            None,
            ExecutionOptions::default(),
        )
        .await;

    assert!(matches!(result, Err(GatewayError::Validation(_))));
    assert!(client.calls().is_empty());
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn running_mean_follows_recorded_durations() {
    let mut durations = vec![300_u64, 200, 100];
    let mut executor = MockToolExecutor::new();
    executor.expect_execute().times(3).returning(move |_, _, _, _| {
        ExecutionOutcome::success(json!({}), durations.pop().unwrap_or_default())
    });
    let harness = HarnessBuilder::new(connector_with(&catalog_client()))
        .executor(Arc::new(executor))
        .build();
    let server_id = harness.running_server("files").await;

    let mut averages = Vec::new();
    for _ in 0..3 {
        harness
            .gateway
            .execute_tool(server_id, "echo_tool", json!({}), None, ExecutionOptions::default())
            .await
            .expect("executed");
        averages.push(
            harness
                .tool(server_id, "echo_tool")
                .await
                .metrics()
                .average_duration_ms,
        );
    }

    assert_eq!(averages, vec![100.0, 150.0, 200.0]);
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn tool_breaker_opens_after_repeated_faults() {
    let mut executor = MockToolExecutor::new();
    executor
        .expect_execute()
        .times(3)
        .returning(|_, _, _, _| ExecutionOutcome::failure(FailureKind::Timeout, "slow", 10));
    let harness = HarnessBuilder::new(connector_with(&catalog_client()))
        .executor(Arc::new(executor))
        .build();
    let server_id = harness.running_server("files").await;

    let mut kinds = Vec::new();
    for _ in 0..4 {
        let result = harness
            .gateway
            .execute_tool(server_id, "echo_tool", json!({}), None, ExecutionOptions::default())
            .await
            .expect("dispatched");
        kinds.push(result.error_kind);
    }

    assert_eq!(
        kinds,
        vec![
            Some(FailureKind::Timeout),
            Some(FailureKind::Timeout),
            Some(FailureKind::Timeout),
            Some(FailureKind::CircuitOpen),
        ]
    );
    assert_eq!(
        harness.gateway.circuit_state(server_id, "echo_tool"),
        Some(CircuitState::Open)
    );
    assert_eq!(
        harness.tool(server_id, "echo_tool").await.metrics().failure_count,
        3
    );
    let status = harness
        .gateway
        .get_server_status(server_id, None)
        .await
        .expect("status");
    assert_eq!(
        status.circuits,
        vec![("echo_tool".to_owned(), CircuitState::Open)]
    );
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn batch_results_follow_request_order() {
    let harness = Harness::new(connector_with(&catalog_client()));
    let server_id = harness.running_server("files").await;
    let requests = vec![
        ToolCallRequest::new(server_id, "echo_tool", json!({"n": 0})),
        ToolCallRequest::new(server_id, "no_such_tool", json!({"n": 1})),
        ToolCallRequest::new(server_id, "echo_tool", json!({"n": 2})),
    ];

    let results = harness.gateway.batch_execute_tools(requests, None).await;

    assert_eq!(results.len(), 3);
    let outcomes: Vec<(bool, Option<FailureKind>)> = results
        .iter()
        .map(|result| (result.success, result.error_kind))
        .collect();
    assert_eq!(
        outcomes,
        vec![
            (true, None),
            (false, Some(FailureKind::NotFound)),
            (true, None),
        ]
    );
    let echoed: Vec<_> = results
        .iter()
        .map(|result| {
            result
                .result
                .as_ref()
                .and_then(|value| value.pointer("/arguments/n"))
                .cloned()
        })
        .collect();
    assert_eq!(echoed, vec![Some(json!(0)), None, Some(json!(2))]);
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn denied_management_changes_nothing() {
    let mut security = MockSecurityPolicy::new();
    security
        .expect_can_register_server()
        .returning(|_, _| true);
    security.expect_can_manage_server().returning(|_, _| false);
    let harness = HarnessBuilder::new(connector_with(&catalog_client()))
        .security(Arc::new(security))
        .build();
    let mallory = UserId::new("mallory");
    let server_id = harness
        .gateway
        .register_server(&ServerDefinition::stdio("files", "echo"), Some(&mallory))
        .await
        .expect("registered");

    let result = harness.gateway.start_server(server_id, Some(&mallory)).await;

    assert!(matches!(result, Err(GatewayError::PermissionDenied(_))));
    assert_eq!(harness.connector.connect_count(), 0);
    assert_eq!(
        harness.events(),
        vec![
            AuditEventType::ServerRegistered,
            AuditEventType::PermissionDenied,
        ]
    );
    let server = harness
        .gateway
        .registry()
        .get_server(server_id)
        .await
        .expect("lookup")
        .expect("server");
    assert_eq!(server.status(), ServerStatus::Registered);
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn audit_failures_do_not_fail_operations() {
    let mut sink = MockAuditSink::new();
    sink.expect_log()
        .times(1)
        .returning(|_| Err(AuditSinkError("disk full".to_owned())));
    let harness = HarnessBuilder::new(InMemoryTransportConnector::new())
        .audit_sink(Arc::new(sink))
        .build();

    let result = harness
        .gateway
        .register_server(&ServerDefinition::stdio("files", "echo"), None)
        .await;

    assert!(result.is_ok());
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn listings_only_show_accessible_servers() {
    let alice = UserId::new("alice");
    let bob = UserId::new("bob");
    let security = DefaultSecurityPolicy::new(SecuritySettings {
        admin_users: BTreeSet::from([UserId::new("root")]),
        ..SecuritySettings::default()
    });
    let harness = HarnessBuilder::new(InMemoryTransportConnector::new())
        .security(Arc::new(security))
        .build();
    for (name, owner) in [("alpha", &alice), ("beta", &bob)] {
        harness
            .gateway
            .register_server(&ServerDefinition::stdio(name, "echo"), Some(owner))
            .await
            .expect("registered");
    }

    let names = |servers: Vec<McpServer>| -> Vec<String> {
        servers
            .iter()
            .map(|server| server.name().as_str().to_owned())
            .collect()
    };
    let for_alice = harness
        .gateway
        .list_servers(Some(&alice), &ServerFilter::default())
        .await
        .expect("listing");
    let for_root = harness
        .gateway
        .list_servers(Some(&UserId::new("root")), &ServerFilter::default())
        .await
        .expect("listing");
    let anonymous = harness
        .gateway
        .list_servers(None, &ServerFilter::default())
        .await
        .expect("listing");

    assert_eq!(names(for_alice), vec!["alpha"]);
    assert_eq!(names(for_root), vec!["alpha", "beta"]);
    assert!(anonymous.is_empty());
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn tool_listing_and_search_respect_filters() {
    let harness = Harness::new(connector_with(&catalog_client()));
    let server_id = harness.running_server("files").await;

    let all = harness
        .gateway
        .list_tools(Some(server_id), &ToolFilter::default(), None)
        .await
        .expect("listing");
    let found = harness
        .gateway
        .search_tools("READS", 10, None)
        .await
        .expect("search");
    let capped = harness
        .gateway
        .search_tools("", 1, None)
        .await
        .expect("search");

    assert_eq!(all.len(), 2);
    assert_eq!(
        found.iter().map(|tool| tool.name()).collect::<Vec<_>>(),
        vec!["read_file"]
    );
    assert_eq!(capped.len(), 1);
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn resources_are_discovered_and_readable() {
    let client = Arc::new(
        InMemoryTransportClient::new()
            .with_tool(ToolDescriptor::new("echo_tool", "Echoes"))
            .with_resource(
                ResourceDescriptor::new("file:///notes.md", "notes"),
                json!({"contents": [{"text": "hello"}]}),
            ),
    );
    let harness = Harness::new(connector_with(&client));
    let server_id = harness.running_server("files").await;

    let resources = harness
        .gateway
        .list_resources(Some(server_id), None)
        .await
        .expect("listing");
    let content = harness
        .gateway
        .read_resource(server_id, "file:///notes.md", None)
        .await
        .expect("read");

    assert_eq!(resources.len(), 1);
    assert_eq!(content, json!({"contents": [{"text": "hello"}]}));
    assert!(harness.events().contains(&AuditEventType::ResourceRead));
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn failed_probe_demotes_and_recovery_promotes() {
    let client = catalog_client();
    let harness = Harness::new(connector_with(&client));
    let server_id = harness.running_server("files").await;

    client.set_probe_failure(Some(TransportError::Connection("stalled".to_owned())));
    let failing = harness
        .gateway
        .check_server_health(server_id, None)
        .await
        .expect("probed");
    let demoted = harness
        .gateway
        .get_server_status(server_id, None)
        .await
        .expect("status");
    client.set_probe_failure(None);
    let passing = harness
        .gateway
        .check_server_health(server_id, None)
        .await
        .expect("probed");
    let promoted = harness
        .gateway
        .get_server_status(server_id, None)
        .await
        .expect("status");

    assert!(!failing.is_healthy());
    assert_eq!(demoted.status, ServerStatus::Unhealthy);
    assert!(passing.is_healthy());
    assert_eq!(promoted.status, ServerStatus::Running);
    let health_events = harness
        .events()
        .into_iter()
        .filter(|event| *event == AuditEventType::HealthChanged)
        .count();
    assert_eq!(health_events, 2);
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn failed_discovery_marks_server_unhealthy() {
    let client = catalog_client();
    let harness = Harness::new(connector_with(&client));
    let server_id = harness.running_server("files").await;
    client.set_probe_failure(Some(TransportError::Protocol("garbled".to_owned())));

    let result = harness.gateway.discover_tools(server_id, None).await;

    assert!(matches!(result, Err(GatewayError::Runtime(_))));
    let status = harness
        .gateway
        .get_server_status(server_id, None)
        .await
        .expect("status");
    assert_eq!(status.status, ServerStatus::Unhealthy);
    assert!(harness.events().contains(&AuditEventType::DiscoveryFailed));
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn balanced_route_replaces_pool_for_one_tool() {
    let client = catalog_client();
    let mut routed = MockToolExecutor::new();
    routed
        .expect_execute()
        .times(1)
        .returning(|_, _, _, _| ExecutionOutcome::success(json!({"via": "balancer"}), 3));
    let harness = Harness::new(connector_with(&client));
    let server_id = harness.running_server("files").await;

    harness
        .gateway
        .register_balanced_tool(server_id, "echo_tool", Arc::new(routed), None)
        .await
        .expect("routed");
    let result = harness
        .gateway
        .execute_tool(server_id, "echo_tool", json!({}), None, ExecutionOptions::default())
        .await
        .expect("executed");

    assert_eq!(result.result, Some(json!({"via": "balancer"})));
    assert!(client.calls().is_empty());
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn stop_closes_connection_and_is_repeatable() {
    let client = catalog_client();
    let harness = Harness::new(connector_with(&client));
    let server_id = harness.running_server("files").await;

    harness
        .gateway
        .stop_server(server_id, None)
        .await
        .expect("stopped");
    harness
        .gateway
        .stop_server(server_id, None)
        .await
        .expect("stopped again");

    assert_eq!(client.close_count(), 1);
    let status = harness
        .gateway
        .get_server_status(server_id, None)
        .await
        .expect("status");
    assert_eq!(status.status, ServerStatus::Stopped);
    assert!(!status.connected);
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn delete_removes_server_and_catalog() {
    let client = catalog_client();
    let harness = Harness::new(connector_with(&client));
    let server_id = harness.running_server("files").await;

    harness
        .gateway
        .delete_server(server_id, None)
        .await
        .expect("deleted");

    assert_eq!(client.close_count(), 1);
    assert!(matches!(
        harness.gateway.get_server_status(server_id, None).await,
        Err(GatewayError::ServerNotFound(_))
    ));
    assert!(
        harness
            .gateway
            .list_tools(None, &ToolFilter::default(), None)
            .await
            .expect("listing")
            .is_empty()
    );
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn shutdown_closes_everything_and_marks_stopped() {
    let client = catalog_client();
    let harness = Harness::new(connector_with(&client));
    let server_id = harness.running_server("files").await;

    let closed = harness.gateway.shutdown().await.expect("shut down");

    assert_eq!(closed, vec![server_id]);
    assert_eq!(client.close_count(), 1);
    let server = harness
        .gateway
        .registry()
        .get_server(server_id)
        .await
        .expect("lookup")
        .expect("server");
    assert_eq!(server.status(), ServerStatus::Stopped);
}

#[rstest]
#[tokio::test(start_paused = true)]
async fn execution_timeout_override_is_honoured() {
    let client = Arc::new(
        InMemoryTransportClient::new()
            .with_tool(ToolDescriptor::new("slow", "Takes a while"))
            .with_tool_delay("slow", Duration::from_secs(60)),
    );
    let harness = Harness::new(connector_with(&client));
    let server_id = harness.running_server("files").await;

    let result = harness
        .gateway
        .execute_tool(
            server_id,
            "slow",
            json!({}),
            None,
            ExecutionOptions::default().with_timeout(Duration::from_millis(250)),
        )
        .await
        .expect("dispatched");

    assert_eq!(result.error_kind, Some(FailureKind::Timeout));
    assert!((250..300).contains(&result.duration_ms));
}
