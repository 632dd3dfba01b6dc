//! Audit sink tests.

use crate::{
    gateway::{
        adapters::{InMemoryAuditSink, TracingAuditSink},
        domain::{AuditEvent, AuditEventType, Severity},
        ports::AuditSink,
    },
    tool_registry::domain::UserId,
};
use mockable::{Clock, DefaultClock};
use rstest::rstest;
use serde_json::json;

fn event(event_type: AuditEventType, severity: Severity) -> AuditEvent {
    AuditEvent::new(
        event_type,
        Some(UserId::new("alice")),
        json!({ "server_id": "s-1" }),
        severity,
        DefaultClock.utc(),
    )
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn in_memory_sink_keeps_arrival_order() {
    let sink = InMemoryAuditSink::new();

    sink.log(&event(AuditEventType::ServerRegistered, Severity::Info))
        .await
        .expect("logged");
    sink.log(&event(AuditEventType::PermissionDenied, Severity::Warning))
        .await
        .expect("logged");

    let kinds: Vec<AuditEventType> = sink
        .events()
        .iter()
        .map(|recorded| recorded.event_type)
        .collect();
    assert_eq!(
        kinds,
        vec![AuditEventType::ServerRegistered, AuditEventType::PermissionDenied]
    );
}

#[rstest]
#[case::info(Severity::Info)]
#[case::warning(Severity::Warning)]
#[case::error(Severity::Error)]
#[tokio::test(flavor = "multi_thread")]
async fn tracing_sink_accepts_every_severity(#[case] severity: Severity) {
    let sink = TracingAuditSink;

    let logged = sink.log(&event(AuditEventType::ToolExecuted, severity)).await;

    assert!(logged.is_ok());
}

#[rstest]
fn events_serialise_with_snake_case_labels() {
    let recorded = event(AuditEventType::HealthChanged, Severity::Warning);

    let value = serde_json::to_value(&recorded).expect("serialisable");

    assert_eq!(value.get("event_type"), Some(&json!("health_changed")));
    assert_eq!(value.get("severity"), Some(&json!("warning")));
    assert_eq!(value.get("user_id"), Some(&json!("alice")));
    assert_eq!(AuditEventType::HealthChanged.to_string(), "health_changed");
}
