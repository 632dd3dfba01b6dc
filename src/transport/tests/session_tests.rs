//! MCP session tests over a scripted channel.

use crate::transport::{
    domain::{TransportError, TransportResult, methods},
    ports::{RpcChannel, TransportClient},
    services::McpSession,
};
use async_trait::async_trait;
use rstest::{fixture, rstest};
use serde_json::{Value, json};
use std::collections::VecDeque;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};

#[derive(Default)]
struct ScriptedChannel {
    replies: Mutex<VecDeque<TransportResult<Value>>>,
    requests: Mutex<Vec<(String, Option<Value>)>>,
    notifications: Mutex<Vec<String>>,
    closed: AtomicBool,
}

impl ScriptedChannel {
    fn replying(replies: impl IntoIterator<Item = TransportResult<Value>>) -> Self {
        Self {
            replies: Mutex::new(replies.into_iter().collect()),
            ..Self::default()
        }
    }

    fn methods(&self) -> Vec<String> {
        self.requests
            .lock()
            .expect("requests lock")
            .iter()
            .map(|(method, _)| method.clone())
            .collect()
    }
}

#[async_trait]
impl RpcChannel for ScriptedChannel {
    async fn request(&self, method: &str, params: Option<Value>) -> TransportResult<Value> {
        self.requests
            .lock()
            .expect("requests lock")
            .push((method.to_owned(), params));
        self.replies
            .lock()
            .expect("replies lock")
            .pop_front()
            .unwrap_or_else(|| Err(TransportError::Protocol("no scripted reply".to_owned())))
    }

    async fn notify(&self, method: &str, _params: Option<Value>) -> TransportResult<()> {
        self.notifications
            .lock()
            .expect("notifications lock")
            .push(method.to_owned());
        Ok(())
    }

    async fn close(&self) -> TransportResult<()> {
        self.closed.store(true, Ordering::Release);
        Ok(())
    }

    fn is_alive(&self) -> bool {
        !self.closed.load(Ordering::Acquire)
    }
}

fn handshake() -> TransportResult<Value> {
    Ok(json!({
        "protocolVersion": "2024-11-05",
        "capabilities": {"tools": {}},
        "serverInfo": {"name": "scripted", "version": "1.0.0"}
    }))
}

#[fixture]
fn initialized_replies() -> Vec<TransportResult<Value>> {
    vec![handshake()]
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn calls_before_initialize_are_protocol_errors() {
    let session = McpSession::new(ScriptedChannel::default());

    let listed = session.list_tools().await;
    let called = session.call_tool("echo", json!({})).await;

    assert!(matches!(listed, Err(TransportError::Protocol(message)) if message.contains("before initialize")));
    assert!(matches!(called, Err(TransportError::Protocol(_))));
    assert!(session.channel().methods().is_empty());
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn initialize_sends_handshake_then_notification() {
    let session = McpSession::new(ScriptedChannel::replying([handshake()]));

    let result = session.initialize().await.expect("handshake");

    assert_eq!(result.server_info.name, "scripted");
    assert!(session.is_initialized());
    assert_eq!(session.channel().methods(), vec![methods::INITIALIZE.to_owned()]);
    let notified = session
        .channel()
        .notifications
        .lock()
        .expect("notifications lock")
        .clone();
    assert_eq!(notified, vec![methods::INITIALIZED.to_owned()]);
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn list_tools_follows_cursors(mut initialized_replies: Vec<TransportResult<Value>>) {
    initialized_replies.push(Ok(json!({
        "tools": [{"name": "first"}],
        "nextCursor": "page-2"
    })));
    initialized_replies.push(Ok(json!({"tools": [{"name": "second"}]})));
    let session = McpSession::new(ScriptedChannel::replying(initialized_replies));
    session.initialize().await.expect("handshake");

    let tools = session.list_tools().await.expect("listing");

    let names: Vec<&str> = tools.iter().map(|tool| tool.name.as_str()).collect();
    assert_eq!(names, vec!["first", "second"]);
    let requests = session.channel().requests.lock().expect("lock").clone();
    assert_eq!(
        requests.last().and_then(|(_, params)| params.clone()),
        Some(json!({"cursor": "page-2"}))
    );
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn malformed_listing_is_a_protocol_error(
    mut initialized_replies: Vec<TransportResult<Value>>,
) {
    initialized_replies.push(Ok(json!({"tools": "not-a-list"})));
    let session = McpSession::new(ScriptedChannel::replying(initialized_replies));
    session.initialize().await.expect("handshake");

    let result = session.list_tools().await;

    assert!(matches!(result, Err(TransportError::Protocol(message)) if message.contains("malformed")));
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn tool_error_results_become_tool_failures(
    mut initialized_replies: Vec<TransportResult<Value>>,
) {
    initialized_replies.push(Ok(json!({
        "isError": true,
        "content": [{"type": "text", "text": "disk full"}]
    })));
    let session = McpSession::new(ScriptedChannel::replying(initialized_replies));
    session.initialize().await.expect("handshake");

    let result = session.call_tool("write", json!({"path": "/tmp/x"})).await;

    assert_eq!(result, Err(TransportError::ToolFailed("disk full".to_owned())));
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn close_resets_session(initialized_replies: Vec<TransportResult<Value>>) {
    let session = McpSession::new(ScriptedChannel::replying(initialized_replies));
    session.initialize().await.expect("handshake");

    session.close().await.expect("close");
    session.close().await.expect("second close");

    assert!(!session.is_initialized());
    assert!(!session.is_alive());
}
