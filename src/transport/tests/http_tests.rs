//! HTTP channel tests against a mock MCP endpoint.

use crate::{
    tool_registry::domain::McpTransport,
    transport::{
        adapters::{HttpChannel, http::SESSION_HEADER},
        domain::TransportError,
        ports::{RpcChannel, TransportClient},
        services::McpSession,
    },
};
use rstest::rstest;
use serde_json::json;
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn channel_for(server: &MockServer) -> HttpChannel {
    let transport = McpTransport::http(format!("{}/mcp", server.uri())).expect("valid transport");
    let McpTransport::Http(config) = transport else {
        panic!("expected http transport");
    };
    HttpChannel::connect(&config.with_headers([("x-api-key".to_owned(), "secret".to_owned())]))
        .expect("client builds")
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn handshake_captures_and_echoes_session_id() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/mcp"))
        .and(body_partial_json(json!({"method": "initialize"})))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header(SESSION_HEADER, "session-42")
                .set_body_json(json!({
                    "jsonrpc": "2.0",
                    "id": 1,
                    "result": {"protocolVersion": "2024-11-05", "serverInfo": {"name": "mock"}}
                })),
        )
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/mcp"))
        .and(body_partial_json(json!({"method": "notifications/initialized"})))
        .and(header(SESSION_HEADER, "session-42"))
        .respond_with(ResponseTemplate::new(202))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/mcp"))
        .and(body_partial_json(json!({"method": "tools/list"})))
        .and(header(SESSION_HEADER, "session-42"))
        .and(header("x-api-key", "secret"))
        .respond_with(ResponseTemplate::new(200).set_body_string(
            "event: message\ndata: {\"jsonrpc\":\"2.0\",\"id\":2,\"result\":{\"tools\":[{\"name\":\"search\"}]}}\n\n",
        ))
        .mount(&server)
        .await;

    let session = McpSession::new(channel_for(&server));
    session.initialize().await.expect("handshake");
    let tools = session.list_tools().await.expect("listing");

    assert_eq!(session.channel().session_id().as_deref(), Some("session-42"));
    assert_eq!(tools.first().map(|tool| tool.name.as_str()), Some("search"));
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn remote_errors_are_surfaced() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/mcp"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "jsonrpc": "2.0",
            "id": 1,
            "error": {"code": -32601, "message": "unknown method"}
        })))
        .mount(&server)
        .await;

    let result = channel_for(&server).request("bogus", None).await;

    assert_eq!(
        result,
        Err(TransportError::Remote {
            code: -32601,
            message: "unknown method".to_owned(),
        })
    );
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn http_failure_status_is_a_connection_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    let result = channel_for(&server).request("tools/list", None).await;

    assert!(matches!(result, Err(TransportError::Connection(_))));
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn closed_channel_rejects_requests() {
    let server = MockServer::start().await;
    let channel = channel_for(&server);

    channel.close().await.expect("close");
    channel.close().await.expect("second close");

    assert!(!channel.is_alive());
    assert_eq!(
        channel.request("tools/list", None).await,
        Err(TransportError::Closed)
    );
}
