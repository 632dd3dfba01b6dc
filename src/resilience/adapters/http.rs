//! Executes a tool on a balanced instance with a single JSON-RPC POST.

use crate::{
    connection_pool::domain::{ExecutionOptions, ExecutionOutcome, FailureKind},
    load_balancer::domain::ToolInstance,
    resilience::ports::InstanceExecutor,
    tool_registry::domain::{Tool, duration_to_millis},
    transport::domain::{
        JsonRpcRequest, JsonRpcResponse, TransportError, extract_json_body, into_tool_result,
        methods,
    },
};
use async_trait::async_trait;
use reqwest::header::{ACCEPT, CONTENT_TYPE};
use serde_json::{Value, json};
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::time::Instant;
use tracing::debug;

/// Posts `tools/call` to `instance.url()` and reads a JSON or SSE reply.
///
/// Instances are stateless from the gateway's point of view: no handshake
/// or session header is exchanged.
#[derive(Debug)]
pub struct HttpInstanceExecutor {
    client: reqwest::Client,
    next_id: AtomicU64,
}

type CallFailure = (FailureKind, String);

impl Default for HttpInstanceExecutor {
    fn default() -> Self {
        Self::new()
    }
}

impl HttpInstanceExecutor {
    /// Creates an executor with a fresh connection pool.
    #[must_use]
    pub fn new() -> Self {
        Self::with_client(reqwest::Client::new())
    }

    /// Creates an executor sharing `client`.
    #[must_use]
    pub const fn with_client(client: reqwest::Client) -> Self {
        Self {
            client,
            next_id: AtomicU64::new(1),
        }
    }

    async fn post(
        &self,
        instance: &ToolInstance,
        tool: &Tool,
        parameters: Value,
        options: ExecutionOptions,
    ) -> Result<Value, CallFailure> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let params = json!({ "name": tool.name(), "arguments": parameters });
        let deadline = options.timeout_for(tool);

        let response = self
            .client
            .post(instance.url())
            .header(CONTENT_TYPE, "application/json")
            .header(ACCEPT, "application/json, text/event-stream")
            .timeout(deadline)
            .json(&JsonRpcRequest::new(id, methods::TOOLS_CALL, Some(params)))
            .send()
            .await
            .map_err(|err| request_failure(instance, &err))?;

        let status = response.status();
        if !status.is_success() {
            return Err((
                FailureKind::Connection,
                format!("instance '{}' answered HTTP {status}", instance.instance_id()),
            ));
        }

        let text = response
            .text()
            .await
            .map_err(|err| request_failure(instance, &err))?;
        serde_json::from_str::<JsonRpcResponse>(extract_json_body(&text))
            .map_err(TransportError::protocol)
            .and_then(JsonRpcResponse::into_result)
            .and_then(into_tool_result)
            .map_err(|err| (FailureKind::from(&err), err.to_string()))
    }
}

fn request_failure(instance: &ToolInstance, err: &reqwest::Error) -> CallFailure {
    let kind = if err.is_timeout() {
        FailureKind::Timeout
    } else if err.is_connect() {
        FailureKind::Connection
    } else {
        FailureKind::Protocol
    };
    (kind, format!("instance '{}': {err}", instance.instance_id()))
}

#[async_trait]
impl InstanceExecutor for HttpInstanceExecutor {
    async fn execute_on(
        &self,
        instance: &ToolInstance,
        tool: &Tool,
        parameters: Value,
        options: ExecutionOptions,
    ) -> ExecutionOutcome {
        let started = Instant::now();
        let posted = self.post(instance, tool, parameters, options).await;
        let duration_ms = duration_to_millis(started.elapsed());
        debug!(
            instance = instance.instance_id(),
            tool = tool.name(),
            duration_ms,
            success = posted.is_ok(),
            "instance call finished"
        );
        posted.map_or_else(
            |(kind, message)| ExecutionOutcome::failure(kind, message, duration_ms),
            |result| ExecutionOutcome::success(result, duration_ms),
        )
    }
}
