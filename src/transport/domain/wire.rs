//! JSON-RPC 2.0 framing used by every MCP transport.

use super::{TransportError, TransportResult};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// JSON-RPC protocol version string.
pub const JSONRPC_VERSION: &str = "2.0";

/// MCP protocol revision offered during the handshake.
pub const MCP_PROTOCOL_VERSION: &str = "2024-11-05";

/// MCP method names.
pub mod methods {
    /// Session handshake request.
    pub const INITIALIZE: &str = "initialize";
    /// Handshake completion notification.
    pub const INITIALIZED: &str = "notifications/initialized";
    /// Tool catalog listing.
    pub const TOOLS_LIST: &str = "tools/list";
    /// Tool invocation.
    pub const TOOLS_CALL: &str = "tools/call";
    /// Resource catalog listing.
    pub const RESOURCES_LIST: &str = "resources/list";
    /// Resource read.
    pub const RESOURCES_READ: &str = "resources/read";
}

/// JSON-RPC request carrying a numeric id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JsonRpcRequest {
    /// Always `"2.0"`.
    pub jsonrpc: String,
    /// Correlation id.
    pub id: u64,
    /// Method name.
    pub method: String,
    /// Optional parameters.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub params: Option<Value>,
}

impl JsonRpcRequest {
    /// Creates a request.
    #[must_use]
    pub fn new(id: u64, method: impl Into<String>, params: Option<Value>) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.to_owned(),
            id,
            method: method.into(),
            params,
        }
    }
}

/// JSON-RPC notification (no id, no response).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JsonRpcNotification {
    /// Always `"2.0"`.
    pub jsonrpc: String,
    /// Method name.
    pub method: String,
    /// Optional parameters.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub params: Option<Value>,
}

impl JsonRpcNotification {
    /// Creates a notification.
    #[must_use]
    pub fn new(method: impl Into<String>, params: Option<Value>) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.to_owned(),
            method: method.into(),
            params,
        }
    }
}

/// JSON-RPC error payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JsonRpcError {
    /// Error code.
    pub code: i64,
    /// Human-readable message.
    pub message: String,
    /// Optional structured detail.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

/// JSON-RPC response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JsonRpcResponse {
    /// Protocol version echoed by the peer.
    #[serde(default)]
    pub jsonrpc: String,
    /// Correlation id; peers may echo it as a number or a string.
    #[serde(default)]
    pub id: Value,
    /// Success payload.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    /// Failure payload.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<JsonRpcError>,
}

impl JsonRpcResponse {
    /// Returns the numeric correlation id, accepting numeric strings.
    #[must_use]
    pub fn numeric_id(&self) -> Option<u64> {
        match &self.id {
            Value::Number(number) => number.as_u64(),
            Value::String(text) => text.parse().ok(),
            _ => None,
        }
    }

    /// Converts the response into its result payload.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError::Remote`] for an error payload and
    /// [`TransportError::Protocol`] when neither payload is present.
    pub fn into_result(self) -> TransportResult<Value> {
        match (self.result, self.error) {
            (_, Some(error)) => Err(TransportError::Remote {
                code: error.code,
                message: error.message,
            }),
            (Some(result), None) => Ok(result),
            (None, None) => Err(TransportError::Protocol(
                "response carries neither result nor error".to_owned(),
            )),
        }
    }
}

/// Extracts the JSON payload from an HTTP body that may be plain JSON or a
/// server-sent-events stream. For SSE bodies the last `data:` line wins.
#[must_use]
pub fn extract_json_body(body: &str) -> &str {
    let trimmed = body.trim();
    if !trimmed.starts_with("data:") && !trimmed.starts_with("event:") {
        return trimmed;
    }

    trimmed
        .lines()
        .filter_map(|line| line.strip_prefix("data:"))
        .map(str::trim)
        .filter(|data| !data.is_empty())
        .next_back()
        .unwrap_or(trimmed)
}

/// Turns a `tools/call` result flagged with `isError` into
/// [`TransportError::ToolFailed`] carrying the joined text content.
///
/// # Errors
///
/// Returns [`TransportError::ToolFailed`] when `isError` is `true`.
pub fn into_tool_result(result: Value) -> TransportResult<Value> {
    if result.get("isError").and_then(Value::as_bool) != Some(true) {
        return Ok(result);
    }
    let text: Vec<&str> = result
        .get("content")
        .and_then(Value::as_array)
        .map(|blocks| {
            blocks
                .iter()
                .filter_map(|block| block.get("text").and_then(Value::as_str))
                .collect()
        })
        .unwrap_or_default();

    if text.is_empty() {
        return Err(TransportError::ToolFailed(
            "tool returned isError without text content".to_owned(),
        ));
    }
    Err(TransportError::ToolFailed(text.join("\n")))
}
