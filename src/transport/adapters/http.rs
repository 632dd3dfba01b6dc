//! JSON-RPC over HTTP POST with optional SSE-framed responses.

use crate::{
    tool_registry::domain::NetworkTransportConfig,
    transport::{
        domain::{
            JsonRpcNotification, JsonRpcRequest, JsonRpcResponse, TransportError,
            TransportResult, extract_json_body,
        },
        ports::RpcChannel,
    },
};
use async_trait::async_trait;
use reqwest::header::{ACCEPT, CONTENT_TYPE, HeaderMap, HeaderName, HeaderValue};
use serde::Serialize;
use serde_json::Value;
use std::sync::RwLock;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use tracing::debug;

/// Session header assigned by streamable-HTTP MCP servers.
pub const SESSION_HEADER: &str = "mcp-session-id";

const ACCEPT_BOTH: &str = "application/json, text/event-stream";

/// JSON-RPC channel to an HTTP MCP endpoint over a pooled client.
#[derive(Debug)]
pub struct HttpChannel {
    client: reqwest::Client,
    url: String,
    session_id: RwLock<Option<String>>,
    next_id: AtomicU64,
    closed: AtomicBool,
}

impl HttpChannel {
    /// Builds a channel with the configured headers applied to every call.
    ///
    /// No request is sent until the first call.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError::Connection`] when a header is malformed or
    /// the HTTP client cannot be built.
    pub fn connect(config: &NetworkTransportConfig) -> TransportResult<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static(ACCEPT_BOTH));
        for (name, value) in config.headers() {
            let header_name = HeaderName::from_bytes(name.as_bytes())
                .map_err(|err| TransportError::Connection(format!("header '{name}': {err}")))?;
            let header_value = HeaderValue::from_str(value)
                .map_err(|err| TransportError::Connection(format!("header '{name}': {err}")))?;
            headers.insert(header_name, header_value);
        }

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .build()
            .map_err(TransportError::connection)?;

        Ok(Self {
            client,
            url: config.url().to_owned(),
            session_id: RwLock::new(None),
            next_id: AtomicU64::new(1),
            closed: AtomicBool::new(false),
        })
    }

    /// Returns the session identifier assigned by the server, if any.
    #[must_use]
    pub fn session_id(&self) -> Option<String> {
        self.session_id.read().ok().and_then(|guard| guard.clone())
    }

    fn remember_session(&self, headers: &HeaderMap) {
        let Some(value) = headers
            .get(SESSION_HEADER)
            .and_then(|header| header.to_str().ok())
        else {
            return;
        };
        if let Ok(mut slot) = self.session_id.write() {
            *slot = Some(value.to_owned());
        }
    }

    fn post(&self, body: &impl Serialize) -> reqwest::RequestBuilder {
        let mut builder = self
            .client
            .post(&self.url)
            .header(CONTENT_TYPE, "application/json")
            .json(body);
        if let Some(session) = self.session_id() {
            builder = builder.header(SESSION_HEADER, session);
        }
        builder
    }

    async fn send(&self, body: &impl Serialize) -> TransportResult<reqwest::Response> {
        if self.closed.load(Ordering::Acquire) {
            return Err(TransportError::Closed);
        }
        let response = self.post(body).send().await.map_err(|err| {
            if err.is_connect() || err.is_timeout() {
                TransportError::Connection(format!("{}: {err}", self.url))
            } else {
                TransportError::protocol(err)
            }
        })?;
        self.remember_session(response.headers());

        let status = response.status();
        if !status.is_success() {
            return Err(TransportError::Connection(format!(
                "{} answered HTTP {status}",
                self.url
            )));
        }
        Ok(response)
    }
}

#[async_trait]
impl RpcChannel for HttpChannel {
    async fn request(&self, method: &str, params: Option<Value>) -> TransportResult<Value> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        debug!(url = %self.url, id, method, "http request");
        let response = self.send(&JsonRpcRequest::new(id, method, params)).await?;
        let text = response.text().await.map_err(TransportError::protocol)?;
        let envelope: JsonRpcResponse = serde_json::from_str(extract_json_body(&text))
            .map_err(|err| TransportError::Protocol(format!("malformed {method} reply: {err}")))?;
        envelope.into_result()
    }

    async fn notify(&self, method: &str, params: Option<Value>) -> TransportResult<()> {
        self.send(&JsonRpcNotification::new(method, params))
            .await
            .map(drop)
    }

    async fn close(&self) -> TransportResult<()> {
        if self.closed.swap(true, Ordering::AcqRel) {
            return Ok(());
        }
        let Some(session) = self.session_id() else {
            return Ok(());
        };

        let ended = self
            .client
            .delete(&self.url)
            .header(SESSION_HEADER, session)
            .send()
            .await;
        if let Err(err) = ended {
            debug!(url = %self.url, %err, "session termination request failed");
        }
        Ok(())
    }

    fn is_alive(&self) -> bool {
        !self.closed.load(Ordering::Acquire)
    }
}
