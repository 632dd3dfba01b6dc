//! HTTP `GET <url>/health` prober.

use crate::load_balancer::{domain::ToolInstance, ports::InstanceProber};
use async_trait::async_trait;
use std::time::Duration;
use tracing::debug;

/// Path appended to the instance URL.
pub const DEFAULT_HEALTH_PATH: &str = "/health";

/// Marks an instance healthy when its health endpoint answers 2xx.
#[derive(Debug, Clone)]
pub struct HttpInstanceProber {
    client: reqwest::Client,
    path: String,
}

impl HttpInstanceProber {
    /// Creates a prober with a per-probe timeout.
    ///
    /// # Errors
    ///
    /// Returns the builder error when the HTTP client cannot be built.
    pub fn new(timeout: Duration) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            path: DEFAULT_HEALTH_PATH.to_owned(),
        })
    }

    /// Probes `path` instead of `/health`.
    #[must_use]
    pub fn with_path(mut self, path: impl Into<String>) -> Self {
        self.path = path.into();
        self
    }
}

#[async_trait]
impl InstanceProber for HttpInstanceProber {
    async fn probe(&self, instance: &ToolInstance) -> bool {
        let url = format!("{}{}", instance.url().trim_end_matches('/'), self.path);
        match self.client.get(&url).send().await {
            Ok(response) => response.status().is_success(),
            Err(err) => {
                debug!(instance = instance.instance_id(), %url, %err, "health probe failed");
                false
            }
        }
    }
}
