//! Health probe results for MCP servers.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Outcome of a single health probe against a live connection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthReport {
    healthy: bool,
    response_time_ms: Option<u64>,
    error: Option<String>,
    checked_at: DateTime<Utc>,
}

impl HealthReport {
    /// Creates a healthy report with the measured probe latency.
    #[must_use]
    pub const fn healthy(response_time_ms: u64, checked_at: DateTime<Utc>) -> Self {
        Self {
            healthy: true,
            response_time_ms: Some(response_time_ms),
            error: None,
            checked_at,
        }
    }

    /// Creates an unhealthy report carrying the probe failure.
    #[must_use]
    pub fn unhealthy(error: impl Into<String>, checked_at: DateTime<Utc>) -> Self {
        Self {
            healthy: false,
            response_time_ms: None,
            error: Some(error.into().trim().to_owned()),
            checked_at,
        }
    }

    /// Returns whether the probe succeeded.
    #[must_use]
    pub const fn is_healthy(&self) -> bool {
        self.healthy
    }

    /// Returns the probe latency, if the probe completed.
    #[must_use]
    pub const fn response_time_ms(&self) -> Option<u64> {
        self.response_time_ms
    }

    /// Returns the probe failure message.
    #[must_use]
    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    /// Returns when the probe ran.
    #[must_use]
    pub const fn checked_at(&self) -> DateTime<Utc> {
        self.checked_at
    }
}
