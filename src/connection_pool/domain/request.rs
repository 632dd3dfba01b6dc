//! Execution requests accepted by the pool.

use crate::tool_registry::domain::{ServerId, Tool};
use serde_json::Value;
use std::time::Duration;

/// Per-call execution options.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExecutionOptions {
    /// Overrides the tool's own timeout.
    pub timeout: Option<Duration>,
}

impl ExecutionOptions {
    /// Sets the timeout override.
    #[must_use]
    pub const fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Returns the effective deadline for `tool`.
    #[must_use]
    pub fn timeout_for(&self, tool: &Tool) -> Duration {
        self.timeout.unwrap_or_else(|| tool.timeout())
    }
}

/// One element of a batch execution.
#[derive(Debug, Clone)]
pub struct BatchItem {
    /// Server hosting the tool.
    pub server_id: ServerId,
    /// Tool definition from the registry.
    pub tool: Tool,
    /// Call arguments.
    pub parameters: Value,
    /// Call options.
    pub options: ExecutionOptions,
}
