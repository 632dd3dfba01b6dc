//! Gateway-level execution requests.

use crate::{connection_pool::domain::ExecutionOptions, tool_registry::domain::ServerId};
use serde_json::Value;

/// One element of `batch_execute_tools`.
#[derive(Debug, Clone, PartialEq)]
pub struct ToolCallRequest {
    /// Server hosting the tool.
    pub server_id: ServerId,
    /// Tool name as registered.
    pub tool_name: String,
    /// Call arguments.
    pub parameters: Value,
    /// Call options.
    pub options: ExecutionOptions,
}

impl ToolCallRequest {
    /// Creates a request with default options.
    #[must_use]
    pub fn new(server_id: ServerId, tool_name: impl Into<String>, parameters: Value) -> Self {
        Self {
            server_id,
            tool_name: tool_name.into(),
            parameters,
            options: ExecutionOptions::default(),
        }
    }

    /// Sets call options.
    #[must_use]
    pub const fn with_options(mut self, options: ExecutionOptions) -> Self {
        self.options = options;
        self
    }
}
