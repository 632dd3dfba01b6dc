//! Execution seams that resilience layers wrap.
//!
//! Every layer implements [`ToolExecutor`] and holds another one, so
//! breakers, retries and balancing compose in any order.

use crate::{
    connection_pool::domain::{ExecutionOptions, ExecutionOutcome},
    load_balancer::domain::ToolInstance,
    tool_registry::domain::{ServerId, Tool},
};
use async_trait::async_trait;
use serde_json::Value;

/// Executes one tool call and reports its outcome.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ToolExecutor: Send + Sync {
    /// Runs `tool` on `server_id` with `parameters`.
    async fn execute(
        &self,
        server_id: ServerId,
        tool: &Tool,
        parameters: Value,
        options: ExecutionOptions,
    ) -> ExecutionOutcome;
}

/// Executes one tool call against a specific balanced instance.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait InstanceExecutor: Send + Sync {
    /// Runs `tool` on `instance` with `parameters`.
    async fn execute_on(
        &self,
        instance: &ToolInstance,
        tool: &Tool,
        parameters: Value,
        options: ExecutionOptions,
    ) -> ExecutionOutcome;
}
