//! Innermost executor: a call over a pooled connection.

use crate::{
    connection_pool::{
        domain::{ExecutionOptions, ExecutionOutcome},
        services::ConnectionPool,
    },
    resilience::ports::ToolExecutor,
    tool_registry::domain::{ServerId, Tool},
};
use async_trait::async_trait;
use mockable::Clock;
use serde_json::Value;
use std::sync::Arc;

/// Executes tools over the connections owned by a [`ConnectionPool`].
pub struct PoolExecutor<C>
where
    C: Clock + Send + Sync,
{
    pool: Arc<ConnectionPool<C>>,
}

impl<C> PoolExecutor<C>
where
    C: Clock + Send + Sync,
{
    /// Binds the executor to `pool`.
    #[must_use]
    pub const fn new(pool: Arc<ConnectionPool<C>>) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl<C> ToolExecutor for PoolExecutor<C>
where
    C: Clock + Send + Sync + 'static,
{
    async fn execute(
        &self,
        server_id: ServerId,
        tool: &Tool,
        parameters: Value,
        options: ExecutionOptions,
    ) -> ExecutionOutcome {
        self.pool
            .execute_tool(server_id, tool, parameters, options)
            .await
    }
}
