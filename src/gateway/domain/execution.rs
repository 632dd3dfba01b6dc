//! Execution records and the results returned to callers.

use crate::{
    connection_pool::domain::{ExecutionOutcome, FailureKind},
    tool_registry::domain::{ServerId, ServerStatus, UserId},
};
use chrono::{DateTime, Utc};
use mockable::Clock;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use uuid::Uuid;

/// Identifier of one tool execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ExecutionId(Uuid);

impl ExecutionId {
    /// Creates a random identifier.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ExecutionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ExecutionId {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(formatter)
    }
}

/// Lifecycle of an execution record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionStatus {
    /// Created, not yet finished.
    Pending,
    /// Finished with a result.
    Completed,
    /// Finished with an error.
    Failed,
}

/// An execution that has started but not finished.
///
/// Consumed exactly once by [`PendingExecution::complete`] or
/// [`PendingExecution::fail`].
#[derive(Debug, Clone, PartialEq)]
pub struct PendingExecution {
    id: ExecutionId,
    server_id: ServerId,
    tool_name: String,
    parameters: Value,
    user_id: Option<UserId>,
    started_at: DateTime<Utc>,
}

impl PendingExecution {
    /// Opens an execution record.
    #[must_use]
    pub fn start(
        server_id: ServerId,
        tool_name: impl Into<String>,
        parameters: Value,
        user_id: Option<UserId>,
        clock: &impl Clock,
    ) -> Self {
        Self {
            id: ExecutionId::new(),
            server_id,
            tool_name: tool_name.into(),
            parameters,
            user_id,
            started_at: clock.utc(),
        }
    }

    /// Returns the execution identifier.
    #[must_use]
    pub const fn id(&self) -> ExecutionId {
        self.id
    }

    /// Returns the call arguments.
    #[must_use]
    pub const fn parameters(&self) -> &Value {
        &self.parameters
    }

    /// Finishes the record from an execution outcome.
    #[must_use]
    pub fn finish(self, outcome: &ExecutionOutcome, clock: &impl Clock) -> ToolExecution {
        match outcome {
            ExecutionOutcome::Success {
                result,
                duration_ms,
            } => self.complete(result.clone(), *duration_ms, clock),
            ExecutionOutcome::Failure {
                kind,
                message,
                duration_ms,
            } => self.fail(*kind, message.clone(), *duration_ms, clock),
        }
    }

    /// Finishes the record with a result.
    #[must_use]
    pub fn complete(self, result: Value, duration_ms: u64, clock: &impl Clock) -> ToolExecution {
        self.close(ExecutionStatus::Completed, Some(result), None, duration_ms, clock)
    }

    /// Finishes the record with an error.
    #[must_use]
    pub fn fail(
        self,
        kind: FailureKind,
        error: impl Into<String>,
        duration_ms: u64,
        clock: &impl Clock,
    ) -> ToolExecution {
        self.close(
            ExecutionStatus::Failed,
            None,
            Some((kind, error.into())),
            duration_ms,
            clock,
        )
    }

    fn close(
        self,
        status: ExecutionStatus,
        result: Option<Value>,
        failure: Option<(FailureKind, String)>,
        duration_ms: u64,
        clock: &impl Clock,
    ) -> ToolExecution {
        let (failure_kind, error) = failure.unzip();
        ToolExecution {
            id: self.id,
            server_id: self.server_id,
            tool_name: self.tool_name,
            parameters: self.parameters,
            user_id: self.user_id,
            started_at: self.started_at,
            completed_at: clock.utc(),
            status,
            result,
            error,
            failure_kind,
            duration_ms,
        }
    }
}

/// A finished execution record, kept for audit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolExecution {
    /// Execution identifier.
    pub id: ExecutionId,
    /// Server that hosted the tool.
    pub server_id: ServerId,
    /// Tool name.
    pub tool_name: String,
    /// Call arguments.
    pub parameters: Value,
    /// Calling user.
    pub user_id: Option<UserId>,
    /// When the execution started.
    pub started_at: DateTime<Utc>,
    /// When the execution finished.
    pub completed_at: DateTime<Utc>,
    /// Final status; never [`ExecutionStatus::Pending`].
    pub status: ExecutionStatus,
    /// Result payload when completed.
    pub result: Option<Value>,
    /// Error message when failed.
    pub error: Option<String>,
    /// Failure classification when failed.
    pub failure_kind: Option<FailureKind>,
    /// Time spent in the transport call.
    pub duration_ms: u64,
}

/// Result of `execute_tool` as returned to callers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolExecutionResult {
    /// Whether the tool returned a result.
    pub success: bool,
    /// Identifier of the audited execution record.
    pub execution_id: ExecutionId,
    /// Result payload on success.
    pub result: Option<Value>,
    /// Error message on failure.
    pub error: Option<String>,
    /// Failure classification on failure.
    pub error_kind: Option<FailureKind>,
    /// Time spent in the transport call.
    pub duration_ms: u64,
}

impl ToolExecutionResult {
    /// Builds a failed result for a request rejected before execution.
    #[must_use]
    pub fn rejected(kind: FailureKind, error: impl Into<String>) -> Self {
        Self {
            success: false,
            execution_id: ExecutionId::new(),
            result: None,
            error: Some(error.into()),
            error_kind: Some(kind),
            duration_ms: 0,
        }
    }
}

impl From<&ToolExecution> for ToolExecutionResult {
    fn from(execution: &ToolExecution) -> Self {
        Self {
            success: execution.status == ExecutionStatus::Completed,
            execution_id: execution.id,
            result: execution.result.clone(),
            error: execution.error.clone(),
            error_kind: execution.failure_kind,
            duration_ms: execution.duration_ms,
        }
    }
}

/// Answer to `start_server`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StartServerResponse {
    /// Whether the server is now running.
    pub success: bool,
    /// Server status after the attempt.
    pub status: ServerStatus,
    /// Number of tools the server advertised during the handshake probe.
    pub tools_available: usize,
}
