//! Execution outcomes: tool failures are values, not errors.

use crate::transport::domain::TransportError;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// Why an execution failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// The call exceeded its deadline.
    Timeout,
    /// The connection could not be used.
    Connection,
    /// The peer broke the protocol.
    Protocol,
    /// The peer answered with a JSON-RPC error.
    Remote,
    /// The tool ran and reported failure.
    Tool,
    /// The server has no live connection.
    NotConnected,
    /// A circuit breaker rejected the call.
    CircuitOpen,
    /// No healthy instance was available.
    Unavailable,
    /// The request was malformed or the parameters were rejected.
    Validation,
    /// The server or tool does not exist.
    NotFound,
    /// The caller is not allowed to run the tool.
    PermissionDenied,
}

impl FailureKind {
    /// Returns whether a retry may succeed.
    #[must_use]
    pub const fn is_retryable(self) -> bool {
        matches!(self, Self::Timeout | Self::Connection | Self::Unavailable)
    }

    /// Returns whether the failure reflects the health of the target.
    ///
    /// Circuit breakers count only these.
    #[must_use]
    pub const fn is_fault(self) -> bool {
        matches!(
            self,
            Self::Timeout | Self::Connection | Self::Protocol | Self::Remote | Self::Tool
        )
    }

    /// Returns the wire name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Timeout => "timeout",
            Self::Connection => "connection",
            Self::Protocol => "protocol",
            Self::Remote => "remote",
            Self::Tool => "tool",
            Self::NotConnected => "not_connected",
            Self::CircuitOpen => "circuit_open",
            Self::Unavailable => "unavailable",
            Self::Validation => "validation",
            Self::NotFound => "not_found",
            Self::PermissionDenied => "permission_denied",
        }
    }
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<&TransportError> for FailureKind {
    fn from(error: &TransportError) -> Self {
        match error {
            TransportError::Connection(_) | TransportError::Closed => Self::Connection,
            TransportError::Protocol(_) | TransportError::UnsupportedTransport(_) => {
                Self::Protocol
            }
            TransportError::Remote { .. } => Self::Remote,
            TransportError::ToolFailed(_) => Self::Tool,
        }
    }
}

/// Result of one tool execution, always carrying the elapsed time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum ExecutionOutcome {
    /// The tool returned a result.
    Success {
        /// Tool result payload.
        result: Value,
        /// Time spent in the transport call.
        duration_ms: u64,
    },
    /// The execution failed.
    Failure {
        /// Failure classification.
        kind: FailureKind,
        /// Human-readable reason.
        message: String,
        /// Time spent before the failure.
        duration_ms: u64,
    },
}

impl ExecutionOutcome {
    /// Builds a successful outcome.
    #[must_use]
    pub const fn success(result: Value, duration_ms: u64) -> Self {
        Self::Success {
            result,
            duration_ms,
        }
    }

    /// Builds a failed outcome.
    #[must_use]
    pub fn failure(kind: FailureKind, message: impl Into<String>, duration_ms: u64) -> Self {
        Self::Failure {
            kind,
            message: message.into(),
            duration_ms,
        }
    }

    /// Builds a failed outcome from a transport error.
    #[must_use]
    pub fn from_transport_error(error: &TransportError, duration_ms: u64) -> Self {
        Self::failure(FailureKind::from(error), error.to_string(), duration_ms)
    }

    /// Returns whether the execution succeeded.
    #[must_use]
    pub const fn is_success(&self) -> bool {
        matches!(self, Self::Success { .. })
    }

    /// Returns the elapsed time in milliseconds.
    #[must_use]
    pub const fn duration_ms(&self) -> u64 {
        match self {
            Self::Success { duration_ms, .. } | Self::Failure { duration_ms, .. } => *duration_ms,
        }
    }

    /// Returns the result payload of a successful execution.
    #[must_use]
    pub const fn result(&self) -> Option<&Value> {
        match self {
            Self::Success { result, .. } => Some(result),
            Self::Failure { .. } => None,
        }
    }

    /// Returns the failure message.
    #[must_use]
    pub fn error(&self) -> Option<&str> {
        match self {
            Self::Success { .. } => None,
            Self::Failure { message, .. } => Some(message),
        }
    }

    /// Returns the failure kind.
    #[must_use]
    pub const fn failure_kind(&self) -> Option<FailureKind> {
        match self {
            Self::Success { .. } => None,
            Self::Failure { kind, .. } => Some(*kind),
        }
    }
}
