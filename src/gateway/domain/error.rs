//! Gateway error taxonomy.

use crate::{
    connection_pool::domain::{FailureKind, PoolError},
    tool_registry::{
        domain::{ServerId, ToolRegistryDomainError},
        services::ToolRegistryError,
    },
    transport::domain::TransportError,
};
use thiserror::Error;

/// Errors raised by administrative gateway operations.
///
/// Tool execution does not use this type for transport failures; those come
/// back as failed [`ToolExecutionResult`](super::ToolExecutionResult)s.
#[derive(Debug, Clone, Error)]
pub enum GatewayError {
    /// Registration input or tool parameters were rejected before any state
    /// change.
    #[error("validation failed: {0}")]
    Validation(String),
    /// The caller is not authorised for the operation.
    #[error("permission denied: {0}")]
    PermissionDenied(String),
    /// No server exists with the identifier.
    #[error("MCP server {0} not found")]
    ServerNotFound(ServerId),
    /// No tool with the name exists on the server.
    #[error("tool '{tool}' not found on MCP server {server_id}")]
    ToolNotFound {
        /// Server identifier.
        server_id: ServerId,
        /// Tool name.
        tool: String,
    },
    /// The transport could not be established or used.
    #[error("connection failed: {0}")]
    Connection(String),
    /// An administrative call exceeded its deadline.
    #[error("operation timed out: {0}")]
    Timeout(String),
    /// Any other runtime failure, raised after best-effort status updates.
    #[error("runtime failure: {0}")]
    Runtime(String),
    /// Catalog store or index failure.
    #[error(transparent)]
    Registry(#[from] ToolRegistryError),
}

/// Result type for gateway operations.
pub type GatewayResult<T> = Result<T, GatewayError>;

impl GatewayError {
    /// Classifies the error for callers that collect failures as results.
    #[must_use]
    pub const fn failure_kind(&self) -> FailureKind {
        match self {
            Self::Validation(_) => FailureKind::Validation,
            Self::PermissionDenied(_) => FailureKind::PermissionDenied,
            Self::ServerNotFound(_)
            | Self::ToolNotFound { .. }
            | Self::Registry(
                ToolRegistryError::ServerNotFound(_) | ToolRegistryError::ToolNotFound { .. },
            ) => FailureKind::NotFound,
            Self::Connection(_) => FailureKind::Connection,
            Self::Timeout(_) => FailureKind::Timeout,
            Self::Runtime(_) | Self::Registry(_) => FailureKind::Unavailable,
        }
    }
}

impl From<ToolRegistryDomainError> for GatewayError {
    fn from(err: ToolRegistryDomainError) -> Self {
        let state_conflict = matches!(
            err,
            ToolRegistryDomainError::InvalidStatusTransition { .. }
                | ToolRegistryDomainError::ServerNotRunning { .. }
        );
        if state_conflict {
            Self::Runtime(err.to_string())
        } else {
            Self::Validation(err.to_string())
        }
    }
}

impl From<TransportError> for GatewayError {
    fn from(err: TransportError) -> Self {
        match err {
            TransportError::Connection(message) => Self::Connection(message),
            TransportError::Closed => Self::Connection(err.to_string()),
            other => Self::Runtime(other.to_string()),
        }
    }
}

impl From<PoolError> for GatewayError {
    fn from(err: PoolError) -> Self {
        match err {
            PoolError::Transport(transport) => transport.into(),
            PoolError::TimedOut { .. } => Self::Timeout(err.to_string()),
            other => Self::Runtime(other.to_string()),
        }
    }
}
