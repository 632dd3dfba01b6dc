//! Transport-level error taxonomy.

use crate::tool_registry::domain::TransportKind;
use thiserror::Error;

/// Result type for transport operations.
pub type TransportResult<T> = Result<T, TransportError>;

/// Errors raised while talking to an MCP server.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TransportError {
    /// The channel could not be established or the peer became unreachable.
    #[error("connection error: {0}")]
    Connection(String),

    /// The peer sent a malformed or unexpected message, or the session was
    /// used out of order.
    #[error("protocol error: {0}")]
    Protocol(String),

    /// The peer answered with a JSON-RPC error payload.
    #[error("remote error {code}: {message}")]
    Remote {
        /// JSON-RPC error code.
        code: i64,
        /// Error message from the peer.
        message: String,
    },

    /// The tool ran but reported a failure in its result.
    #[error("tool reported an error: {0}")]
    ToolFailed(String),

    /// The channel was closed before a response arrived.
    #[error("connection closed")]
    Closed,

    /// No transport adapter exists for the kind.
    #[error("transport '{0}' is not supported")]
    UnsupportedTransport(TransportKind),
}

impl TransportError {
    /// Builds a [`TransportError::Connection`] from any displayable error.
    pub fn connection(err: impl std::fmt::Display) -> Self {
        Self::Connection(err.to_string())
    }

    /// Builds a [`TransportError::Protocol`] from any displayable error.
    pub fn protocol(err: impl std::fmt::Display) -> Self {
        Self::Protocol(err.to_string())
    }
}
