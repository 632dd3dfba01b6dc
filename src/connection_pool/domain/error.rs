//! Connection pool errors.

use crate::{
    tool_registry::domain::{ServerId, TransportKind},
    transport::domain::TransportError,
};
use thiserror::Error;

/// Result type for pool operations.
pub type PoolResult<T> = Result<T, PoolError>;

/// Errors raised by administrative pool operations.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum PoolError {
    /// No adapter exists for the server's transport kind.
    #[error("transport '{0}' is not supported")]
    UnsupportedTransport(TransportKind),

    /// The server already has a pooled connection.
    #[error("server {0} is already connected")]
    AlreadyConnected(ServerId),

    /// The server has no pooled connection.
    #[error("server {0} is not connected")]
    NotConnected(ServerId),

    /// Connecting, the handshake or a start-time listing overran the
    /// server's timeout.
    #[error("server {server_id} did not answer within {after_ms} ms")]
    TimedOut {
        /// Server identifier.
        server_id: ServerId,
        /// Deadline that expired.
        after_ms: u64,
    },

    /// The transport failed.
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// The pool's internal lock was poisoned.
    #[error("connection pool lock poisoned: {0}")]
    Poisoned(String),
}

impl PoolError {
    pub(crate) fn poisoned(err: impl std::fmt::Display) -> Self {
        Self::Poisoned(err.to_string())
    }

    pub(crate) fn timed_out(server_id: ServerId, deadline: std::time::Duration) -> Self {
        Self::TimedOut {
            server_id,
            after_ms: u64::try_from(deadline.as_millis()).unwrap_or(u64::MAX),
        }
    }
}
