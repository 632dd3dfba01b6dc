//! Circuit breaker configuration, states and errors.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;
use thiserror::Error;

/// Default consecutive failures that open the circuit.
pub const DEFAULT_FAILURE_THRESHOLD: u32 = 5;

/// Default wait before a half-open probe is admitted.
pub const DEFAULT_RECOVERY_TIMEOUT: Duration = Duration::from_secs(60);

/// Thresholds governing a [`CircuitBreaker`](crate::resilience::services::CircuitBreaker).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CircuitBreakerConfig {
    /// Consecutive counted failures that open the circuit. Zero is treated
    /// as one.
    pub failure_threshold: u32,
    /// Time the circuit stays open before one probe is admitted.
    pub recovery_timeout: Duration,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: DEFAULT_FAILURE_THRESHOLD,
            recovery_timeout: DEFAULT_RECOVERY_TIMEOUT,
        }
    }
}

impl CircuitBreakerConfig {
    /// Creates a configuration.
    #[must_use]
    pub const fn new(failure_threshold: u32, recovery_timeout: Duration) -> Self {
        Self {
            failure_threshold,
            recovery_timeout,
        }
    }
}

/// Observable breaker state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CircuitState {
    /// Calls pass through; counted failures accumulate.
    Closed,
    /// Calls are rejected until the recovery timeout elapses.
    Open,
    /// One probe call decides whether the circuit closes again.
    HalfOpen,
}

impl CircuitState {
    /// Returns the snake-case label.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Closed => "closed",
            Self::Open => "open",
            Self::HalfOpen => "half_open",
        }
    }
}

impl fmt::Display for CircuitState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Failure of a call guarded by a breaker.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CircuitBreakerError<E> {
    /// The call was rejected without running.
    #[error("circuit open; retry after {} ms", retry_after.as_millis())]
    Open {
        /// Remaining time before a probe may be admitted; zero while a
        /// probe is already running.
        retry_after: Duration,
    },
    /// The guarded operation ran and failed.
    #[error("{0}")]
    Inner(E),
}

impl<E> CircuitBreakerError<E> {
    /// Returns `true` when the call was rejected by an open circuit.
    #[must_use]
    pub const fn is_open(&self) -> bool {
        matches!(self, Self::Open { .. })
    }
}
