//! Breaker and retry configuration types.

mod breaker;
mod retry;

pub use breaker::{
    CircuitBreakerConfig, CircuitBreakerError, CircuitState, DEFAULT_FAILURE_THRESHOLD,
    DEFAULT_RECOVERY_TIMEOUT,
};
pub use retry::{DEFAULT_MAX_ATTEMPTS, RetryPolicy};
