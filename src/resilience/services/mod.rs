//! Breaker and executor layers.

mod breaker;
mod layers;

pub use breaker::CircuitBreaker;
pub(crate) use layers::guard_outcome;
pub use layers::{BalancedExecutor, CircuitBreakerExecutor, RetryExecutor};
