//! Failure isolation around tool execution.
//!
//! [`services::CircuitBreaker`] is the stand-alone three-state guard.
//! [`ports::ToolExecutor`] is the seam for layering: the pool-bound
//! [`adapters::PoolExecutor`] sits innermost and
//! [`services::CircuitBreakerExecutor`], [`services::RetryExecutor`] and
//! [`services::BalancedExecutor`] wrap any other executor.

pub mod adapters;
pub mod domain;
pub mod ports;
pub mod services;

#[cfg(test)]
mod tests;
