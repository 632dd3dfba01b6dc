//! Load-balancer value types.

mod instance;
mod strategy;

pub use instance::{RESPONSE_WINDOW, ToolInstance};
pub use strategy::{BalancingStrategy, ParseStrategyError};
