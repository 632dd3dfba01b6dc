//! Gateway orchestration.

mod gateway;
mod monitor;

pub use gateway::{DEFAULT_BATCH_CONCURRENCY, DEFAULT_HEALTH_INTERVAL, Gateway, GatewaySettings};
