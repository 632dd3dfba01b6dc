//! Pool service and descriptor mapping.

mod catalog;
mod pool;

pub use pool::{
    ConnectionPool, DEFAULT_HEALTH_TIMEOUT, DEFAULT_MAX_BATCH_CONCURRENCY, PoolSettings,
};
