//! Executor adapters over concrete backends.

mod http;
mod pool;

pub use http::HttpInstanceExecutor;
pub use pool::PoolExecutor;
