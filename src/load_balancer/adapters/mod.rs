//! Instance prober adapters.

mod http;

pub use http::{DEFAULT_HEALTH_PATH, HttpInstanceProber};
