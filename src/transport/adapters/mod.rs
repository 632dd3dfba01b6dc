//! Transport adapters: stdio, HTTP and the in-memory fake.

mod connector;
pub mod http;
pub mod memory;
pub mod stdio;

pub use connector::DefaultTransportConnector;
pub use http::HttpChannel;
pub use stdio::{DEFAULT_STOP_GRACE, StdioChannel};
