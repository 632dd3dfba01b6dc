//! Unit tests for the transport module.

mod http_tests;
mod memory_tests;
mod session_tests;
