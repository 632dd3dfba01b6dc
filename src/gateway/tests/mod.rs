//! Unit tests for the gateway.

mod audit_tests;
mod gateway_tests;
