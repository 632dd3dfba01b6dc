//! Authorised, audited front door for MCP tool servers.
//!
//! [`services::Gateway`] validates registrations, drives server lifecycle
//! through the connection pool, routes tool calls through per-tool circuit
//! breakers and records every operation with an [`ports::AuditSink`].
//! Authorisation decisions come from a [`ports::SecurityPolicy`];
//! [`adapters::DefaultSecurityPolicy`] covers the common owner/admin model.

pub mod adapters;
pub mod domain;
pub mod ports;
pub mod services;

#[cfg(test)]
mod tests;
