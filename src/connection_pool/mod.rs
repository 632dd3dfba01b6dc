//! Bridge from registry entities to live transport connections.
//!
//! [`services::ConnectionPool`] starts and stops connections, discovers
//! catalogs, executes tool calls under a deadline and runs health probes.
//! Execution failures come back as [`domain::ExecutionOutcome`] values so
//! batches can collect mixed results.

pub mod domain;
pub mod services;

#[cfg(test)]
mod tests;
