//! Collaborators consulted by the gateway.

mod audit;
mod security;

#[cfg(test)]
pub use audit::MockAuditSink;
pub use audit::{AuditSink, AuditSinkError};
#[cfg(test)]
pub use security::MockSecurityPolicy;
pub use security::SecurityPolicy;
