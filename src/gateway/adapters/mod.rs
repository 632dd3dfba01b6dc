//! Default security and audit collaborators.

mod audit;
mod security;

pub use audit::{InMemoryAuditSink, TracingAuditSink};
pub use security::{
    BLOCKED_PARAMETER_PATTERNS, DefaultSecurityPolicy, SecuritySettings, find_blocked_pattern,
};
