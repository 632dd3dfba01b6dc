//! Gateway requests, results, audit events and errors.

mod audit;
mod definition;
mod error;
mod execution;
mod request;
mod status;

pub use audit::{AuditEvent, AuditEventType, Severity};
pub use definition::ServerDefinition;
pub use error::{GatewayError, GatewayResult};
pub use execution::{
    ExecutionId, ExecutionStatus, PendingExecution, StartServerResponse, ToolExecution,
    ToolExecutionResult,
};
pub use request::ToolCallRequest;
pub use status::ServerStatusReport;
