//! Value types for pooled execution.

mod error;
mod outcome;
mod request;

pub use error::{PoolError, PoolResult};
pub use outcome::{ExecutionOutcome, FailureKind};
pub use request::{BatchItem, ExecutionOptions};
