//! Application services for the tool catalog.

mod registry;

pub use registry::{HydrationSummary, ToolRegistry, ToolRegistryError, ToolRegistryResult};
