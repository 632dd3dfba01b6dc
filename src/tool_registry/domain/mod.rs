//! Domain model for the MCP tool catalog.
//!
//! The tool registry domain models MCP server identity, transport
//! configuration, lifecycle and health, discovered tools with their rolling
//! execution metrics, and advertised resources. Infrastructure concerns
//! remain outside this boundary.

mod error;
mod filter;
mod health;
mod ids;
mod resource;
mod server;
mod tool;
mod transport;

pub use error::{ParseServerStatusError, ParseToolCategoryError, ToolRegistryDomainError};
pub use filter::{ServerFilter, ToolFilter};
pub use health::HealthReport;
pub use ids::{ServerId, ServerName, ToolKey, UserId};
pub use resource::Resource;
pub use server::{DEFAULT_SERVER_TIMEOUT, McpServer, PersistedServerData, ServerStatus};
pub use tool::{DEFAULT_TOOL_TIMEOUT, RateLimit, Tool, ToolCategory, ToolMetrics};
pub use transport::{McpTransport, NetworkTransportConfig, StdioTransportConfig, TransportKind};

pub(crate) use server::duration_to_millis;
