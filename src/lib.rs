//! Toolgate: a gateway in front of Model Context Protocol tool servers.
//!
//! The crate registers MCP servers, keeps live sessions to them, discovers
//! and catalogues their tools, and executes tool calls on behalf of users
//! with authorisation, parameter screening, timeouts, circuit breaking,
//! load balancing and an audit trail.
//!
//! # Architecture
//!
//! Each module follows hexagonal architecture principles:
//!
//! - **Domain**: Pure data and rules with no infrastructure dependencies
//! - **Ports**: Abstract trait interfaces for external interactions
//! - **Adapters**: Concrete implementations of ports (database, processes, HTTP)
//! - **Services**: Orchestration over ports
//!
//! # Modules
//!
//! - [`transport`]: JSON-RPC sessions over stdio and HTTP
//! - [`tool_registry`]: Catalogue of servers, tools and resources
//! - [`connection_pool`]: Live connections, discovery, execution and probes
//! - [`load_balancer`]: Instance selection across equivalent tool replicas
//! - [`resilience`]: Circuit breaking, retries and executor layers
//! - [`gateway`]: The user-facing facade with security and auditing
//! - [`config`]: TOML configuration for the `toolgate` binary

pub mod config;
pub mod connection_pool;
pub mod gateway;
pub mod load_balancer;
pub mod resilience;
pub mod tool_registry;
pub mod transport;
