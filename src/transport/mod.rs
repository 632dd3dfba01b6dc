//! Live connections to MCP servers.
//!
//! A [`ports::RpcChannel`] moves JSON-RPC frames over stdio or HTTP;
//! [`services::McpSession`] layers the MCP handshake and catalog calls on
//! top and is exposed to the rest of the crate as a
//! [`ports::TransportClient`].

pub mod adapters;
pub mod domain;
pub mod ports;
pub mod services;

#[cfg(test)]
mod tests;
