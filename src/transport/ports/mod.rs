//! Port contracts for MCP transports.

mod channel;
mod client;

pub use channel::RpcChannel;
pub use client::{TransportClient, TransportConnector};
