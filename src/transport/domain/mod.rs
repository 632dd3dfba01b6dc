//! Wire-level value types for MCP transports.

mod descriptor;
mod error;
mod wire;

pub use descriptor::{
    InitializeResult, PeerInfo, ResourceDescriptor, ResourceListPage, ToolDescriptor,
    ToolListPage,
};
pub use error::{TransportError, TransportResult};
pub use wire::{
    JSONRPC_VERSION, JsonRpcError, JsonRpcNotification, JsonRpcRequest, JsonRpcResponse,
    MCP_PROTOCOL_VERSION, extract_json_body, into_tool_result, methods,
};
