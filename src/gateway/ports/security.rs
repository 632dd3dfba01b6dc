//! Authorisation port.

use crate::{
    gateway::domain::ServerDefinition,
    tool_registry::domain::{McpServer, Tool, UserId},
};
use async_trait::async_trait;
use serde_json::Value;

/// Decides whether a caller may perform an operation.
///
/// `None` is the anonymous caller.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait SecurityPolicy: Send + Sync {
    /// May `user` register `definition`?
    async fn can_register_server<'a>(
        &self,
        user: Option<&'a UserId>,
        definition: &ServerDefinition,
    ) -> bool;

    /// May `user` start, stop, discover or delete `server`?
    async fn can_manage_server<'a>(&self, user: Option<&'a UserId>, server: &McpServer) -> bool;

    /// May `user` see `server` and its catalog?
    async fn can_access_server<'a>(&self, user: Option<&'a UserId>, server: &McpServer) -> bool;

    /// May `user` run `tool` on `server`?
    async fn can_execute_tool<'a>(&self, user: Option<&'a UserId>, server: &McpServer, tool: &Tool)
    -> bool;

    /// Are `parameters` acceptable for `tool_name`?
    async fn validate_tool_parameters<'a>(
        &self,
        user: Option<&'a UserId>,
        tool_name: &str,
        parameters: &Value,
    ) -> bool;
}
