//! Owner/admin authorisation with a parameter blocklist.

use crate::{
    gateway::{domain::ServerDefinition, ports::SecurityPolicy},
    tool_registry::domain::{McpServer, Tool, UserId},
};
use async_trait::async_trait;
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet};
use tracing::warn;

/// Substrings that reject a parameter payload, matched case-insensitively
/// against its JSON text.
pub const BLOCKED_PARAMETER_PATTERNS: &[&str] = &[
    "drop table",
    "delete from",
    "insert into",
    "union select",
    "truncate table",
    "'; --",
    "<script",
    "javascript:",
    "onerror=",
    "../",
    "..\\\\",
    "/etc/passwd",
    "eval(",
    "exec(",
    "__import__",
    "os.system",
    "subprocess.",
    "rm -rf",
];

/// Authorisation rules for a gateway deployment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SecuritySettings {
    /// Reject anonymous callers.
    pub require_authentication: bool,
    /// Users allowed to manage every server.
    pub admin_users: BTreeSet<UserId>,
    /// Permissions granted per user, checked against a tool's
    /// `required_permissions`.
    pub user_permissions: BTreeMap<UserId, BTreeSet<String>>,
}

impl Default for SecuritySettings {
    fn default() -> Self {
        Self {
            require_authentication: true,
            admin_users: BTreeSet::new(),
            user_permissions: BTreeMap::new(),
        }
    }
}

/// Default [`SecurityPolicy`].
///
/// With authentication disabled every caller, including the anonymous one,
/// is trusted and only the parameter blocklist applies. Otherwise:
/// registration needs any authenticated user; managing a server needs an
/// admin or its owner; reading a server needs an admin, its owner, or a
/// server without an owner; executing additionally needs every permission
/// the tool requires, which admins hold implicitly.
#[derive(Debug, Clone, Default)]
pub struct DefaultSecurityPolicy {
    settings: SecuritySettings,
}

impl DefaultSecurityPolicy {
    /// Creates a policy from `settings`.
    #[must_use]
    pub const fn new(settings: SecuritySettings) -> Self {
        Self { settings }
    }

    /// A policy that trusts every caller.
    #[must_use]
    pub fn permissive() -> Self {
        Self::new(SecuritySettings {
            require_authentication: false,
            ..SecuritySettings::default()
        })
    }

    /// Returns the settings.
    #[must_use]
    pub const fn settings(&self) -> &SecuritySettings {
        &self.settings
    }

    fn is_admin(&self, user: &UserId) -> bool {
        self.settings.admin_users.contains(user)
    }

    fn is_owner(server: &McpServer, user: &UserId) -> bool {
        server.owner_id() == Some(user)
    }

    fn decide(&self, user: Option<&UserId>, rule: impl FnOnce(&UserId) -> bool) -> bool {
        if !self.settings.require_authentication {
            return true;
        }
        user.is_some_and(rule)
    }

    fn holds_permissions(&self, user: &UserId, tool: &Tool) -> bool {
        let granted = self.settings.user_permissions.get(user);
        tool.required_permissions()
            .iter()
            .all(|permission| granted.is_some_and(|held| held.contains(permission)))
    }
}

/// Returns the first blocked pattern found in `parameters`.
#[must_use]
pub fn find_blocked_pattern(parameters: &Value) -> Option<&'static str> {
    let text = parameters.to_string().to_lowercase();
    BLOCKED_PARAMETER_PATTERNS
        .iter()
        .copied()
        .find(|pattern| text.contains(pattern))
}

#[async_trait]
impl SecurityPolicy for DefaultSecurityPolicy {
    async fn can_register_server<'a>(
        &self,
        user: Option<&'a UserId>,
        _definition: &ServerDefinition,
    ) -> bool {
        self.decide(user, |_| true)
    }

    async fn can_manage_server<'a>(&self, user: Option<&'a UserId>, server: &McpServer) -> bool {
        self.decide(user, |id| self.is_admin(id) || Self::is_owner(server, id))
    }

    async fn can_access_server<'a>(&self, user: Option<&'a UserId>, server: &McpServer) -> bool {
        self.decide(user, |id| {
            self.is_admin(id) || server.owner_id().is_none() || Self::is_owner(server, id)
        })
    }

    async fn can_execute_tool<'a>(
        &self,
        user: Option<&'a UserId>,
        server: &McpServer,
        tool: &Tool,
    ) -> bool {
        self.decide(user, |id| {
            if self.is_admin(id) {
                return true;
            }
            let visible = server.owner_id().is_none() || Self::is_owner(server, id);
            visible && self.holds_permissions(id, tool)
        })
    }

    async fn validate_tool_parameters<'a>(
        &self,
        user: Option<&'a UserId>,
        tool_name: &str,
        parameters: &Value,
    ) -> bool {
        let Some(pattern) = find_blocked_pattern(parameters) else {
            return true;
        };
        warn!(
            user = user.map(UserId::as_str),
            tool = tool_name,
            pattern,
            "blocked suspicious tool parameters"
        );
        false
    }
}
