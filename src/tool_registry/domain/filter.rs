//! Listing filters for servers and tools.

use super::{McpServer, ServerStatus, Tool, ToolCategory, TransportKind, UserId};
use std::collections::BTreeSet;

/// Filter applied by server listings.
///
/// Scalar fields match exactly; `tags` matches when the server carries every
/// requested tag. An empty filter matches everything.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ServerFilter {
    /// Required status.
    pub status: Option<ServerStatus>,
    /// Required transport kind.
    pub transport_kind: Option<TransportKind>,
    /// Required owner.
    pub owner_id: Option<UserId>,
    /// Tags the server must all carry.
    pub tags: BTreeSet<String>,
}

impl ServerFilter {
    /// Restricts to one status.
    #[must_use]
    pub const fn with_status(mut self, status: ServerStatus) -> Self {
        self.status = Some(status);
        self
    }

    /// Restricts to one transport kind.
    #[must_use]
    pub const fn with_transport_kind(mut self, kind: TransportKind) -> Self {
        self.transport_kind = Some(kind);
        self
    }

    /// Restricts to one owner.
    #[must_use]
    pub fn with_owner(mut self, owner_id: UserId) -> Self {
        self.owner_id = Some(owner_id);
        self
    }

    /// Requires every tag in `tags`.
    #[must_use]
    pub fn with_tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.tags = tags
            .into_iter()
            .map(|tag| tag.as_ref().trim().to_ascii_lowercase())
            .filter(|tag| !tag.is_empty())
            .collect();
        self
    }

    /// Returns whether `server` satisfies the filter.
    #[must_use]
    pub fn matches(&self, server: &McpServer) -> bool {
        self.status.is_none_or(|status| server.status() == status)
            && self
                .transport_kind
                .is_none_or(|kind| server.transport().kind() == kind)
            && self
                .owner_id
                .as_ref()
                .is_none_or(|owner| server.owner_id() == Some(owner))
            && server.has_all_tags(&self.tags)
    }
}

/// Filter applied by tool listings.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ToolFilter {
    /// Required category.
    pub category: Option<ToolCategory>,
    /// Tags the tool must all carry.
    pub tags: BTreeSet<String>,
}

impl ToolFilter {
    /// Restricts to one category.
    #[must_use]
    pub const fn with_category(mut self, category: ToolCategory) -> Self {
        self.category = Some(category);
        self
    }

    /// Requires every tag in `tags`.
    #[must_use]
    pub fn with_tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.tags = tags
            .into_iter()
            .map(|tag| tag.as_ref().trim().to_ascii_lowercase())
            .filter(|tag| !tag.is_empty())
            .collect();
        self
    }

    /// Returns whether `tool` satisfies the filter.
    #[must_use]
    pub fn matches(&self, tool: &Tool) -> bool {
        self.category
            .is_none_or(|category| tool.category() == Some(category))
            && self.tags.iter().all(|tag| tool.tags().contains(tag))
    }
}
