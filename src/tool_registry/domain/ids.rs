//! Identifier and validated-name types for the tool registry.

use super::ToolRegistryDomainError;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Width of `mcp_servers.name`.
const MAX_SERVER_NAME_LENGTH: usize = 100;

/// Unique identifier for a registered MCP server.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ServerId(Uuid);

impl ServerId {
    /// Creates a new random server identifier.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Creates a server identifier from an existing UUID.
    #[must_use]
    pub const fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Returns the wrapped UUID.
    #[must_use]
    pub const fn into_inner(self) -> Uuid {
        self.0
    }
}

impl Default for ServerId {
    fn default() -> Self {
        Self::new()
    }
}

impl AsRef<Uuid> for ServerId {
    fn as_ref(&self) -> &Uuid {
        &self.0
    }
}

impl fmt::Display for ServerId {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(formatter, "{}", self.0)
    }
}

/// Lowercase server label of at most 100 `[a-z0-9_-]` characters.
///
/// Labels are display names only; two servers may share one.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ServerName(String);

const fn is_label_char(character: char) -> bool {
    matches!(character, 'a'..='z' | '0'..='9' | '_' | '-')
}

impl ServerName {
    /// Trims and lowercases `value` before checking it.
    ///
    /// # Errors
    ///
    /// [`ToolRegistryDomainError::EmptyServerName`],
    /// [`ToolRegistryDomainError::InvalidServerName`] or
    /// [`ToolRegistryDomainError::ServerNameTooLong`].
    pub fn new(value: impl Into<String>) -> Result<Self, ToolRegistryDomainError> {
        let label = value.into().trim().to_ascii_lowercase();
        match label.len() {
            0 => Err(ToolRegistryDomainError::EmptyServerName),
            _ if !label.chars().all(is_label_char) => {
                Err(ToolRegistryDomainError::InvalidServerName(label))
            }
            length if length > MAX_SERVER_NAME_LENGTH => {
                Err(ToolRegistryDomainError::ServerNameTooLong(label))
            }
            _ => Ok(Self(label)),
        }
    }

    /// The normalized label.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl AsRef<str> for ServerName {
    fn as_ref(&self) -> &str {
        self.as_str()
    }
}

impl fmt::Display for ServerName {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str(self.as_str())
    }
}

/// Opaque identifier of a gateway user.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(String);

impl UserId {
    /// Wraps a user identifier.
    #[must_use]
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// Returns the identifier as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str(self.as_str())
    }
}

/// Composite key of a tool: the owning server plus the tool name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ToolKey {
    /// Owning server.
    pub server_id: ServerId,
    /// Tool name, unique within the server.
    pub name: String,
}

impl ToolKey {
    /// Creates a tool key.
    #[must_use]
    pub fn new(server_id: ServerId, name: impl Into<String>) -> Self {
        Self {
            server_id,
            name: name.into(),
        }
    }
}

impl fmt::Display for ToolKey {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(formatter, "{}/{}", self.server_id, self.name)
    }
}
