//! Resources advertised by MCP servers.

use super::{ServerId, ToolRegistryDomainError};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A readable resource exposed by an MCP server. Keyed by `(server_id, uri)`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Resource {
    server_id: ServerId,
    uri: String,
    name: String,
    description: Option<String>,
    mime_type: Option<String>,
    metadata: Value,
    discovered_at: DateTime<Utc>,
}

impl Resource {
    /// Creates a resource. An empty display name falls back to the URI.
    ///
    /// # Errors
    ///
    /// Returns [`ToolRegistryDomainError::EmptyResourceUri`] when the URI is
    /// empty after trimming.
    pub fn new(
        server_id: ServerId,
        uri: impl Into<String>,
        name: impl Into<String>,
        discovered_at: DateTime<Utc>,
    ) -> Result<Self, ToolRegistryDomainError> {
        let normalized_uri = uri.into().trim().to_owned();
        if normalized_uri.is_empty() {
            return Err(ToolRegistryDomainError::EmptyResourceUri);
        }

        let trimmed_name = name.into().trim().to_owned();
        let display_name = if trimmed_name.is_empty() {
            normalized_uri.clone()
        } else {
            trimmed_name
        };

        Ok(Self {
            server_id,
            uri: normalized_uri,
            name: display_name,
            description: None,
            mime_type: None,
            metadata: Value::Null,
            discovered_at,
        })
    }

    /// Sets the description.
    #[must_use]
    pub fn with_description(mut self, description: Option<String>) -> Self {
        self.description = description;
        self
    }

    /// Sets the MIME type.
    #[must_use]
    pub fn with_mime_type(mut self, mime_type: Option<String>) -> Self {
        self.mime_type = mime_type;
        self
    }

    /// Sets free-form metadata.
    #[must_use]
    pub fn with_metadata(mut self, metadata: Value) -> Self {
        self.metadata = metadata;
        self
    }

    /// Returns the owning server.
    #[must_use]
    pub const fn server_id(&self) -> ServerId {
        self.server_id
    }

    /// Returns the resource URI.
    #[must_use]
    pub fn uri(&self) -> &str {
        &self.uri
    }

    /// Returns the display name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the description.
    #[must_use]
    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    /// Returns the MIME type.
    #[must_use]
    pub fn mime_type(&self) -> Option<&str> {
        self.mime_type.as_deref()
    }

    /// Returns the metadata payload.
    #[must_use]
    pub const fn metadata(&self) -> &Value {
        &self.metadata
    }

    /// Returns when the resource was discovered.
    #[must_use]
    pub const fn discovered_at(&self) -> DateTime<Utc> {
        self.discovered_at
    }
}
