//! Mapping of discovery descriptors onto registry entities.

use crate::{
    tool_registry::domain::{
        McpServer, RateLimit, Resource, Tool, ToolCategory, ToolRegistryDomainError,
    },
    transport::domain::{ResourceDescriptor, ToolDescriptor},
};
use chrono::{DateTime, Utc};
use serde_json::Value;
use std::time::Duration;

const DEFAULT_CACHE_TTL_SECONDS: u64 = 300;

/// Builds a [`Tool`] from a descriptor.
///
/// The tool inherits the server timeout unless its metadata carries
/// `timeout_seconds`; required parameters fall back to the schema's
/// `required` list.
pub(crate) fn tool_from_descriptor(
    server: &McpServer,
    descriptor: ToolDescriptor,
    discovered_at: DateTime<Utc>,
) -> Result<Tool, ToolRegistryDomainError> {
    let metadata = descriptor.metadata.unwrap_or(Value::Null);
    let required_params = string_list(&metadata, "required_params")
        .or_else(|| string_list(&descriptor.input_schema, "required"))
        .unwrap_or_default();

    let mut tool = Tool::new(
        server.id(),
        descriptor.name,
        descriptor.description.unwrap_or_default(),
        descriptor.input_schema,
        discovered_at,
    )?
    .with_timeout(server.timeout())?
    .with_required_params(required_params);

    if let Some(schema) = descriptor.output_schema {
        tool = tool.with_output_schema(schema);
    }
    if let Some(category) = metadata
        .get("category")
        .and_then(Value::as_str)
        .and_then(|raw| ToolCategory::try_from(raw).ok())
    {
        tool = tool.with_category(category);
    }
    if let Some(tags) = string_list(&metadata, "tags") {
        tool = tool.with_tags(tags);
    }
    if let Some(version) = metadata.get("version").and_then(Value::as_str) {
        tool = tool.with_version(version);
    }
    if let Some(seconds) = metadata
        .get("timeout_seconds")
        .and_then(Value::as_u64)
        .filter(|seconds| *seconds > 0)
    {
        tool = tool.with_timeout(Duration::from_secs(seconds))?;
    }
    if let Some(permissions) = string_list(&metadata, "required_permissions") {
        tool = tool.with_required_permissions(permissions);
    }
    if metadata.get("cacheable").and_then(Value::as_bool) == Some(true) {
        let ttl = metadata
            .get("cache_ttl")
            .and_then(Value::as_u64)
            .unwrap_or(DEFAULT_CACHE_TTL_SECONDS);
        tool = tool.with_cache(ttl);
    }
    if let Some(rate_limit) = rate_limit(&metadata) {
        tool = tool.with_rate_limit(rate_limit);
    }
    Ok(tool)
}

/// Builds a [`Resource`] from a descriptor.
pub(crate) fn resource_from_descriptor(
    server: &McpServer,
    descriptor: ResourceDescriptor,
    discovered_at: DateTime<Utc>,
) -> Result<Resource, ToolRegistryDomainError> {
    let mut resource =
        Resource::new(server.id(), descriptor.uri, descriptor.name, discovered_at)?
            .with_description(descriptor.description)
            .with_mime_type(descriptor.mime_type);
    if let Some(metadata) = descriptor.metadata {
        resource = resource.with_metadata(metadata);
    }
    Ok(resource)
}

fn string_list(value: &Value, key: &str) -> Option<Vec<String>> {
    value.get(key).and_then(Value::as_array).map(|items| {
        items
            .iter()
            .filter_map(Value::as_str)
            .map(str::to_owned)
            .collect()
    })
}

fn rate_limit(metadata: &Value) -> Option<RateLimit> {
    let limit = metadata.get("rate_limit")?;
    let read = |key: &str| {
        limit
            .get(key)
            .and_then(Value::as_u64)
            .and_then(|raw| u32::try_from(raw).ok())
    };
    Some(RateLimit {
        max_calls: read("max_calls")?,
        per_seconds: read("per_seconds")?,
    })
}
