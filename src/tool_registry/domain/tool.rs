//! Tool catalog entries and their rolling execution metrics.

use super::{
    ParseToolCategoryError, ServerId, ToolKey, ToolRegistryDomainError,
    server::{duration_to_millis, normalize_tags},
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeSet;
use std::fmt;
use std::time::Duration;

/// Default timeout applied to a tool call when none is configured.
pub const DEFAULT_TOOL_TIMEOUT: Duration = Duration::from_secs(30);

/// Functional category of a tool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolCategory {
    /// Data access and retrieval.
    Data,
    /// Analysis and reporting.
    Analysis,
    /// Content generation.
    Generation,
    /// Format or shape transformation.
    Transformation,
    /// Third-party integrations.
    Integration,
    /// General utilities.
    Utility,
    /// Administrative operations.
    Admin,
}

impl ToolCategory {
    /// Returns the canonical string representation.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Data => "data",
            Self::Analysis => "analysis",
            Self::Generation => "generation",
            Self::Transformation => "transformation",
            Self::Integration => "integration",
            Self::Utility => "utility",
            Self::Admin => "admin",
        }
    }
}

impl fmt::Display for ToolCategory {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str(self.as_str())
    }
}

impl TryFrom<&str> for ToolCategory {
    type Error = ParseToolCategoryError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value.trim().to_ascii_lowercase().as_str() {
            "data" => Ok(Self::Data),
            "analysis" => Ok(Self::Analysis),
            "generation" => Ok(Self::Generation),
            "transformation" => Ok(Self::Transformation),
            "integration" => Ok(Self::Integration),
            "utility" => Ok(Self::Utility),
            "admin" => Ok(Self::Admin),
            _ => Err(ParseToolCategoryError(value.to_owned())),
        }
    }
}

/// Call budget for a tool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RateLimit {
    /// Maximum calls per window.
    pub max_calls: u32,
    /// Window length in seconds.
    pub per_seconds: u32,
}

/// Rolling execution counters for a tool.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ToolMetrics {
    /// Total recorded executions.
    pub execution_count: u64,
    /// Executions that succeeded.
    pub success_count: u64,
    /// Executions that failed.
    pub failure_count: u64,
    /// Running mean of successful execution durations.
    pub average_duration_ms: f64,
    /// When the tool last ran.
    pub last_executed: Option<DateTime<Utc>>,
}

impl ToolMetrics {
    /// Records one execution.
    ///
    /// Successes fold `duration_ms` into the running mean using the
    /// post-increment success count; failures only bump the counters.
    #[expect(
        clippy::float_arithmetic,
        clippy::cast_precision_loss,
        reason = "running mean of millisecond durations tolerates f64 rounding"
    )]
    pub fn record(&mut self, duration_ms: u64, success: bool, at: DateTime<Utc>) {
        self.execution_count = self.execution_count.saturating_add(1);
        self.last_executed = Some(at);

        if !success {
            self.failure_count = self.failure_count.saturating_add(1);
            return;
        }

        self.success_count = self.success_count.saturating_add(1);
        let count = self.success_count as f64;
        self.average_duration_ms =
            self.average_duration_ms.mul_add(count - 1.0, duration_ms as f64) / count;
    }
}

/// A tool exposed by exactly one MCP server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tool {
    server_id: ServerId,
    name: String,
    description: String,
    input_schema: Value,
    output_schema: Option<Value>,
    category: Option<ToolCategory>,
    tags: BTreeSet<String>,
    version: Option<String>,
    timeout_ms: u64,
    cacheable: bool,
    cache_ttl_seconds: Option<u64>,
    rate_limit: Option<RateLimit>,
    required_permissions: Vec<String>,
    required_params: Vec<String>,
    metrics: ToolMetrics,
    discovered_at: DateTime<Utc>,
}

impl Tool {
    /// Creates a tool with required fields and default options.
    ///
    /// # Errors
    ///
    /// Returns [`ToolRegistryDomainError::EmptyToolName`] when the name is
    /// empty after trimming.
    pub fn new(
        server_id: ServerId,
        name: impl Into<String>,
        description: impl Into<String>,
        input_schema: Value,
        discovered_at: DateTime<Utc>,
    ) -> Result<Self, ToolRegistryDomainError> {
        let normalized_name = name.into().trim().to_owned();
        if normalized_name.is_empty() {
            return Err(ToolRegistryDomainError::EmptyToolName);
        }

        Ok(Self {
            server_id,
            name: normalized_name,
            description: description.into().trim().to_owned(),
            input_schema,
            output_schema: None,
            category: None,
            tags: BTreeSet::new(),
            version: None,
            timeout_ms: duration_to_millis(DEFAULT_TOOL_TIMEOUT),
            cacheable: false,
            cache_ttl_seconds: None,
            rate_limit: None,
            required_permissions: Vec::new(),
            required_params: Vec::new(),
            metrics: ToolMetrics::default(),
            discovered_at,
        })
    }

    /// Sets the output schema.
    #[must_use]
    pub fn with_output_schema(mut self, output_schema: Value) -> Self {
        self.output_schema = Some(output_schema);
        self
    }

    /// Sets the category.
    #[must_use]
    pub const fn with_category(mut self, category: ToolCategory) -> Self {
        self.category = Some(category);
        self
    }

    /// Replaces the tag set.
    #[must_use]
    pub fn with_tags(mut self, tags: impl IntoIterator<Item = String>) -> Self {
        self.tags = normalize_tags(tags);
        self
    }

    /// Sets the tool version.
    #[must_use]
    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.version = Some(version.into());
        self
    }

    /// Sets the call timeout.
    ///
    /// # Errors
    ///
    /// Returns [`ToolRegistryDomainError::ZeroTimeout`] for a zero duration.
    pub fn with_timeout(mut self, timeout: Duration) -> Result<Self, ToolRegistryDomainError> {
        if timeout.is_zero() {
            return Err(ToolRegistryDomainError::ZeroTimeout);
        }
        self.timeout_ms = duration_to_millis(timeout);
        Ok(self)
    }

    /// Marks results as cacheable for `ttl_seconds`.
    #[must_use]
    pub const fn with_cache(mut self, ttl_seconds: u64) -> Self {
        self.cacheable = true;
        self.cache_ttl_seconds = Some(ttl_seconds);
        self
    }

    /// Sets the rate limit.
    #[must_use]
    pub const fn with_rate_limit(mut self, rate_limit: RateLimit) -> Self {
        self.rate_limit = Some(rate_limit);
        self
    }

    /// Replaces the permissions a caller must hold.
    #[must_use]
    pub fn with_required_permissions(mut self, values: impl IntoIterator<Item = String>) -> Self {
        self.required_permissions = values.into_iter().collect();
        self
    }

    /// Replaces the parameter names every call must supply.
    #[must_use]
    pub fn with_required_params(mut self, values: impl IntoIterator<Item = String>) -> Self {
        self.required_params = values.into_iter().collect();
        self
    }

    /// Replaces the metrics, used when restoring persisted state.
    #[must_use]
    pub fn with_metrics(mut self, metrics: ToolMetrics) -> Self {
        self.metrics = metrics;
        self
    }

    /// Returns the `(server_id, name)` key.
    #[must_use]
    pub fn key(&self) -> ToolKey {
        ToolKey::new(self.server_id, self.name.clone())
    }

    /// Returns the owning server.
    #[must_use]
    pub const fn server_id(&self) -> ServerId {
        self.server_id
    }

    /// Returns the tool name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the description.
    #[must_use]
    pub fn description(&self) -> &str {
        &self.description
    }

    /// Returns the input schema.
    #[must_use]
    pub const fn input_schema(&self) -> &Value {
        &self.input_schema
    }

    /// Returns the output schema.
    #[must_use]
    pub const fn output_schema(&self) -> Option<&Value> {
        self.output_schema.as_ref()
    }

    /// Returns the category.
    #[must_use]
    pub const fn category(&self) -> Option<ToolCategory> {
        self.category
    }

    /// Returns the tag set.
    #[must_use]
    pub const fn tags(&self) -> &BTreeSet<String> {
        &self.tags
    }

    /// Returns the version.
    #[must_use]
    pub fn version(&self) -> Option<&str> {
        self.version.as_deref()
    }

    /// Returns the call timeout.
    #[must_use]
    pub const fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    /// Returns whether results may be cached.
    #[must_use]
    pub const fn cacheable(&self) -> bool {
        self.cacheable
    }

    /// Returns the cache TTL in seconds.
    #[must_use]
    pub const fn cache_ttl_seconds(&self) -> Option<u64> {
        self.cache_ttl_seconds
    }

    /// Returns the rate limit.
    #[must_use]
    pub const fn rate_limit(&self) -> Option<RateLimit> {
        self.rate_limit
    }

    /// Returns the permissions a caller must hold.
    #[must_use]
    pub fn required_permissions(&self) -> &[String] {
        &self.required_permissions
    }

    /// Returns the parameter names every call must supply.
    #[must_use]
    pub fn required_params(&self) -> &[String] {
        &self.required_params
    }

    /// Returns the execution metrics.
    #[must_use]
    pub const fn metrics(&self) -> &ToolMetrics {
        &self.metrics
    }

    /// Returns when the tool was discovered.
    #[must_use]
    pub const fn discovered_at(&self) -> DateTime<Utc> {
        self.discovered_at
    }

    /// Returns the required parameters missing from `parameters`.
    #[must_use]
    pub fn missing_params(&self, parameters: &Value) -> Vec<String> {
        self.required_params
            .iter()
            .filter(|param| parameters.get(param.as_str()).is_none_or(Value::is_null))
            .cloned()
            .collect()
    }

    /// Returns whether `query` (already lowercased) occurs in the name or
    /// description.
    #[must_use]
    pub fn matches_query(&self, lowered_query: &str) -> bool {
        self.name.to_lowercase().contains(lowered_query)
            || self.description.to_lowercase().contains(lowered_query)
    }

    pub(crate) fn record_execution(&mut self, duration_ms: u64, success: bool, at: DateTime<Utc>) {
        self.metrics.record(duration_ms, success, at);
    }

    pub(crate) fn adopt_metrics(&mut self, previous: &Self) {
        self.metrics = previous.metrics.clone();
    }
}
