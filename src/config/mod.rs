//! TOML configuration for a gateway deployment.
//!
//! Every section is optional; missing values fall back to the defaults the
//! services use when constructed directly. [`GatewayConfig::load`] reads a
//! file, applies the `TOOLGATE_DATABASE_URL` override and validates the
//! result.

mod error;


pub use error::{ConfigError, ConfigResult};

use crate::{
    connection_pool::services::{
        DEFAULT_HEALTH_TIMEOUT, DEFAULT_MAX_BATCH_CONCURRENCY, PoolSettings,
    },
    gateway::{adapters::SecuritySettings, domain::ServerDefinition, services::GatewaySettings},
    resilience::domain::{CircuitBreakerConfig, DEFAULT_MAX_ATTEMPTS, RetryPolicy},
    tool_registry::domain::{DEFAULT_SERVER_TIMEOUT, UserId},
    transport::adapters::DEFAULT_STOP_GRACE,
};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;
use std::time::Duration;

/// Environment variable that overrides `storage.database_url`.
pub const DATABASE_URL_ENV: &str = "TOOLGATE_DATABASE_URL";

/// Environment variable naming the configuration file.
pub const CONFIG_PATH_ENV: &str = "TOOLGATE_CONFIG";

/// Root of a configuration file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GatewayConfig {
    /// Service-wide timings and limits.
    pub gateway: GatewaySection,
    /// Per-tool circuit breaker thresholds.
    pub circuit_breaker: CircuitBreakerSection,
    /// Retry schedule for retryable execution failures.
    pub retry: RetrySection,
    /// Authorisation rules.
    pub security: SecuritySection,
    /// Registry persistence.
    pub storage: StorageSection,
    /// Servers registered at startup.
    pub servers: Vec<ServerDefinition>,
}

/// `[gateway]`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GatewaySection {
    /// Seconds between background health passes.
    pub health_interval_seconds: u64,
    /// Deadline for a single health probe.
    pub health_timeout_ms: u64,
    /// Tool timeout applied to configured servers that do not set one.
    pub default_timeout_seconds: u64,
    /// Batch items executed at once.
    pub max_batch_concurrency: usize,
    /// Grace period between SIGTERM and SIGKILL for stdio servers.
    pub stop_grace_ms: u64,
}

impl Default for GatewaySection {
    fn default() -> Self {
        Self {
            health_interval_seconds: 30,
            health_timeout_ms: millis(DEFAULT_HEALTH_TIMEOUT),
            default_timeout_seconds: DEFAULT_SERVER_TIMEOUT.as_secs(),
            max_batch_concurrency: DEFAULT_MAX_BATCH_CONCURRENCY,
            stop_grace_ms: millis(DEFAULT_STOP_GRACE),
        }
    }
}

/// `[circuit_breaker]`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CircuitBreakerSection {
    /// Consecutive failures that open a circuit.
    pub failure_threshold: u32,
    /// Seconds an open circuit waits before a trial call.
    pub recovery_timeout_seconds: u64,
}

impl Default for CircuitBreakerSection {
    fn default() -> Self {
        let defaults = CircuitBreakerConfig::default();
        Self {
            failure_threshold: defaults.failure_threshold,
            recovery_timeout_seconds: defaults.recovery_timeout.as_secs(),
        }
    }
}

/// `[retry]`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrySection {
    /// Total attempts including the first; `1` disables retries.
    pub max_attempts: u32,
    /// Delay before the first retry.
    pub initial_delay_ms: u64,
    /// Cap on any single delay.
    pub max_delay_ms: u64,
}

impl Default for RetrySection {
    fn default() -> Self {
        let defaults = RetryPolicy::exponential();
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            initial_delay_ms: millis(defaults.initial_delay),
            max_delay_ms: millis(defaults.max_delay),
        }
    }
}

/// `[security]`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SecuritySection {
    /// Reject anonymous callers.
    pub require_authentication: bool,
    /// Users that manage every server.
    pub admin_users: BTreeSet<String>,
    /// Permissions per user.
    pub user_permissions: BTreeMap<String, BTreeSet<String>>,
}

impl Default for SecuritySection {
    fn default() -> Self {
        Self {
            require_authentication: true,
            admin_users: BTreeSet::new(),
            user_permissions: BTreeMap::new(),
        }
    }
}

/// Registry backend selection.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    /// Process-local maps; nothing survives a restart.
    #[default]
    Memory,
    /// `PostgreSQL` through Diesel.
    Postgres,
}

/// `[storage]`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageSection {
    /// Backend to use.
    pub backend: StorageBackend,
    /// Connection string for the postgres backend.
    pub database_url: Option<String>,
    /// Maximum pooled database connections.
    pub pool_size: u32,
    /// Read-through cache lifetime; `0` disables the cache.
    pub cache_ttl_seconds: u64,
}

impl Default for StorageSection {
    fn default() -> Self {
        Self {
            backend: StorageBackend::Memory,
            database_url: None,
            pool_size: 8,
            cache_ttl_seconds: 60,
        }
    }
}

impl GatewayConfig {
    /// Reads, overrides from the process environment, and validates `path`.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when the file cannot be read or parsed, or
    /// when validation fails.
    pub fn load(path: impl AsRef<Path>) -> ConfigResult<Self> {
        let path_ref = path.as_ref();
        let text = std::fs::read_to_string(path_ref).map_err(|source| ConfigError::Io {
            path: path_ref.to_path_buf(),
            source,
        })?;
        let mut config = Self::from_toml_str(&text)?;
        config.apply_overrides(|key| std::env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    /// Parses TOML without touching the environment or validating.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Parse`] for malformed input.
    pub fn from_toml_str(text: &str) -> ConfigResult<Self> {
        Ok(toml::from_str(text)?)
    }

    /// Applies environment overrides looked up through `lookup`.
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(url) = lookup(DATABASE_URL_ENV).filter(|url| !url.trim().is_empty()) {
            self.storage.database_url = Some(url);
        }
    }

    /// Checks ranges and cross-field consistency.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] naming the first offending field.
    pub fn validate(&self) -> ConfigResult<()> {
        let gateway = &self.gateway;
        let checks = [
            (
                gateway.health_interval_seconds == 0,
                "gateway.health_interval_seconds must be positive",
            ),
            (
                gateway.health_timeout_ms == 0,
                "gateway.health_timeout_ms must be positive",
            ),
            (
                gateway.default_timeout_seconds == 0,
                "gateway.default_timeout_seconds must be positive",
            ),
            (
                gateway.max_batch_concurrency == 0,
                "gateway.max_batch_concurrency must be positive",
            ),
            (
                self.circuit_breaker.failure_threshold == 0,
                "circuit_breaker.failure_threshold must be positive",
            ),
            (
                self.retry.max_attempts == 0,
                "retry.max_attempts must be positive",
            ),
            (
                self.retry.initial_delay_ms > self.retry.max_delay_ms,
                "retry.initial_delay_ms exceeds retry.max_delay_ms",
            ),
            (
                self.storage.pool_size == 0,
                "storage.pool_size must be positive",
            ),
        ];
        if let Some((_, message)) = checks.iter().find(|(failed, _)| *failed) {
            return Err(ConfigError::Invalid((*message).to_owned()));
        }

        if self.storage.backend == StorageBackend::Postgres && self.database_url().is_none() {
            return Err(ConfigError::Invalid(format!(
                "storage.database_url or {DATABASE_URL_ENV} is required for the postgres backend"
            )));
        }

        let mut names = BTreeSet::new();
        for server in &self.servers {
            if !names.insert(server.name.as_str()) {
                return Err(ConfigError::Invalid(format!(
                    "server '{}' is configured more than once",
                    server.name
                )));
            }
        }
        Ok(())
    }

    /// Non-empty database URL, if any.
    #[must_use]
    pub fn database_url(&self) -> Option<&str> {
        self.storage
            .database_url
            .as_deref()
            .filter(|url| !url.trim().is_empty())
    }

    /// Read-through cache lifetime, or `None` when caching is off.
    #[must_use]
    pub const fn cache_ttl(&self) -> Option<Duration> {
        match self.storage.cache_ttl_seconds {
            0 => None,
            seconds => Some(Duration::from_secs(seconds)),
        }
    }

    /// Gateway service settings.
    #[must_use]
    pub const fn gateway_settings(&self) -> GatewaySettings {
        GatewaySettings {
            circuit_breaker: CircuitBreakerConfig::new(
                self.circuit_breaker.failure_threshold,
                Duration::from_secs(self.circuit_breaker.recovery_timeout_seconds),
            ),
            health_interval: Duration::from_secs(self.gateway.health_interval_seconds),
            max_batch_concurrency: self.gateway.max_batch_concurrency,
        }
    }

    /// Connection pool settings.
    #[must_use]
    pub const fn pool_settings(&self) -> PoolSettings {
        PoolSettings {
            health_timeout: Duration::from_millis(self.gateway.health_timeout_ms),
            max_batch_concurrency: self.gateway.max_batch_concurrency,
        }
    }

    /// Grace period for stdio shutdown.
    #[must_use]
    pub const fn stop_grace(&self) -> Duration {
        Duration::from_millis(self.gateway.stop_grace_ms)
    }

    /// Retry schedule, or `None` when retries are disabled.
    #[must_use]
    pub const fn retry_policy(&self) -> Option<RetryPolicy> {
        if self.retry.max_attempts <= 1 {
            return None;
        }
        Some(
            RetryPolicy::exponential()
                .with_max_attempts(self.retry.max_attempts)
                .with_initial_delay(Duration::from_millis(self.retry.initial_delay_ms))
                .with_max_delay(Duration::from_millis(self.retry.max_delay_ms)),
        )
    }

    /// Authorisation settings for [`crate::gateway::adapters::DefaultSecurityPolicy`].
    #[must_use]
    pub fn security_settings(&self) -> SecuritySettings {
        SecuritySettings {
            require_authentication: self.security.require_authentication,
            admin_users: self
                .security
                .admin_users
                .iter()
                .map(UserId::new)
                .collect(),
            user_permissions: self
                .security
                .user_permissions
                .iter()
                .map(|(user, permissions)| (UserId::new(user), permissions.clone()))
                .collect(),
        }
    }

    /// Configured servers with the default timeout filled in.
    #[must_use]
    pub fn server_definitions(&self) -> Vec<ServerDefinition> {
        self.servers
            .iter()
            .cloned()
            .map(|definition| {
                if definition.timeout_seconds.is_some() {
                    return definition;
                }
                definition.with_timeout_seconds(self.gateway.default_timeout_seconds)
            })
            .collect()
    }
}

fn millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}
