//! Instance selection strategies.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// How a balancer picks among healthy instances.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BalancingStrategy {
    /// Cycle through healthy instances.
    #[default]
    RoundRobin,
    /// Uniform random pick.
    Random,
    /// Random pick proportional to weight.
    Weighted,
    /// Fewest requests in flight; ties go to fewer successes.
    LeastConnections,
    /// Lowest rolling mean response time.
    LeastResponseTime,
}

impl BalancingStrategy {
    /// Returns the configuration name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::RoundRobin => "round_robin",
            Self::Random => "random",
            Self::Weighted => "weighted",
            Self::LeastConnections => "least_connections",
            Self::LeastResponseTime => "least_response_time",
        }
    }
}

impl fmt::Display for BalancingStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Unknown strategy name.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown balancing strategy: {0}")]
pub struct ParseStrategyError(pub String);

impl TryFrom<&str> for BalancingStrategy {
    type Error = ParseStrategyError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value.trim().to_ascii_lowercase().as_str() {
            "round_robin" => Ok(Self::RoundRobin),
            "random" => Ok(Self::Random),
            "weighted" => Ok(Self::Weighted),
            "least_connections" => Ok(Self::LeastConnections),
            "least_response_time" => Ok(Self::LeastResponseTime),
            _ => Err(ParseStrategyError(value.to_owned())),
        }
    }
}
