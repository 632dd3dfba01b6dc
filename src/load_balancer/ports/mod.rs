//! Out-of-band health probing port.

use crate::load_balancer::domain::ToolInstance;
use async_trait::async_trait;

/// Decides whether an instance is healthy.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait InstanceProber: Send + Sync {
    /// Probes `instance`; `false` marks it unhealthy.
    async fn probe(&self, instance: &ToolInstance) -> bool;
}
