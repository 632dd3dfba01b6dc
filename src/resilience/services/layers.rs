//! Composable [`ToolExecutor`] layers.

use crate::{
    connection_pool::domain::{ExecutionOptions, ExecutionOutcome, FailureKind},
    load_balancer::services::LoadBalancer,
    resilience::{
        domain::{CircuitBreakerConfig, CircuitBreakerError, RetryPolicy},
        ports::{InstanceExecutor, ToolExecutor},
        services::CircuitBreaker,
    },
    tool_registry::domain::{ServerId, Tool},
};
use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Mutex, PoisonError};
use tracing::{debug, warn};

fn counts_as_fault(outcome: &ExecutionOutcome) -> bool {
    outcome.failure_kind().is_some_and(FailureKind::is_fault)
}

/// Runs an outcome-producing future under `breaker`, counting only fault
/// failures and turning a rejection into a [`FailureKind::CircuitOpen`]
/// outcome.
pub(crate) async fn guard_outcome<F>(breaker: &CircuitBreaker, call: F) -> ExecutionOutcome
where
    F: Future<Output = ExecutionOutcome>,
{
    let guarded = breaker
        .call_classified(
            || async move {
                let outcome = call.await;
                if outcome.is_success() { Ok(outcome) } else { Err(outcome) }
            },
            counts_as_fault,
        )
        .await;
    match guarded {
        Ok(outcome) | Err(CircuitBreakerError::Inner(outcome)) => outcome,
        Err(CircuitBreakerError::Open { retry_after }) => {
            debug!(breaker = breaker.name(), "call rejected by open circuit");
            ExecutionOutcome::failure(
                FailureKind::CircuitOpen,
                format!(
                    "circuit '{}' is open; retry after {} ms",
                    breaker.name(),
                    retry_after.as_millis()
                ),
                0,
            )
        }
    }
}

/// Fails fast once the wrapped executor keeps faulting.
pub struct CircuitBreakerExecutor {
    inner: Arc<dyn ToolExecutor>,
    breaker: Arc<CircuitBreaker>,
}

impl CircuitBreakerExecutor {
    /// Wraps `inner` with its own breaker.
    #[must_use]
    pub fn new(inner: Arc<dyn ToolExecutor>, name: &str, config: CircuitBreakerConfig) -> Self {
        Self::with_breaker(inner, Arc::new(CircuitBreaker::new(name, config)))
    }

    /// Wraps `inner` with a shared breaker.
    #[must_use]
    pub const fn with_breaker(inner: Arc<dyn ToolExecutor>, breaker: Arc<CircuitBreaker>) -> Self {
        Self { inner, breaker }
    }

    /// Returns the breaker guarding this layer.
    #[must_use]
    pub const fn breaker(&self) -> &Arc<CircuitBreaker> {
        &self.breaker
    }
}

#[async_trait]
impl ToolExecutor for CircuitBreakerExecutor {
    async fn execute(
        &self,
        server_id: ServerId,
        tool: &Tool,
        parameters: Value,
        options: ExecutionOptions,
    ) -> ExecutionOutcome {
        let call = self.inner.execute(server_id, tool, parameters, options);
        guard_outcome(&self.breaker, call).await
    }
}

/// Retries retryable failures with exponential backoff.
pub struct RetryExecutor {
    inner: Arc<dyn ToolExecutor>,
    policy: RetryPolicy,
}

impl RetryExecutor {
    /// Wraps `inner` with `policy`.
    #[must_use]
    pub const fn new(inner: Arc<dyn ToolExecutor>, policy: RetryPolicy) -> Self {
        Self { inner, policy }
    }
}

#[async_trait]
impl ToolExecutor for RetryExecutor {
    async fn execute(
        &self,
        server_id: ServerId,
        tool: &Tool,
        parameters: Value,
        options: ExecutionOptions,
    ) -> ExecutionOutcome {
        let attempts = self.policy.attempts();
        let mut attempt = 1;
        loop {
            let outcome = self
                .inner
                .execute(server_id, tool, parameters.clone(), options)
                .await;
            let retryable = outcome.failure_kind().is_some_and(FailureKind::is_retryable);
            if !retryable || attempt >= attempts {
                return outcome;
            }

            let delay = self.policy.delay_for_retry(attempt - 1);
            debug!(
                %server_id,
                tool = tool.name(),
                attempt,
                delay_ms = delay.as_millis(),
                "retrying tool call"
            );
            tokio::time::sleep(delay).await;
            attempt += 1;
        }
    }
}

/// Spreads calls over the instances of a load balancer, each instance
/// guarded by its own breaker.
pub struct BalancedExecutor {
    balancer: Arc<LoadBalancer>,
    executor: Arc<dyn InstanceExecutor>,
    breaker_config: CircuitBreakerConfig,
    breakers: Mutex<HashMap<String, Arc<CircuitBreaker>>>,
}

impl BalancedExecutor {
    /// Routes calls through `balancer` to `executor`.
    #[must_use]
    pub fn new(
        balancer: Arc<LoadBalancer>,
        executor: Arc<dyn InstanceExecutor>,
        breaker_config: CircuitBreakerConfig,
    ) -> Self {
        Self {
            balancer,
            executor,
            breaker_config,
            breakers: Mutex::new(HashMap::new()),
        }
    }

    /// Returns the balancer.
    #[must_use]
    pub const fn balancer(&self) -> &Arc<LoadBalancer> {
        &self.balancer
    }

    /// Returns the breaker guarding `instance_id`, creating it on first use.
    #[must_use]
    pub fn breaker_for(&self, instance_id: &str) -> Arc<CircuitBreaker> {
        let mut breakers = self.breakers.lock().unwrap_or_else(PoisonError::into_inner);
        Arc::clone(breakers.entry(instance_id.to_owned()).or_insert_with(|| {
            Arc::new(CircuitBreaker::new(
                format!("instance:{instance_id}"),
                self.breaker_config,
            ))
        }))
    }
}

#[async_trait]
impl ToolExecutor for BalancedExecutor {
    async fn execute(
        &self,
        _server_id: ServerId,
        tool: &Tool,
        parameters: Value,
        options: ExecutionOptions,
    ) -> ExecutionOutcome {
        let instance = match self.balancer.acquire_next_instance() {
            Ok(Some(instance)) => instance,
            Ok(None) => {
                return ExecutionOutcome::failure(
                    FailureKind::Unavailable,
                    format!("no healthy instance for tool '{}'", tool.name()),
                    0,
                );
            }
            Err(err) => {
                return ExecutionOutcome::failure(FailureKind::Unavailable, err.to_string(), 0);
            }
        };

        let mut slot = InFlightSlot {
            balancer: &self.balancer,
            instance_id: instance.instance_id(),
            held: true,
        };
        let breaker = self.breaker_for(instance.instance_id());
        let call = self.executor.execute_on(&instance, tool, parameters, options);
        let outcome = guard_outcome(&breaker, call).await;

        if outcome.failure_kind() != Some(FailureKind::CircuitOpen) {
            slot.held = false;
            let recorded = self.balancer.record_response(
                instance.instance_id(),
                outcome.duration_ms(),
                outcome.is_success(),
            );
            if let Err(err) = recorded {
                warn!(instance = instance.instance_id(), %err, "instance statistics not recorded");
            }
        }
        outcome
    }
}

/// In-flight count taken by `acquire_next_instance`; released on drop unless
/// a response was recorded.
struct InFlightSlot<'a> {
    balancer: &'a LoadBalancer,
    instance_id: &'a str,
    held: bool,
}

impl Drop for InFlightSlot<'_> {
    fn drop(&mut self) {
        if !self.held {
            return;
        }
        if let Err(err) = self.balancer.cancel_request(self.instance_id) {
            warn!(instance = self.instance_id, %err, "in-flight slot not released");
        }
    }
}
