//! Instance selection over a shared, lock-protected instance set.

use crate::load_balancer::{
    domain::{BalancingStrategy, ToolInstance},
    ports::InstanceProber,
};
use futures::future::join_all;
use rand::distributions::{Distribution, WeightedIndex};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::sync::{Mutex, MutexGuard};
use thiserror::Error;
use tracing::{debug, info};

/// Errors raised by the balancer.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum LoadBalancerError {
    /// The instance lock was poisoned.
    #[error("load balancer lock poisoned: {0}")]
    Poisoned(String),
}

/// Result type for balancer operations.
pub type LoadBalancerResult<T> = Result<T, LoadBalancerError>;

struct BalancerState {
    instances: Vec<ToolInstance>,
    cursor: usize,
    rng: StdRng,
}

/// Picks one instance per call among those backing a logical tool.
///
/// Every selection and statistics update happens inside one lock
/// acquisition, so concurrent callers never lose updates.
pub struct LoadBalancer {
    strategy: BalancingStrategy,
    state: Mutex<BalancerState>,
}

impl LoadBalancer {
    /// Creates an empty balancer.
    #[must_use]
    pub fn new(strategy: BalancingStrategy) -> Self {
        Self::with_rng(strategy, StdRng::from_entropy())
    }

    /// Creates an empty balancer whose random strategies are reproducible.
    #[must_use]
    pub fn with_seed(strategy: BalancingStrategy, seed: u64) -> Self {
        Self::with_rng(strategy, StdRng::seed_from_u64(seed))
    }

    fn with_rng(strategy: BalancingStrategy, rng: StdRng) -> Self {
        Self {
            strategy,
            state: Mutex::new(BalancerState {
                instances: Vec::new(),
                cursor: 0,
                rng,
            }),
        }
    }

    /// Returns the selection strategy.
    #[must_use]
    pub const fn strategy(&self) -> BalancingStrategy {
        self.strategy
    }

    fn lock(&self) -> LoadBalancerResult<MutexGuard<'_, BalancerState>> {
        self.state
            .lock()
            .map_err(|err| LoadBalancerError::Poisoned(err.to_string()))
    }

    /// Adds an instance, replacing one with the same identifier.
    ///
    /// # Errors
    ///
    /// Returns an error when the lock is poisoned.
    pub fn add_instance(&self, instance: ToolInstance) -> LoadBalancerResult<()> {
        let mut state = self.lock()?;
        if let Some(existing) = find_mut(&mut state.instances, instance.instance_id()) {
            *existing = instance;
            return Ok(());
        }
        state.instances.push(instance);
        Ok(())
    }

    /// Removes an instance, returning it when present.
    ///
    /// # Errors
    ///
    /// Returns an error when the lock is poisoned.
    pub fn remove_instance(&self, instance_id: &str) -> LoadBalancerResult<Option<ToolInstance>> {
        let mut state = self.lock()?;
        let position = state
            .instances
            .iter()
            .position(|instance| instance.instance_id() == instance_id);
        Ok(position.map(|index| state.instances.remove(index)))
    }

    /// Flips an instance's health flag. Returns `false` for unknown ids.
    ///
    /// # Errors
    ///
    /// Returns an error when the lock is poisoned.
    pub fn set_health(&self, instance_id: &str, healthy: bool) -> LoadBalancerResult<bool> {
        let mut state = self.lock()?;
        let Some(instance) = find_mut(&mut state.instances, instance_id) else {
            return Ok(false);
        };
        if instance.is_healthy() != healthy {
            info!(instance = instance_id, healthy, "instance health changed");
        }
        instance.set_health(healthy);
        Ok(true)
    }

    /// Picks the next instance, or `None` when no instance is healthy.
    ///
    /// # Errors
    ///
    /// Returns an error when the lock is poisoned.
    pub fn get_next_instance(&self) -> LoadBalancerResult<Option<ToolInstance>> {
        let mut state = self.lock()?;
        Ok(self.pick(&mut state).and_then(|index| state.instances.get(index).cloned()))
    }

    /// Picks the next instance and counts a request in flight on it.
    ///
    /// Pair with [`LoadBalancer::record_response`].
    ///
    /// # Errors
    ///
    /// Returns an error when the lock is poisoned.
    pub fn acquire_next_instance(&self) -> LoadBalancerResult<Option<ToolInstance>> {
        let mut state = self.lock()?;
        let Some(index) = self.pick(&mut state) else {
            return Ok(None);
        };
        Ok(state.instances.get_mut(index).map(|instance| {
            instance.begin_request();
            instance.clone()
        }))
    }

    /// Counts a request in flight on a chosen instance.
    ///
    /// # Errors
    ///
    /// Returns an error when the lock is poisoned.
    pub fn begin_request(&self, instance_id: &str) -> LoadBalancerResult<bool> {
        let mut state = self.lock()?;
        Ok(find_mut(&mut state.instances, instance_id)
            .map(ToolInstance::begin_request)
            .is_some())
    }

    /// Releases an in-flight slot for a call that never reached the
    /// instance; no sample or counter is recorded.
    ///
    /// # Errors
    ///
    /// Returns an error when the lock is poisoned.
    pub fn cancel_request(&self, instance_id: &str) -> LoadBalancerResult<bool> {
        let mut state = self.lock()?;
        Ok(find_mut(&mut state.instances, instance_id)
            .map(ToolInstance::end_request)
            .is_some())
    }

    /// Records a finished call: ends its in-flight slot, appends the response
    /// time to the rolling window and bumps the success or error counter.
    ///
    /// # Errors
    ///
    /// Returns an error when the lock is poisoned.
    pub fn record_response(
        &self,
        instance_id: &str,
        response_time_ms: u64,
        success: bool,
    ) -> LoadBalancerResult<bool> {
        let mut state = self.lock()?;
        Ok(find_mut(&mut state.instances, instance_id)
            .map(|instance| instance.record_response(response_time_ms, success))
            .is_some())
    }

    /// Returns a snapshot of every instance.
    ///
    /// # Errors
    ///
    /// Returns an error when the lock is poisoned.
    pub fn instances(&self) -> LoadBalancerResult<Vec<ToolInstance>> {
        Ok(self.lock()?.instances.clone())
    }

    /// Probes every instance concurrently and applies the verdicts.
    ///
    /// Returns the number of healthy instances afterwards.
    ///
    /// # Errors
    ///
    /// Returns an error when the lock is poisoned.
    pub async fn probe_health(&self, prober: &dyn InstanceProber) -> LoadBalancerResult<usize> {
        let snapshot = self.instances()?;
        let verdicts = join_all(snapshot.iter().map(|instance| async move {
            (instance.instance_id().to_owned(), prober.probe(instance).await)
        }))
        .await;

        for (instance_id, healthy) in &verdicts {
            self.set_health(instance_id, *healthy)?;
        }
        let healthy = self
            .lock()?
            .instances
            .iter()
            .filter(|instance| instance.is_healthy())
            .count();
        debug!(probed = verdicts.len(), healthy, "instance probe pass finished");
        Ok(healthy)
    }

    fn pick(&self, state: &mut BalancerState) -> Option<usize> {
        let healthy: Vec<usize> = state
            .instances
            .iter()
            .enumerate()
            .filter(|(_, instance)| instance.is_healthy())
            .map(|(index, _)| index)
            .collect();
        if healthy.is_empty() {
            return None;
        }

        match self.strategy {
            BalancingStrategy::RoundRobin => {
                let slot = state.cursor.checked_rem(healthy.len())?;
                state.cursor = state.cursor.wrapping_add(1);
                healthy.get(slot).copied()
            }
            BalancingStrategy::Random => {
                let slot = state.rng.gen_range(0..healthy.len());
                healthy.get(slot).copied()
            }
            BalancingStrategy::Weighted => {
                let weights = healthy.iter().map(|&index| {
                    state.instances.get(index).map_or(0, ToolInstance::weight)
                });
                let weighted = WeightedIndex::new(weights)
                    .ok()
                    .map(|distribution| distribution.sample(&mut state.rng));
                let slot = weighted.unwrap_or_else(|| state.rng.gen_range(0..healthy.len()));
                healthy.get(slot).copied()
            }
            BalancingStrategy::LeastConnections => healthy.iter().copied().min_by_key(|&index| {
                state
                    .instances
                    .get(index)
                    .map_or((u32::MAX, u64::MAX), |instance| {
                        (instance.in_flight(), instance.success_count())
                    })
            }),
            BalancingStrategy::LeastResponseTime => {
                healthy.iter().copied().min_by(|&left, &right| {
                    let average = |index: usize| {
                        state
                            .instances
                            .get(index)
                            .map_or(f64::INFINITY, ToolInstance::average_response_time)
                    };
                    average(left).total_cmp(&average(right))
                })
            }
        }
    }
}

fn find_mut<'a>(instances: &'a mut [ToolInstance], instance_id: &str) -> Option<&'a mut ToolInstance> {
    instances
        .iter_mut()
        .find(|instance| instance.instance_id() == instance_id)
}
