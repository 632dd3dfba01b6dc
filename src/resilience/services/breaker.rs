//! Three-state circuit breaker with a single half-open probe.

use crate::resilience::domain::{CircuitBreakerConfig, CircuitBreakerError, CircuitState};
use std::future::Future;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::time::Instant;
use tracing::{info, warn};

#[derive(Debug)]
struct BreakerState {
    state: CircuitState,
    consecutive_failures: u32,
    opened_at: Option<Instant>,
    probe_running: bool,
}

enum Admission {
    Normal,
    Probe,
}

/// Guards calls to one dependency.
///
/// While open, calls fail fast with [`CircuitBreakerError::Open`] without
/// running. Once the recovery timeout has elapsed exactly one caller runs
/// as the probe; concurrent callers are rejected until it settles. State
/// transitions happen inside one lock acquisition and the lock is never
/// held across the guarded future.
#[derive(Debug)]
pub struct CircuitBreaker {
    name: String,
    config: CircuitBreakerConfig,
    state: Mutex<BreakerState>,
}

impl CircuitBreaker {
    /// Creates a closed breaker.
    #[must_use]
    pub fn new(name: impl Into<String>, config: CircuitBreakerConfig) -> Self {
        Self {
            name: name.into(),
            config,
            state: Mutex::new(BreakerState {
                state: CircuitState::Closed,
                consecutive_failures: 0,
                opened_at: None,
                probe_running: false,
            }),
        }
    }

    /// Returns the label used in logs.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the thresholds.
    #[must_use]
    pub const fn config(&self) -> CircuitBreakerConfig {
        self.config
    }

    /// Returns the current state without advancing it.
    #[must_use]
    pub fn state(&self) -> CircuitState {
        self.lock().state
    }

    /// Returns the consecutive counted failures since the last success.
    #[must_use]
    pub fn consecutive_failures(&self) -> u32 {
        self.lock().consecutive_failures
    }

    /// Forces the circuit closed.
    pub fn reset(&self) {
        let mut state = self.lock();
        state.state = CircuitState::Closed;
        state.consecutive_failures = 0;
        state.opened_at = None;
        state.probe_running = false;
    }

    /// Runs `operation`, counting every error as a failure.
    ///
    /// # Errors
    ///
    /// Returns [`CircuitBreakerError::Open`] without running `operation`
    /// while the circuit rejects calls, or [`CircuitBreakerError::Inner`]
    /// with the operation's own error.
    pub async fn call<F, Fut, T, E>(&self, operation: F) -> Result<T, CircuitBreakerError<E>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        self.call_classified(operation, |_| true).await
    }

    /// Runs `operation`; only errors for which `counts` returns `true` move
    /// the breaker towards open. Uncounted errors show the dependency is
    /// answering and are treated like successes.
    ///
    /// # Errors
    ///
    /// Returns [`CircuitBreakerError::Open`] without running `operation`
    /// while the circuit rejects calls, or [`CircuitBreakerError::Inner`]
    /// with the operation's own error.
    pub async fn call_classified<F, Fut, T, E, P>(
        &self,
        operation: F,
        counts: P,
    ) -> Result<T, CircuitBreakerError<E>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        P: FnOnce(&E) -> bool,
    {
        let admission = self.admit()?;
        let mut probe = ProbeGuard {
            breaker: self,
            armed: matches!(admission, Admission::Probe),
        };

        let result = operation().await;
        let failed = result.as_ref().err().is_some_and(counts);
        probe.armed = false;
        if failed {
            self.on_failure();
        } else {
            self.on_success();
        }
        result.map_err(CircuitBreakerError::Inner)
    }

    fn lock(&self) -> MutexGuard<'_, BreakerState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn admit<E>(&self) -> Result<Admission, CircuitBreakerError<E>> {
        let mut state = self.lock();
        match state.state {
            CircuitState::Closed => Ok(Admission::Normal),
            CircuitState::Open => {
                let elapsed = state.opened_at.map_or(Duration::MAX, |at| at.elapsed());
                if elapsed < self.config.recovery_timeout {
                    return Err(CircuitBreakerError::Open {
                        retry_after: self.config.recovery_timeout.saturating_sub(elapsed),
                    });
                }
                state.state = CircuitState::HalfOpen;
                state.probe_running = true;
                info!(breaker = %self.name, "circuit half-open; admitting probe");
                Ok(Admission::Probe)
            }
            CircuitState::HalfOpen if state.probe_running => Err(CircuitBreakerError::Open {
                retry_after: Duration::ZERO,
            }),
            CircuitState::HalfOpen => {
                state.probe_running = true;
                Ok(Admission::Probe)
            }
        }
    }

    fn on_success(&self) {
        let mut state = self.lock();
        if state.state != CircuitState::Closed {
            info!(breaker = %self.name, "circuit closed");
        }
        state.state = CircuitState::Closed;
        state.consecutive_failures = 0;
        state.opened_at = None;
        state.probe_running = false;
    }

    fn on_failure(&self) {
        let mut state = self.lock();
        state.consecutive_failures = state.consecutive_failures.saturating_add(1);
        let threshold = self.config.failure_threshold.max(1);
        let trips = match state.state {
            CircuitState::Closed => state.consecutive_failures >= threshold,
            CircuitState::HalfOpen | CircuitState::Open => true,
        };
        if trips {
            if state.state != CircuitState::Open {
                warn!(
                    breaker = %self.name,
                    failures = state.consecutive_failures,
                    "circuit opened"
                );
            }
            state.state = CircuitState::Open;
            state.opened_at = Some(Instant::now());
        }
        state.probe_running = false;
    }
}

/// Releases the probe slot when a probe future is dropped before settling,
/// so the next caller can probe instead.
struct ProbeGuard<'a> {
    breaker: &'a CircuitBreaker,
    armed: bool,
}

impl Drop for ProbeGuard<'_> {
    fn drop(&mut self) {
        if self.armed {
            self.breaker.lock().probe_running = false;
        }
    }
}
