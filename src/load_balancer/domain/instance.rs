//! One physical endpoint backing a logical tool.

use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

/// Number of response-time samples kept per instance.
pub const RESPONSE_WINDOW: usize = 100;

/// A balanced instance with its rolling statistics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolInstance {
    instance_id: String,
    url: String,
    weight: u32,
    healthy: bool,
    response_times: VecDeque<u64>,
    success_count: u64,
    error_count: u64,
    in_flight: u32,
}

impl ToolInstance {
    /// Creates a healthy instance with weight 1.
    #[must_use]
    pub fn new(instance_id: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            instance_id: instance_id.into(),
            url: url.into(),
            weight: 1,
            healthy: true,
            response_times: VecDeque::with_capacity(RESPONSE_WINDOW),
            success_count: 0,
            error_count: 0,
            in_flight: 0,
        }
    }

    /// Sets the relative selection weight.
    #[must_use]
    pub const fn with_weight(mut self, weight: u32) -> Self {
        self.weight = weight;
        self
    }

    /// Sets the health flag.
    #[must_use]
    pub const fn with_health(mut self, healthy: bool) -> Self {
        self.healthy = healthy;
        self
    }

    /// Returns the instance identifier.
    #[must_use]
    pub fn instance_id(&self) -> &str {
        &self.instance_id
    }

    /// Returns the endpoint URL.
    #[must_use]
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Returns the selection weight.
    #[must_use]
    pub const fn weight(&self) -> u32 {
        self.weight
    }

    /// Returns whether the last probe passed.
    #[must_use]
    pub const fn is_healthy(&self) -> bool {
        self.healthy
    }

    /// Returns the cumulative success count.
    #[must_use]
    pub const fn success_count(&self) -> u64 {
        self.success_count
    }

    /// Returns the cumulative error count.
    #[must_use]
    pub const fn error_count(&self) -> u64 {
        self.error_count
    }

    /// Returns the number of requests currently running.
    #[must_use]
    pub const fn in_flight(&self) -> u32 {
        self.in_flight
    }

    /// Returns the samples in the rolling window, oldest first.
    pub fn response_times(&self) -> impl Iterator<Item = u64> + '_ {
        self.response_times.iter().copied()
    }

    /// Mean of the rolling window in milliseconds, 0 when empty.
    #[must_use]
    #[expect(
        clippy::float_arithmetic,
        clippy::cast_precision_loss,
        reason = "window means of millisecond samples tolerate f64 rounding"
    )]
    pub fn average_response_time(&self) -> f64 {
        if self.response_times.is_empty() {
            return 0.0;
        }
        let total: u64 = self.response_times.iter().sum();
        total as f64 / self.response_times.len() as f64
    }

    /// Errors over all recorded calls, 0 when none.
    #[must_use]
    #[expect(
        clippy::float_arithmetic,
        clippy::cast_precision_loss,
        reason = "ratio of call counters"
    )]
    pub fn error_rate(&self) -> f64 {
        let total = self.success_count.saturating_add(self.error_count);
        if total == 0 {
            return 0.0;
        }
        self.error_count as f64 / total as f64
    }

    pub(crate) const fn set_health(&mut self, healthy: bool) {
        self.healthy = healthy;
    }

    pub(crate) const fn begin_request(&mut self) {
        self.in_flight = self.in_flight.saturating_add(1);
    }

    pub(crate) const fn end_request(&mut self) {
        self.in_flight = self.in_flight.saturating_sub(1);
    }

    /// Folds one finished call into the window and counters.
    pub(crate) fn record_response(&mut self, response_time_ms: u64, success: bool) {
        self.in_flight = self.in_flight.saturating_sub(1);
        if self.response_times.len() >= RESPONSE_WINDOW {
            self.response_times.pop_front();
        }
        self.response_times.push_back(response_time_ms);
        if success {
            self.success_count = self.success_count.saturating_add(1);
        } else {
            self.error_count = self.error_count.saturating_add(1);
        }
    }
}
