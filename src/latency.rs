// Latency Sampling Module
// Draws simulated response delays from a configured millisecond range.

use rand_distr::{Distribution, Uniform};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Closed range of simulated latency in milliseconds
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LatencyRange {
    /// Lower bound (ms)
    pub low: f64,
    /// Upper bound (ms)
    pub high: f64,
}

impl LatencyRange {
    /// Create a new latency range. Callers are expected to pass `0 <= low <= high`.
    pub fn new(low: f64, high: f64) -> Self {
        Self { low, high }
    }

    /// Fixed delay, identical on every sample
    pub fn fixed(ms: f64) -> Self {
        Self { low: ms, high: ms }
    }

    /// Instant range - no delay (for fast tests)
    pub fn instant() -> Self {
        Self::fixed(0.0)
    }

    /// Check that both bounds are finite, non-negative and ordered
    pub fn is_valid(&self) -> bool {
        self.low.is_finite() && self.high.is_finite() && self.low >= 0.0 && self.low <= self.high
    }

    /// Sample a delay in milliseconds, uniformly from `[low, high]`
    pub fn sample_ms(&self) -> f64 {
        if self.low >= self.high {
            return self.low;
        }

        match Uniform::new_inclusive(self.low, self.high) {
            Ok(uniform) => uniform.sample(&mut rand::rng()),
            Err(_) => self.low,
        }
    }

    /// Sample a delay. Each call draws independently.
    pub fn sample(&self) -> Duration {
        Duration::from_nanos((self.sample_ms().max(0.0) * 1_000_000.0) as u64)
    }
}

impl Default for LatencyRange {
    fn default() -> Self {
        Self::instant()
    }
}

/// Sleep for a freshly sampled delay, skipping the timer for zero delays
pub async fn simulate(range: &LatencyRange) -> Duration {
    let delay = range.sample();
    if !delay.is_zero() {
        tokio::time::sleep(delay).await;
    }
    delay
}
