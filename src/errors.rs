// Error Simulation Module
// Decides per request whether to simulate a failure, steering the observed
// error rate toward a configured target frequency.

use crate::value::Value;
use rand::Rng;
use serde_json::json;
use std::sync::atomic::{AtomicU64, Ordering};

/// Counter updates must never be lost and the error count must never be seen
/// ahead of the request count, so every access is sequentially consistent.
const ORDERING: Ordering = Ordering::SeqCst;

/// Configured simulated error response
#[derive(Debug, Clone, PartialEq)]
pub struct ErrorPolicy {
    /// HTTP status code returned for a simulated error
    pub status_code: u16,
    /// Normalized JSON body returned for a simulated error
    pub body: Value,
    /// Desired long-run proportion of failing requests (0.0-1.0)
    pub target_frequency: f64,
}

impl ErrorPolicy {
    pub fn new(status_code: u16, body: Value, target_frequency: f64) -> Self {
        Self {
            status_code,
            body,
            target_frequency,
        }
    }

    /// Policy that never fires
    pub fn none() -> Self {
        Self::new(500, json!({"error": "Simulated error"}), 0.0)
    }

    pub fn with_target_frequency(mut self, frequency: f64) -> Self {
        self.target_frequency = frequency;
        self
    }
}

impl Default for ErrorPolicy {
    fn default() -> Self {
        Self::none()
    }
}

/// Adaptive error controller.
///
/// Instead of flipping an independent coin per request, the simulator compares
/// the error rate observed so far with the target and biases the next decision:
/// 1.5x the target when running below it, 0.5x when running above it. Short test
/// runs therefore land close to the configured frequency.
///
/// The adjusted probability is not clamped. With a target above 2/3 the
/// "below target" branch exceeds 1.0 and always fires.
#[derive(Debug)]
pub struct ErrorSimulator {
    target_frequency: f64,
    total_requests: AtomicU64,
    total_errors: AtomicU64,
}

impl ErrorSimulator {
    pub fn new(target_frequency: f64) -> Self {
        Self {
            target_frequency,
            total_requests: AtomicU64::new(0),
            total_errors: AtomicU64::new(0),
        }
    }

    pub fn from_policy(policy: &ErrorPolicy) -> Self {
        Self::new(policy.target_frequency)
    }

    /// Decide whether the current request should simulate an error.
    ///
    /// Safe to call from many tasks at once. The error count read here may be
    /// stale relative to concurrent callers; the controller tolerates that.
    pub fn should_error(&self) -> bool {
        let requests = self.total_requests.fetch_add(1, ORDERING) + 1;
        let errors = self.total_errors.load(ORDERING);

        let observed_rate = errors as f64 / requests as f64;
        let adjusted = adjusted_probability(observed_rate, self.target_frequency);

        let roll: f64 = rand::rng().random();
        let fire = roll < adjusted;
        if fire {
            self.total_errors.fetch_add(1, ORDERING);
        }
        fire
    }

    /// Error rate observed so far, or 0.0 before the first request
    pub fn current_error_rate(&self) -> f64 {
        // Errors first: every counted error has its request already counted.
        let errors = self.total_errors.load(ORDERING);
        let requests = self.total_requests.load(ORDERING);
        if requests == 0 {
            return 0.0;
        }
        errors.min(requests) as f64 / requests as f64
    }

    pub fn target_frequency(&self) -> f64 {
        self.target_frequency
    }

    pub fn total_requests(&self) -> u64 {
        self.total_requests.load(ORDERING)
    }

    pub fn total_errors(&self) -> u64 {
        self.total_errors.load(ORDERING)
    }
}

/// Probability used for the next decision given the rate observed so far
pub fn adjusted_probability(observed_rate: f64, target: f64) -> f64 {
    if observed_rate < target {
        target * 1.5
    } else if observed_rate > target {
        target * 0.5
    } else {
        target
    }
}
