//! Statistics module for tracking real-time metrics.
//!
//! This module provides thread-safe atomic counters and statistics
//! collection for monitoring the simulator while it serves requests.

use crate::errors::ErrorSimulator;
use crate::responses::Resolved;
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};
use std::time::{Duration, Instant};

/// Relaxed ordering for stats - we don't need strict ordering guarantees
const ORDERING: Ordering = Ordering::Relaxed;

/// Distinct paths counted individually before new ones share a bucket
pub const MAX_TRACKED_PATHS: usize = 256;

/// Bucket for paths seen after [`MAX_TRACKED_PATHS`] is reached
pub const OTHER_PATHS: &str = "<other>";

/// Width of the requests-per-second window
const RPS_WINDOW: Duration = Duration::from_secs(60);

/// Global statistics tracker for the simulator.
#[derive(Debug)]
pub struct Stats {
    /// Server start time
    start_time: Instant,

    // Request counters
    /// Total number of requests dispatched
    pub total_requests: AtomicU64,
    /// Currently active (in-flight) requests
    pub active_requests: AtomicU64,
    /// Total streaming requests
    pub streaming_requests: AtomicU64,
    /// Total non-streaming requests
    pub non_streaming_requests: AtomicU64,

    // Outcome counters
    /// Requests answered with the configured error response
    pub simulated_errors: AtomicU64,
    /// Requests answered with a 500 because the body could not be encoded
    pub internal_errors: AtomicU64,
    /// Requests answered from a configured override
    pub override_hits: AtomicU64,
    /// Overrides whose text was not valid JSON
    pub invalid_overrides: AtomicU64,
    /// Streams dropped before the terminal frame
    pub disconnects: AtomicU64,

    // Per-path request counts, keyed by normalized path
    path_requests: RwLock<HashMap<String, u64>>,

    // Latency tracking (in microseconds)
    /// Total latency for calculating average
    total_latency_us: AtomicU64,
    /// Count of completed requests (for average calculation)
    completed_requests: AtomicU64,
    /// Minimum latency seen
    min_latency_us: AtomicU64,
    /// Maximum latency seen
    max_latency_us: AtomicU64,

    // Rolling window for RPS calculation
    request_times: RwLock<VecDeque<Instant>>,
}

impl Default for Stats {
    fn default() -> Self {
        Self::new()
    }
}

impl Stats {
    /// Create a new Stats instance
    pub fn new() -> Self {
        Self {
            start_time: Instant::now(),
            total_requests: AtomicU64::new(0),
            active_requests: AtomicU64::new(0),
            streaming_requests: AtomicU64::new(0),
            non_streaming_requests: AtomicU64::new(0),
            simulated_errors: AtomicU64::new(0),
            internal_errors: AtomicU64::new(0),
            override_hits: AtomicU64::new(0),
            invalid_overrides: AtomicU64::new(0),
            disconnects: AtomicU64::new(0),
            path_requests: RwLock::new(HashMap::new()),
            total_latency_us: AtomicU64::new(0),
            completed_requests: AtomicU64::new(0),
            min_latency_us: AtomicU64::new(u64::MAX),
            max_latency_us: AtomicU64::new(0),
            request_times: RwLock::new(VecDeque::new()),
        }
    }

    /// Record the start of a new request. `path` should already be
    /// normalized so equivalent paths share a counter.
    pub fn record_request_start(&self, path: &str, is_streaming: bool) {
        self.total_requests.fetch_add(1, ORDERING);
        self.active_requests.fetch_add(1, ORDERING);

        if is_streaming {
            self.streaming_requests.fetch_add(1, ORDERING);
        } else {
            self.non_streaming_requests.fetch_add(1, ORDERING);
        }

        if let Ok(mut map) = self.path_requests.write() {
            if let Some(count) = map.get_mut(path) {
                *count += 1;
            } else if map.len() < MAX_TRACKED_PATHS {
                map.insert(path.to_string(), 1);
            } else {
                *map.entry(OTHER_PATHS.to_string()).or_insert(0) += 1;
            }
        }

        // Add to rolling window, oldest entries first
        if let Ok(mut times) = self.request_times.write() {
            let now = Instant::now();
            times.push_back(now);
            if let Some(cutoff) = now.checked_sub(RPS_WINDOW) {
                while times.front().is_some_and(|t| *t <= cutoff) {
                    times.pop_front();
                }
            }
        }
    }

    /// Record how the response body was resolved
    pub fn record_resolved(&self, resolved: &Resolved) {
        match resolved {
            Resolved::Override(_) => {
                self.override_hits.fetch_add(1, ORDERING);
            }
            Resolved::InvalidOverride(_) => {
                self.override_hits.fetch_add(1, ORDERING);
                self.invalid_overrides.fetch_add(1, ORDERING);
            }
            Resolved::Default(_) => {}
        }
    }

    /// Record a simulated error response
    pub fn record_simulated_error(&self) {
        self.simulated_errors.fetch_add(1, ORDERING);
    }

    /// Record a response that failed to encode
    pub fn record_internal_error(&self) {
        self.internal_errors.fetch_add(1, ORDERING);
    }

    /// Record a stream abandoned by its client. The request still ends
    /// through [`Stats::record_request_end`].
    pub fn record_disconnect(&self) {
        self.disconnects.fetch_add(1, ORDERING);
    }

    /// Record the completion of a request
    pub fn record_request_end(&self, latency: Duration) {
        self.active_requests.fetch_sub(1, ORDERING);
        self.completed_requests.fetch_add(1, ORDERING);

        // Update latency stats
        let latency_us = latency.as_micros() as u64;
        self.total_latency_us.fetch_add(latency_us, ORDERING);

        // Update min latency
        let mut current_min = self.min_latency_us.load(ORDERING);
        while latency_us < current_min {
            match self.min_latency_us.compare_exchange_weak(
                current_min,
                latency_us,
                ORDERING,
                ORDERING,
            ) {
                Ok(_) => break,
                Err(x) => current_min = x,
            }
        }

        // Update max latency
        let mut current_max = self.max_latency_us.load(ORDERING);
        while latency_us > current_max {
            match self.max_latency_us.compare_exchange_weak(
                current_max,
                latency_us,
                ORDERING,
                ORDERING,
            ) {
                Ok(_) => break,
                Err(x) => current_max = x,
            }
        }
    }

    /// Get the uptime of the server
    pub fn uptime(&self) -> Duration {
        self.start_time.elapsed()
    }

    /// Get requests per second (over the last 60 seconds)
    pub fn requests_per_second(&self) -> f64 {
        if let Ok(times) = self.request_times.read() {
            let now = Instant::now();
            let stale = match now.checked_sub(RPS_WINDOW) {
                Some(cutoff) => times.partition_point(|t| *t <= cutoff),
                None => 0,
            };

            if let Some(oldest) = times.get(stale) {
                let window = now.duration_since(*oldest).as_secs_f64();
                if window > 0.0 {
                    return (times.len() - stale) as f64 / window;
                }
            }
        }
        0.0
    }

    /// Get average latency in milliseconds
    pub fn avg_latency_ms(&self) -> f64 {
        let completed = self.completed_requests.load(ORDERING);
        if completed == 0 {
            return 0.0;
        }
        let total_us = self.total_latency_us.load(ORDERING);
        (total_us as f64 / completed as f64) / 1000.0
    }

    /// Get minimum latency in milliseconds
    pub fn min_latency_ms(&self) -> Option<f64> {
        let min = self.min_latency_us.load(ORDERING);
        if min == u64::MAX {
            None
        } else {
            Some(min as f64 / 1000.0)
        }
    }

    /// Get maximum latency in milliseconds
    pub fn max_latency_ms(&self) -> Option<f64> {
        if self.completed_requests.load(ORDERING) == 0 {
            None
        } else {
            Some(self.max_latency_us.load(ORDERING) as f64 / 1000.0)
        }
    }

    /// Get per-path request counts
    pub fn path_requests(&self) -> HashMap<String, u64> {
        self.path_requests
            .read()
            .map(|m| m.clone())
            .unwrap_or_default()
    }

    /// Get a snapshot of all stats for serialization, including the error
    /// controller's view of the observed error rate
    pub fn snapshot(&self, simulator: &ErrorSimulator) -> StatsSnapshot {
        StatsSnapshot {
            uptime_secs: self.uptime().as_secs(),
            total_requests: self.total_requests.load(ORDERING),
            active_requests: self.active_requests.load(ORDERING),
            streaming_requests: self.streaming_requests.load(ORDERING),
            non_streaming_requests: self.non_streaming_requests.load(ORDERING),
            simulated_errors: self.simulated_errors.load(ORDERING),
            internal_errors: self.internal_errors.load(ORDERING),
            override_hits: self.override_hits.load(ORDERING),
            invalid_overrides: self.invalid_overrides.load(ORDERING),
            disconnects: self.disconnects.load(ORDERING),
            target_error_frequency: simulator.target_frequency(),
            current_error_rate: simulator.current_error_rate(),
            requests_per_second: self.requests_per_second(),
            avg_latency_ms: self.avg_latency_ms(),
            min_latency_ms: self.min_latency_ms(),
            max_latency_ms: self.max_latency_ms(),
            path_requests: self.path_requests(),
        }
    }
}

/// A serializable snapshot of statistics
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct StatsSnapshot {
    pub uptime_secs: u64,
    pub total_requests: u64,
    pub active_requests: u64,
    pub streaming_requests: u64,
    pub non_streaming_requests: u64,
    pub simulated_errors: u64,
    pub internal_errors: u64,
    pub override_hits: u64,
    pub invalid_overrides: u64,
    pub disconnects: u64,
    pub target_error_frequency: f64,
    pub current_error_rate: f64,
    pub requests_per_second: f64,
    pub avg_latency_ms: f64,
    pub min_latency_ms: Option<f64>,
    pub max_latency_ms: Option<f64>,
    pub path_requests: HashMap<String, u64>,
}

/// Shared stats handle for use across threads
pub type SharedStats = Arc<Stats>;

/// Create a new shared stats instance
pub fn new_shared_stats() -> SharedStats {
    Arc::new(Stats::new())
}
