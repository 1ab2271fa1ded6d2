//! # APISim - API Mock Simulator
//!
//! Mocks HTTP API endpoints so clients can be tested against a configured
//! latency range, an injected error rate and per-path response overrides,
//! optionally delivered as a chunked Server-Sent Events stream.
//!
//! ## Features
//!
//! - Uniform latency simulation before every response and between stream frames
//! - Adaptive error injection that converges on a target frequency
//! - Per-path response overrides from raw JSON text or structured YAML
//! - Streaming support (Server-Sent Events, `?stream=true`)
//!
//! ## Usage
//!
//! ### As a CLI
//!
//! ```bash
//! # Start the server
//! apisim serve --config config.yaml --port 8080
//! ```
//!
//! ### As a Library
//!
//! ```rust,no_run
//! use apisim::{Dispatcher, ErrorPolicy, LatencyRange, OverrideTable, SimulationConfig};
//! use serde_json::json;
//!
//! # async fn run() {
//! let dispatcher = Dispatcher::new(SimulationConfig {
//!     latency: LatencyRange::new(10.0, 50.0),
//!     error_policy: ErrorPolicy::new(503, json!({"error": "unavailable"}), 0.1),
//!     overrides: OverrideTable::new().with_raw("/v1/users", r#"{"users": []}"#),
//! });
//!
//! let response = dispatcher.dispatch("/v1/users", false).await;
//! # }
//! ```

// Core library modules
pub mod dispatch;
pub mod errors;
pub mod latency;
pub mod responses;
pub mod stats;
pub mod stream;
pub mod value;

// CLI module (for `apisim serve` command)
pub mod cli;

// Re-export commonly used types
pub use dispatch::{Dispatcher, SimulationConfig};
pub use errors::{ErrorPolicy, ErrorSimulator};
pub use latency::LatencyRange;
pub use responses::{resolve, Override, OverrideTable, Resolved};
pub use stats::{new_shared_stats, SharedStats, Stats, StatsSnapshot, OTHER_PATHS};
pub use stream::{ChunkStream, StreamEnd};
pub use value::{normalize_yaml, Value, ValueError};
