// Request Dispatch Module
// Sequences one simulated request: delay, error decision, body resolution and
// delivery as a single document or as a stream of frames.

use crate::errors::{ErrorPolicy, ErrorSimulator};
use crate::latency::{self, LatencyRange};
use crate::responses::{normalize_path, OverrideTable};
use crate::stats::{new_shared_stats, SharedStats};
use crate::stream::{format_frame, ChunkStream, StreamEnd};
use axum::{
    body::Body,
    http::{header, HeaderName, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
};
use futures::StreamExt;
use std::sync::Arc;
use std::time::Instant;
use tracing::Instrument;

/// Body sent when a response cannot be encoded
pub const INTERNAL_ERROR_BODY: &str = r#"{"error":"Internal server error"}"#;

/// Header carrying the per-request id
pub const REQUEST_ID_HEADER: HeaderName = HeaderName::from_static("x-request-id");

const JSON: &str = "application/json";
const EVENT_STREAM: &str = "text/event-stream";

/// Validated, read-only simulation settings
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SimulationConfig {
    pub latency: LatencyRange,
    pub error_policy: ErrorPolicy,
    pub overrides: OverrideTable,
}

/// Runs simulated requests against one configuration and one error controller
#[derive(Debug, Clone)]
pub struct Dispatcher {
    config: Arc<SimulationConfig>,
    simulator: Arc<ErrorSimulator>,
    stats: SharedStats,
}

impl Dispatcher {
    pub fn new(config: SimulationConfig) -> Self {
        let simulator = Arc::new(ErrorSimulator::from_policy(&config.error_policy));
        Self::with_parts(Arc::new(config), simulator, new_shared_stats())
    }

    pub fn with_parts(
        config: Arc<SimulationConfig>,
        simulator: Arc<ErrorSimulator>,
        stats: SharedStats,
    ) -> Self {
        Self {
            config,
            simulator,
            stats,
        }
    }

    pub fn config(&self) -> &SimulationConfig {
        &self.config
    }

    pub fn simulator(&self) -> &ErrorSimulator {
        &self.simulator
    }

    pub fn stats(&self) -> &SharedStats {
        &self.stats
    }

    /// Serve one request for `path`.
    ///
    /// Every request pays the configured delay first. A simulated error is
    /// always a single frame, even when streaming was requested, and carries
    /// no `[DONE]` sentinel.
    pub async fn dispatch(&self, path: &str, streaming: bool) -> Response {
        let request_id = uuid::Uuid::new_v4();
        let span = tracing::info_span!("dispatch", %request_id, path = %path, streaming);

        let mut response = self.run(path, streaming).instrument(span).await;

        if let Ok(value) = HeaderValue::from_str(&request_id.to_string()) {
            response.headers_mut().insert(REQUEST_ID_HEADER, value);
        }
        response
    }

    async fn run(&self, path: &str, streaming: bool) -> Response {
        let start = Instant::now();
        self.stats.record_request_start(normalize_path(path), streaming);

        let delay = latency::simulate(&self.config.latency).await;
        tracing::debug!(delay_ms = delay.as_secs_f64() * 1000.0, "Simulated latency");

        if self.simulator.should_error() {
            tracing::warn!(
                status = self.config.error_policy.status_code,
                "Simulating error for request"
            );
            self.stats.record_simulated_error();
            let response = self.error_response(streaming);
            self.stats.record_request_end(start.elapsed());
            return response;
        }

        let resolved = self.config.overrides.resolve(path);
        self.stats.record_resolved(&resolved);
        let value = resolved.into_value();

        if streaming {
            let stream = match ChunkStream::new(&value, self.config.latency) {
                Ok(stream) => stream,
                Err(e) => {
                    tracing::error!(error = %e, "Error encoding streamed response");
                    return self.internal_error(start);
                }
            };

            let stats = self.stats.clone();
            let frames = stream
                .on_end(move |end| {
                    if end == StreamEnd::Disconnected {
                        stats.record_disconnect();
                    }
                    stats.record_request_end(start.elapsed());
                })
                .into_stream();

            let body = Body::from_stream(frames.map(Ok::<_, std::io::Error>));
            event_stream_response(StatusCode::OK, body)
        } else {
            match serde_json::to_vec(&value) {
                Ok(json) => {
                    self.stats.record_request_end(start.elapsed());
                    json_response(StatusCode::OK, json)
                }
                Err(e) => {
                    tracing::error!(error = %e, "Error encoding response");
                    self.internal_error(start)
                }
            }
        }
    }

    fn error_response(&self, streaming: bool) -> Response {
        let policy = &self.config.error_policy;
        let status =
            StatusCode::from_u16(policy.status_code).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);

        let json = match serde_json::to_vec(&policy.body) {
            Ok(json) => json,
            Err(e) => {
                tracing::error!(error = %e, "Error encoding error response");
                self.stats.record_internal_error();
                return internal_error_response();
            }
        };

        if streaming {
            event_stream_response(status, Body::from(format_frame(&json)))
        } else {
            json_response(status, json)
        }
    }

    fn internal_error(&self, start: Instant) -> Response {
        self.stats.record_internal_error();
        self.stats.record_request_end(start.elapsed());
        internal_error_response()
    }
}

fn json_response(status: StatusCode, body: Vec<u8>) -> Response {
    (status, [(header::CONTENT_TYPE, JSON)], body).into_response()
}

fn event_stream_response(status: StatusCode, body: Body) -> Response {
    (
        status,
        [
            (header::CONTENT_TYPE, EVENT_STREAM),
            (header::CACHE_CONTROL, "no-cache"),
            (header::CONNECTION, "keep-alive"),
        ],
        body,
    )
        .into_response()
}

/// Fixed 500 response used when a body cannot be encoded
pub fn internal_error_response() -> Response {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        [(header::CONTENT_TYPE, JSON)],
        INTERNAL_ERROR_BODY,
    )
        .into_response()
}
