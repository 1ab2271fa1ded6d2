// HTTP Handlers Module
// Routes every mocked request into the dispatcher and serves the simulator's
// own health and stats endpoints.

use super::state::AppState;
use axum::{
    extract::{RawQuery, State},
    http::Uri,
    response::{IntoResponse, Response},
    Json,
};
use std::sync::Arc;

/// Health check endpoint
pub async fn health() -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "ok",
        "service": "apisim"
    }))
}

/// GET /apisim/stats - Get server statistics
pub async fn get_stats(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let dispatcher = &state.dispatcher;
    Json(dispatcher.stats().snapshot(dispatcher.simulator()))
}

/// Fallback for every other path: a mocked endpoint
pub async fn simulate(
    State(state): State<Arc<AppState>>,
    uri: Uri,
    RawQuery(query): RawQuery,
) -> Response {
    let streaming = is_streaming(query.as_deref());

    tracing::info!(path = %uri.path(), stream = streaming, "Mock request");

    state.dispatcher.dispatch(uri.path(), streaming).await
}

/// True when a query parameter is literally `stream=true`
pub fn is_streaming(query: Option<&str>) -> bool {
    query
        .map(|q| q.split('&').any(|pair| pair == "stream=true"))
        .unwrap_or(false)
}
