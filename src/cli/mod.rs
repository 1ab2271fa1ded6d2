//! CLI module for APISim server functionality.
//!
//! This module provides the `apisim serve` command implementation.

mod config;
mod handlers;
mod state;

pub use config::{Config, ConfigError, ErrorResponseConfig, LatencyConfig, ServerConfig};
pub use handlers::is_streaming;
pub use state::AppState;

use crate::stats::new_shared_stats;
use axum::{routing::get, Router};
use std::{net::SocketAddr, sync::Arc};
use tokio::signal;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

/// Build the application router. Every path other than the simulator's own
/// endpoints is served by the dispatcher.
pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(handlers::health))
        .route("/apisim/stats", get(handlers::get_stats))
        .fallback(handlers::simulate)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Validate the configuration and build the shared application state
pub fn build_state(config: &Config) -> Result<Arc<AppState>, ConfigError> {
    let simulation = config.simulation()?;
    Ok(Arc::new(AppState::new(simulation, new_shared_stats())))
}

/// Run the APISim server with the given configuration
pub async fn run_server(config: Config) -> Result<(), Box<dyn std::error::Error>> {
    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port).parse()?;
    let state = build_state(&config)?;

    let sim = state.dispatcher.config();
    tracing::info!("Starting APISim server on {}", addr);
    tracing::info!(
        "Configuration: latency={}..{}ms, error_code={}, error_frequency={}, overrides={}",
        sim.latency.low,
        sim.latency.high,
        sim.error_policy.status_code,
        sim.error_policy.target_frequency,
        sim.overrides.len()
    );
    tracing::info!("Stats endpoint: /apisim/stats");

    let app = router(state);
    let listener = tokio::net::TcpListener::bind(addr).await?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Server shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install signal handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("Shutdown signal received");
}
