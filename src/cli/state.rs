// Application State Module

use crate::dispatch::{Dispatcher, SimulationConfig};
use crate::errors::ErrorSimulator;
use crate::stats::SharedStats;
use std::sync::Arc;

/// Shared application state
pub struct AppState {
    pub dispatcher: Dispatcher,
}

impl AppState {
    /// Build state from validated simulation settings. One error controller
    /// serves every route.
    pub fn new(simulation: SimulationConfig, stats: SharedStats) -> Self {
        let simulator = Arc::new(ErrorSimulator::from_policy(&simulation.error_policy));
        let dispatcher = Dispatcher::with_parts(Arc::new(simulation), simulator, stats);
        Self { dispatcher }
    }
}
