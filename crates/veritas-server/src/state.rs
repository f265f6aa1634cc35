//! Shared application state

use std::sync::Arc;

use veritas_core::PredictionGateway;

/// Cloned into every handler; the gateway owns the model registry
#[derive(Clone)]
pub struct AppState {
    pub gateway: Arc<PredictionGateway>,
}

impl AppState {
    pub fn new(gateway: PredictionGateway) -> Self {
        Self {
            gateway: Arc::new(gateway),
        }
    }
}
