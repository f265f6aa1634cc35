use axum::extract::State;
use axum::Json;
use veritas_core::gateway::HealthResponse;

use crate::state::AppState;

/// `GET /`
pub async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(state.gateway.health())
}
