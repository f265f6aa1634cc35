use axum::extract::State;
use axum::Json;
use veritas_core::gateway::ModelsResponse;

use crate::state::AppState;

/// `GET /api/models`: video weights found in the models directory
pub async fn list_models(State(state): State<AppState>) -> Json<ModelsResponse> {
    Json(state.gateway.models())
}
