use axum::extract::DefaultBodyLimit;
use axum::http::{HeaderValue, Method};
use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use veritas_core::config::ServerConfig;

use super::{health, models, predict};
use crate::state::AppState;

/// Room for multipart boundaries and text fields on top of the file itself
const FORM_OVERHEAD_BYTES: usize = 1024 * 1024;

/// Create the API router
pub fn create_router(state: AppState, server: &ServerConfig) -> Router {
    let body_limit = state
        .gateway
        .limits()
        .max_any()
        .saturating_add(FORM_OVERHEAD_BYTES);

    Router::new()
        .route("/", get(health::health))
        .route("/api/models", get(models::list_models))
        .route("/api/predict", post(predict::predict))
        .route("/api/audio/predict", post(predict::predict_audio))
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(cors_layer(&server.cors_origins()))
        .with_state(state)
}

fn cors_layer(origins: &[String]) -> CorsLayer {
    let allowed: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(_) => {
                log::warn!("Ignoring invalid CORS origin {:?}", origin);
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(AllowOrigin::list(allowed))
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers(Any)
}
