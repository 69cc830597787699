use axum::extract::State;
use axum::Json;
use chrono::Utc;

use crate::app_state::AppState;
use crate::models::api::HealthResponse;

/// GET /health: liveness plus queue and cache occupancy.
pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        timestamp: Utc::now(),
        queue: state.queue.stats(),
        cache: state.cache.stats(),
    })
}
