//! Icon Forge
//!
//! Turns a text prompt into a set of four stylistically consistent icons.
//! Requests are served from an in-memory result cache or queued as jobs that
//! a bounded-concurrency scheduler runs against the image provider, with
//! per-image retry on rate limits.

pub mod app_state;
pub mod config;
pub mod errors;
pub mod models;
pub mod routes;
pub mod services;

use axum::routing::{get, post};
use axum::Router;
use tower_http::compression::CompressionLayer;
use tower_http::cors::CorsLayer;
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::trace::TraceLayer;

use app_state::AppState;

/// Build the HTTP router over shared state.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(routes::health::health_check))
        .route("/metrics", get(routes::metrics::prometheus_metrics))
        .route("/api/generate", post(routes::generate::generate_icons))
        .route("/api/status/{job_id}", get(routes::status::get_job_status))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(CompressionLayer::new())
        .layer(CorsLayer::permissive())
        .layer(RequestBodyLimitLayer::new(64 * 1024))
}
