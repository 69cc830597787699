use axum::extract::State;
use axum::Json;
use axum::extract::rejection::JsonRejection;
use garde::Validate;

use crate::app_state::AppState;
use crate::errors::ApiError;
use crate::models::api::{GenerateRequest, GenerateResponse};
use crate::services::queue::Submission;

/// POST /api/generate: serve a cached icon set or queue a generation job.
pub async fn generate_icons(
    State(state): State<AppState>,
    payload: Result<Json<GenerateRequest>, JsonRejection>,
) -> Result<Json<GenerateResponse>, ApiError> {
    let Json(request) = payload?;
    request.validate()?;

    let response = match state.queue.generate(request.into()) {
        Submission::Cached(images) => GenerateResponse::cached(images),
        Submission::Queued(job_id) => GenerateResponse::queued(job_id),
    };
    Ok(Json(response))
}
