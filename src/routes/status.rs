use axum::extract::{Path, State};
use axum::Json;

use crate::app_state::AppState;
use crate::errors::ApiError;
use crate::models::api::JobStatusResponse;

/// GET /api/status/{job_id}: current state of a generation job.
pub async fn get_job_status(
    State(state): State<AppState>,
    Path(job_id): Path<String>,
) -> Result<Json<JobStatusResponse>, ApiError> {
    let job = state.queue.get_status(&job_id).ok_or(ApiError::NotFound)?;
    Ok(Json(job.into()))
}
