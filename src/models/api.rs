use chrono::{DateTime, Utc};
use garde::Validate;
use serde::{Deserialize, Serialize};

use crate::models::job::{GenerationRequest, Job, JobStatus, QueueStats};
use crate::services::cache::CacheStats;

/// Body of `POST /api/generate`.
#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct GenerateRequest {
    #[garde(custom(valid_prompt))]
    pub prompt: String,

    #[garde(range(min = 1, max = 5))]
    pub style_id: u8,

    #[garde(custom(valid_palette))]
    pub colors: Option<Vec<String>>,
}

const MAX_PROMPT_CHARS: usize = 200;
const MAX_COLORS: usize = 5;
const MAX_COLOR_LEN: usize = 32;

/// Non-blank and at most 200 characters once surrounding whitespace is trimmed.
fn valid_prompt(value: &str, _ctx: &()) -> garde::Result {
    let chars = value.trim().chars().count();
    if chars == 0 {
        return Err(garde::Error::new("must not be blank"));
    }
    if chars > MAX_PROMPT_CHARS {
        return Err(garde::Error::new(format!(
            "must be at most {MAX_PROMPT_CHARS} characters"
        )));
    }
    Ok(())
}

fn valid_palette(value: &Option<Vec<String>>, _ctx: &()) -> garde::Result {
    let Some(colors) = value else {
        return Ok(());
    };
    if colors.len() > MAX_COLORS {
        return Err(garde::Error::new(format!("at most {MAX_COLORS} colors are allowed")));
    }
    if colors
        .iter()
        .any(|c| c.trim().is_empty() || c.chars().count() > MAX_COLOR_LEN)
    {
        return Err(garde::Error::new(format!(
            "each color must be 1 to {MAX_COLOR_LEN} characters"
        )));
    }
    Ok(())
}

impl From<GenerateRequest> for GenerationRequest {
    fn from(req: GenerateRequest) -> Self {
        GenerationRequest::new(req.prompt.trim(), req.style_id, req.colors)
    }
}

/// Response of `POST /api/generate`: either cached images or a job to poll.
#[derive(Debug, Serialize)]
#[serde(untagged)]
pub enum GenerateResponse {
    #[serde(rename_all = "camelCase")]
    Cached {
        images: Vec<String>,
        cached: bool,
        message: String,
    },
    #[serde(rename_all = "camelCase")]
    Queued {
        job_id: String,
        status: String,
        message: String,
    },
}

impl GenerateResponse {
    pub fn cached(images: Vec<String>) -> Self {
        Self::Cached {
            images,
            cached: true,
            message: "Served from cache".to_string(),
        }
    }

    pub fn queued(job_id: String) -> Self {
        Self::Queued {
            job_id,
            status: "queued".to_string(),
            message: "Icon generation started. Poll /api/status/{jobId} for updates".to_string(),
        }
    }
}

/// Response of `GET /api/status/{job_id}`.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct JobStatusResponse {
    pub job_id: String,
    pub status: JobStatus,
    pub created_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub images: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl From<Job> for JobStatusResponse {
    fn from(job: Job) -> Self {
        let mut response = Self {
            job_id: job.id,
            status: job.status,
            created_at: job.created_at,
            images: None,
            completed_at: None,
            error: None,
            message: None,
        };

        match job.status {
            JobStatus::Pending => {
                response.message = Some("Job is queued and waiting to be processed".to_string());
            }
            JobStatus::Processing => {
                response.message = Some("Icons are being generated...".to_string());
            }
            JobStatus::Completed => {
                response.images = job.result;
                response.completed_at = job.completed_at;
            }
            JobStatus::Failed => {
                response.error = job.error;
                response.completed_at = job.completed_at;
            }
        }
        response
    }
}

/// Response of `GET /health`.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub timestamp: DateTime<Utc>,
    pub queue: QueueStats,
    pub cache: CacheStats,
}
