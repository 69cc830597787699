use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};
use uuid::Uuid;

/// Status of an icon generation job.
///
/// Jobs only move forward: `Pending -> Processing -> Completed | Failed`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Display, EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum JobStatus {
    Pending,
    Processing,
    Completed,
    Failed,
}

impl JobStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::Failed)
    }

    pub fn can_transition_to(self, next: JobStatus) -> bool {
        matches!(
            (self, next),
            (JobStatus::Pending, JobStatus::Processing)
                | (JobStatus::Processing, JobStatus::Completed)
                | (JobStatus::Processing, JobStatus::Failed)
        )
    }
}

/// The inputs of a generation request, already validated at the edge.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenerationRequest {
    pub prompt: String,
    pub style_id: u8,
    pub colors: Option<Vec<String>>,
}

impl GenerationRequest {
    pub fn new(prompt: impl Into<String>, style_id: u8, colors: Option<Vec<String>>) -> Self {
        Self {
            prompt: prompt.into(),
            style_id,
            colors,
        }
    }

    pub fn colors(&self) -> Option<&[String]> {
        self.colors.as_deref()
    }
}

/// One generation request's execution record.
#[derive(Debug, Clone, Serialize)]
pub struct Job {
    pub id: String,
    pub request: GenerationRequest,
    pub status: JobStatus,
    pub result: Option<Vec<String>>,
    pub error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl Job {
    pub fn new(request: GenerationRequest, created_at: DateTime<Utc>) -> Self {
        Self {
            id: new_job_id(created_at),
            request,
            status: JobStatus::Pending,
            result: None,
            error: None,
            created_at,
            completed_at: None,
        }
    }

    pub fn start(&mut self) -> Result<(), JobError> {
        self.transition(JobStatus::Processing)
    }

    pub fn complete(&mut self, images: Vec<String>, at: DateTime<Utc>) -> Result<(), JobError> {
        self.transition(JobStatus::Completed)?;
        self.result = Some(images);
        self.completed_at = Some(at);
        Ok(())
    }

    pub fn fail(&mut self, error: impl Into<String>, at: DateTime<Utc>) -> Result<(), JobError> {
        self.transition(JobStatus::Failed)?;
        self.error = Some(error.into());
        self.completed_at = Some(at);
        Ok(())
    }

    fn transition(&mut self, next: JobStatus) -> Result<(), JobError> {
        if !self.status.can_transition_to(next) {
            return Err(JobError::InvalidTransition {
                job_id: self.id.clone(),
                from: self.status,
                to: next,
            });
        }
        self.status = next;
        Ok(())
    }
}

/// Time-ordered job id with a random suffix, e.g. `job_1718000000000_3f9a1c2b7`.
fn new_job_id(created_at: DateTime<Utc>) -> String {
    let suffix = Uuid::new_v4().simple().to_string();
    format!("job_{}_{}", created_at.timestamp_millis(), &suffix[..9])
}

/// Job counts by status.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct QueueStats {
    pub total: usize,
    pub pending: usize,
    pub processing: usize,
    pub completed: usize,
    pub failed: usize,
}

impl QueueStats {
    pub fn record(&mut self, status: JobStatus) {
        self.total += 1;
        match status {
            JobStatus::Pending => self.pending += 1,
            JobStatus::Processing => self.processing += 1,
            JobStatus::Completed => self.completed += 1,
            JobStatus::Failed => self.failed += 1,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum JobError {
    #[error("Job {job_id} cannot move from {from} to {to}")]
    InvalidTransition {
        job_id: String,
        from: JobStatus,
        to: JobStatus,
    },
}
