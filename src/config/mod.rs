use serde::Deserialize;
use std::time::Duration;

use crate::services::pipeline::RetryPolicy;
use crate::services::queue::QueueSettings;

#[derive(Debug, Deserialize)]
pub struct AppConfig {
    /// Server bind address (e.g., "0.0.0.0:3001").
    #[serde(default = "default_bind_addr")]
    pub bind_addr: String,

    /// Replicate API token
    pub replicate_api_token: String,

    /// Replicate model slug (owner/name)
    #[serde(default = "default_replicate_model")]
    pub replicate_model: String,

    #[serde(default = "default_replicate_base_url")]
    pub replicate_base_url: String,

    /// OpenAI-compatible API key. Without it, variations come from the static table.
    #[serde(default)]
    pub openai_api_key: Option<String>,

    #[serde(default = "default_openai_model")]
    pub openai_model: String,

    #[serde(default = "default_openai_base_url")]
    pub openai_base_url: String,

    /// Jobs allowed to generate at the same time
    #[serde(default = "default_max_concurrent_jobs")]
    pub max_concurrent_jobs: usize,

    /// Rate-limit retries per image slot
    #[serde(default = "default_max_rate_limit_retries")]
    pub max_rate_limit_retries: u32,

    #[serde(default = "default_backoff_step_ms")]
    pub backoff_step_ms: u64,

    /// Pause between image calls within one job
    #[serde(default = "default_inter_request_delay_ms")]
    pub inter_request_delay_ms: u64,

    #[serde(default = "default_cache_ttl_secs")]
    pub cache_ttl_secs: u64,

    #[serde(default = "default_job_retention_secs")]
    pub job_retention_secs: u64,

    #[serde(default = "default_job_sweep_interval_secs")]
    pub job_sweep_interval_secs: u64,

    #[serde(default = "default_cache_sweep_interval_secs")]
    pub cache_sweep_interval_secs: u64,
}

fn default_bind_addr() -> String {
    "0.0.0.0:3001".to_string()
}

fn default_replicate_model() -> String {
    "black-forest-labs/flux-schnell".to_string()
}

fn default_replicate_base_url() -> String {
    "https://api.replicate.com/v1".to_string()
}

fn default_openai_model() -> String {
    "gpt-3.5-turbo".to_string()
}

fn default_openai_base_url() -> String {
    "https://api.openai.com/v1".to_string()
}

fn default_max_concurrent_jobs() -> usize {
    2
}

fn default_max_rate_limit_retries() -> u32 {
    3
}

fn default_backoff_step_ms() -> u64 {
    2000
}

fn default_inter_request_delay_ms() -> u64 {
    10_000
}

fn default_cache_ttl_secs() -> u64 {
    24 * 60 * 60
}

fn default_job_retention_secs() -> u64 {
    60 * 60
}

fn default_job_sweep_interval_secs() -> u64 {
    30 * 60
}

fn default_cache_sweep_interval_secs() -> u64 {
    60 * 60
}

impl AppConfig {
    pub fn from_env() -> Result<Self, envy::Error> {
        dotenvy::dotenv().ok();
        envy::from_env()
    }

    pub fn queue_settings(&self) -> QueueSettings {
        QueueSettings {
            max_concurrent: self.max_concurrent_jobs.max(1),
            job_retention: Duration::from_secs(self.job_retention_secs),
        }
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_retries: self.max_rate_limit_retries,
            backoff_step: Duration::from_millis(self.backoff_step_ms),
            inter_request_delay: Duration::from_millis(self.inter_request_delay_ms),
        }
    }

    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_secs)
    }

    pub fn job_sweep_interval(&self) -> Duration {
        Duration::from_secs(self.job_sweep_interval_secs.max(1))
    }

    pub fn cache_sweep_interval(&self) -> Duration {
        Duration::from_secs(self.cache_sweep_interval_secs.max(1))
    }

    /// The OpenAI key, ignoring blank values.
    pub fn openai_key(&self) -> Option<&str> {
        self.openai_api_key
            .as_deref()
            .map(str::trim)
            .filter(|k| !k.is_empty())
    }
}
