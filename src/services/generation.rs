use async_trait::async_trait;
use reqwest::header::RETRY_AFTER;
use reqwest::{Client, Response, StatusCode};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Inputs for one image-model call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GenerateOptions {
    pub prompt: String,
    pub aspect_ratio: String,
    pub num_outputs: u32,
    pub output_format: String,
}

impl GenerateOptions {
    /// A single square PNG for the given prompt.
    pub fn single_icon(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            aspect_ratio: "1:1".to_string(),
            num_outputs: 1,
            output_format: "png".to_string(),
        }
    }
}

/// Failure modes of the image provider, classified at the source.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GenerationError {
    #[error("Rate limited by image provider{}", retry_hint(.retry_after))]
    RateLimited { retry_after: Option<Duration> },

    #[error("Image provider temporarily unavailable: {0}")]
    Transient(String),

    #[error("Image provider rejected the request: {0}")]
    Permanent(String),
}

fn retry_hint(retry_after: &Option<Duration>) -> String {
    match retry_after {
        Some(d) => format!(" (retry after {}s)", d.as_secs()),
        None => String::new(),
    }
}

/// Produces images for a textual prompt.
#[async_trait]
pub trait GenerationClient: Send + Sync {
    async fn generate(&self, options: &GenerateOptions) -> Result<Vec<String>, GenerationError>;
}

/// Client for Replicate's hosted image models.
pub struct ReplicateClient {
    http: Client,
    base_url: String,
    model: String,
    api_token: String,
}

#[derive(Serialize)]
struct PredictionRequest<'a> {
    input: PredictionInput<'a>,
}

#[derive(Serialize)]
struct PredictionInput<'a> {
    prompt: &'a str,
    aspect_ratio: &'a str,
    num_outputs: u32,
    output_format: &'a str,
    output_quality: u32,
}

#[derive(Debug, Deserialize)]
struct Prediction {
    status: String,
    #[serde(default)]
    output: Option<PredictionOutput>,
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    urls: Option<PredictionUrls>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum PredictionOutput {
    Many(Vec<String>),
    One(String),
}

#[derive(Debug, Deserialize)]
struct PredictionUrls {
    get: String,
}

#[derive(Debug, Deserialize)]
struct ThrottleBody {
    #[serde(default)]
    retry_after: Option<u64>,
    #[serde(default)]
    detail: Option<String>,
}

const POLL_INTERVAL: Duration = Duration::from_secs(1);
const MAX_POLLS: u32 = 120;

impl ReplicateClient {
    pub fn new(
        base_url: impl Into<String>,
        model: impl Into<String>,
        api_token: impl Into<String>,
    ) -> Result<Self, reqwest::Error> {
        let http = Client::builder()
            .timeout(Duration::from_secs(120))
            .build()?;

        Ok(Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            model: model.into(),
            api_token: api_token.into(),
        })
    }

    async fn poll(&self, mut prediction: Prediction) -> Result<Prediction, GenerationError> {
        for _ in 0..MAX_POLLS {
            if is_finished(&prediction.status) {
                return Ok(prediction);
            }
            let Some(url) = prediction.urls.as_ref().map(|u| u.get.clone()) else {
                return Err(GenerationError::Transient(format!(
                    "prediction stuck in '{}' without a polling URL",
                    prediction.status
                )));
            };

            tokio::time::sleep(POLL_INTERVAL).await;
            let response = self
                .http
                .get(&url)
                .bearer_auth(&self.api_token)
                .send()
                .await
                .map_err(classify_transport)?;
            prediction = read_prediction(response).await?;
        }

        Err(GenerationError::Transient(
            "prediction did not finish in time".to_string(),
        ))
    }
}

#[async_trait]
impl GenerationClient for ReplicateClient {
    async fn generate(&self, options: &GenerateOptions) -> Result<Vec<String>, GenerationError> {
        let url = format!("{}/models/{}/predictions", self.base_url, self.model);
        let body = PredictionRequest {
            input: PredictionInput {
                prompt: &options.prompt,
                aspect_ratio: &options.aspect_ratio,
                num_outputs: options.num_outputs,
                output_format: &options.output_format,
                output_quality: 100,
            },
        };

        let response = self
            .http
            .post(&url)
            .bearer_auth(&self.api_token)
            .header("Prefer", "wait")
            .json(&body)
            .send()
            .await
            .map_err(classify_transport)?;

        let prediction = self.poll(read_prediction(response).await?).await?;

        match prediction.status.as_str() {
            "succeeded" => Ok(match prediction.output {
                Some(PredictionOutput::Many(urls)) => urls,
                Some(PredictionOutput::One(url)) => vec![url],
                None => Vec::new(),
            }),
            other => Err(GenerationError::Permanent(
                prediction
                    .error
                    .unwrap_or_else(|| format!("prediction ended with status '{other}'")),
            )),
        }
    }
}

fn is_finished(status: &str) -> bool {
    matches!(status, "succeeded" | "failed" | "canceled")
}

fn classify_transport(err: reqwest::Error) -> GenerationError {
    if err.is_timeout() || err.is_connect() {
        GenerationError::Transient(err.to_string())
    } else {
        GenerationError::Permanent(err.to_string())
    }
}

async fn read_prediction(response: Response) -> Result<Prediction, GenerationError> {
    let status = response.status();
    if status.is_success() {
        return response
            .json::<Prediction>()
            .await
            .map_err(|e| GenerationError::Permanent(format!("malformed prediction: {e}")));
    }

    let header_retry = response
        .headers()
        .get(RETRY_AFTER)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse::<u64>().ok());
    let text = response.text().await.unwrap_or_default();

    Err(classify_status(status, header_retry, &text))
}

/// Map an unsuccessful HTTP response onto the provider error taxonomy.
fn classify_status(status: StatusCode, header_retry: Option<u64>, body: &str) -> GenerationError {
    let parsed = serde_json::from_str::<ThrottleBody>(body).ok();

    if status == StatusCode::TOO_MANY_REQUESTS {
        let seconds = header_retry.or_else(|| parsed.as_ref().and_then(|b| b.retry_after));
        return GenerationError::RateLimited {
            retry_after: seconds.map(Duration::from_secs),
        };
    }

    let detail = parsed
        .and_then(|b| b.detail)
        .unwrap_or_else(|| body.trim().to_string());
    let message = format!("HTTP {}: {}", status.as_u16(), detail);

    if status.is_server_error() || status == StatusCode::REQUEST_TIMEOUT {
        GenerationError::Transient(message)
    } else {
        GenerationError::Permanent(message)
    }
}
