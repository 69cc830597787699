use std::sync::Arc;
use std::time::Duration;

use crate::models::job::GenerationRequest;
use crate::services::clock::Clock;
use crate::services::generation::{GenerateOptions, GenerationClient, GenerationError};
use crate::services::prompt::{PromptBuilder, PromptError};
use crate::services::variations::{VariationChain, VARIATION_COUNT};

/// Retry and pacing policy for image slots.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Retries allowed per slot after the first attempt.
    pub max_retries: u32,
    /// Fallback backoff unit when the provider gives no retry-after hint.
    pub backoff_step: Duration,
    /// Pause between consecutive slots of one job.
    pub inter_request_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            backoff_step: Duration::from_millis(2000),
            inter_request_delay: Duration::from_secs(10),
        }
    }
}

impl RetryPolicy {
    /// Wait before retry number `retries + 1`.
    pub fn backoff(&self, retries: u32, retry_after: Option<Duration>) -> Duration {
        retry_after.unwrap_or(self.backoff_step * (retries + 1))
    }
}

/// Why a single slot produced no image.
#[derive(Debug, thiserror::Error)]
pub enum SlotError {
    #[error(transparent)]
    Prompt(#[from] PromptError),

    #[error("{source} after {attempts} attempt(s)")]
    Provider {
        attempts: u32,
        #[source]
        source: GenerationError,
    },

    #[error("provider returned no images after {attempts} attempt(s)")]
    Empty { attempts: u32 },
}

/// Aggregated failure of a job's four slots.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error("Failed to generate any images. Errors: {}", .errors.join("; "))]
    NoImages { errors: Vec<String> },

    #[error("Only generated {generated} out of 4 images. Errors: {}", .errors.join("; "))]
    Incomplete { generated: usize, errors: Vec<String> },
}

/// Runs one job: resolve variations, then generate each slot in order with retry.
pub struct GenerationPipeline {
    generator: Arc<dyn GenerationClient>,
    variations: VariationChain,
    prompts: Arc<dyn PromptBuilder>,
    clock: Arc<dyn Clock>,
    policy: RetryPolicy,
}

impl GenerationPipeline {
    pub fn new(
        generator: Arc<dyn GenerationClient>,
        variations: VariationChain,
        prompts: Arc<dyn PromptBuilder>,
        clock: Arc<dyn Clock>,
        policy: RetryPolicy,
    ) -> Self {
        Self {
            generator,
            variations,
            prompts,
            clock,
            policy,
        }
    }

    /// Produce exactly four images for the request, or an aggregated error.
    pub async fn run(&self, job_id: &str, request: &GenerationRequest) -> Result<Vec<String>, PipelineError> {
        let mut phrases = self.variations.resolve(&request.prompt).await;
        phrases.resize(VARIATION_COUNT, request.prompt.clone());

        let mut images = Vec::with_capacity(VARIATION_COUNT);
        let mut errors = Vec::new();

        for (slot, phrase) in phrases.iter().enumerate() {
            match self.generate_slot(job_id, slot, phrase, request).await {
                Ok(image) => images.push(image),
                Err(e) => {
                    tracing::warn!(job_id = %job_id, slot, phrase = %phrase, error = %e, "Slot failed");
                    errors.push(format!(
                        "Failed to generate image {} for \"{}\": {}",
                        slot + 1,
                        phrase,
                        e
                    ));
                }
            }

            if slot + 1 < VARIATION_COUNT {
                self.clock.sleep(self.policy.inter_request_delay).await;
            }
        }

        match images.len() {
            VARIATION_COUNT => Ok(images),
            0 => Err(PipelineError::NoImages { errors }),
            generated => Err(PipelineError::Incomplete { generated, errors }),
        }
    }

    async fn generate_slot(
        &self,
        job_id: &str,
        slot: usize,
        phrase: &str,
        request: &GenerationRequest,
    ) -> Result<String, SlotError> {
        let prompt = self.prompts.build(phrase, request.style_id, request.colors())?;
        let options = GenerateOptions::single_icon(prompt);
        let mut retries = 0;

        loop {
            let attempts = retries + 1;
            match self.generator.generate(&options).await {
                Ok(images) => match images.into_iter().next() {
                    Some(image) => return Ok(image),
                    None if retries < self.policy.max_retries => {
                        tracing::debug!(job_id = %job_id, slot, attempt = attempts, "Empty result, retrying");
                    }
                    None => return Err(SlotError::Empty { attempts }),
                },
                Err(GenerationError::RateLimited { retry_after }) if retries < self.policy.max_retries => {
                    let wait = self.policy.backoff(retries, retry_after);
                    tracing::info!(
                        job_id = %job_id,
                        slot,
                        phrase = %phrase,
                        attempt = attempts,
                        retry_after_ms = wait.as_millis() as u64,
                        "Rate limited, backing off"
                    );
                    metrics::counter!("icon_generation_retries_total").increment(1);
                    self.clock.sleep(wait).await;
                }
                Err(source) => return Err(SlotError::Provider { attempts, source }),
            }
            retries += 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::clock::ManualClock;
    use crate::services::prompt::StylePromptBuilder;
    use async_trait::async_trait;
    use parking_lot::Mutex;
    use std::collections::VecDeque;

    /// Replays scripted outcomes, then succeeds.
    struct Scripted {
        outcomes: Mutex<VecDeque<Result<Vec<String>, GenerationError>>>,
        calls: Mutex<u32>,
    }

    impl Scripted {
        fn new(outcomes: Vec<Result<Vec<String>, GenerationError>>) -> Arc<Self> {
            Arc::new(Self {
                outcomes: Mutex::new(outcomes.into()),
                calls: Mutex::new(0),
            })
        }
    }

    #[async_trait]
    impl GenerationClient for Scripted {
        async fn generate(&self, _options: &GenerateOptions) -> Result<Vec<String>, GenerationError> {
            let call = {
                let mut calls = self.calls.lock();
                *calls += 1;
                *calls
            };
            self.outcomes
                .lock()
                .pop_front()
                .unwrap_or_else(|| Ok(vec![format!("https://cdn.test/{call}.png")]))
        }
    }

    fn pipeline(generator: Arc<Scripted>, clock: Arc<ManualClock>) -> GenerationPipeline {
        GenerationPipeline::new(
            generator,
            VariationChain::default(),
            Arc::new(StylePromptBuilder),
            clock,
            RetryPolicy::default(),
        )
    }

    fn rate_limited(secs: Option<u64>) -> Result<Vec<String>, GenerationError> {
        Err(GenerationError::RateLimited {
            retry_after: secs.map(Duration::from_secs),
        })
    }

    fn request() -> GenerationRequest {
        GenerationRequest::new("toys", 1, None)
    }

    #[tokio::test]
    async fn test_all_slots_succeed_with_inter_request_delay() {
        let clock = Arc::new(ManualClock::default());
        let generator = Scripted::new(vec![]);
        let images = pipeline(generator.clone(), clock.clone())
            .run("job", &request())
            .await
            .unwrap();

        assert_eq!(images.len(), 4);
        assert_eq!(*generator.calls.lock(), 4);
        assert_eq!(clock.sleeps(), vec![Duration::from_secs(10); 3]);
    }

    #[tokio::test]
    async fn test_rate_limit_backoff_schedule() {
        let clock = Arc::new(ManualClock::default());
        let generator = Scripted::new(vec![rate_limited(None), rate_limited(None), rate_limited(Some(5))]);
        let images = pipeline(generator.clone(), clock.clone())
            .run("job", &request())
            .await
            .unwrap();

        assert_eq!(images.len(), 4);
        assert_eq!(*generator.calls.lock(), 7);
        assert_eq!(
            &clock.sleeps()[..4],
            &[
                Duration::from_millis(2000),
                Duration::from_millis(4000),
                Duration::from_secs(5),
                Duration::from_secs(10),
            ]
        );
    }

    #[tokio::test]
    async fn test_rate_limit_exhausts_after_three_retries() {
        let clock = Arc::new(ManualClock::default());
        let generator = Scripted::new((0..4).map(|_| rate_limited(None)).collect());
        let err = pipeline(generator.clone(), clock)
            .run("job", &request())
            .await
            .unwrap_err();

        match err {
            PipelineError::Incomplete { generated, errors } => {
                assert_eq!(generated, 3);
                assert_eq!(errors.len(), 1);
                assert!(errors[0].starts_with("Failed to generate image 1 for \"Bear Toy\""));
                assert!(errors[0].contains("after 4 attempt(s)"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_permanent_error_is_not_retried() {
        let clock = Arc::new(ManualClock::default());
        let generator = Scripted::new(vec![Err(GenerationError::Permanent("nsfw".into()))]);
        let err = pipeline(generator.clone(), clock.clone())
            .run("job", &request())
            .await
            .unwrap_err();

        assert_eq!(*generator.calls.lock(), 4);
        assert!(matches!(err, PipelineError::Incomplete { generated: 3, .. }));
        assert_eq!(clock.sleeps(), vec![Duration::from_secs(10); 3]);
    }

    #[tokio::test]
    async fn test_transient_error_is_not_retried() {
        let clock = Arc::new(ManualClock::default());
        let generator = Scripted::new(vec![Err(GenerationError::Transient("502".into()))]);
        let err = pipeline(generator.clone(), clock)
            .run("job", &request())
            .await
            .unwrap_err();

        assert_eq!(*generator.calls.lock(), 4);
        assert!(err.to_string().starts_with("Only generated 3 out of 4 images."));
    }

    #[tokio::test]
    async fn test_empty_result_retries_without_delay() {
        let clock = Arc::new(ManualClock::default());
        let generator = Scripted::new(vec![Ok(vec![]), Ok(vec![])]);
        let images = pipeline(generator.clone(), clock.clone())
            .run("job", &request())
            .await
            .unwrap();

        assert_eq!(images.len(), 4);
        assert_eq!(*generator.calls.lock(), 6);
        assert_eq!(clock.sleeps(), vec![Duration::from_secs(10); 3]);
    }

    #[tokio::test]
    async fn test_no_images_aggregates_every_slot() {
        let clock = Arc::new(ManualClock::default());
        let generator = Scripted::new(
            (0..4)
                .map(|_| Err(GenerationError::Permanent("down".into())))
                .collect(),
        );
        let err = pipeline(generator, clock).run("job", &request()).await.unwrap_err();

        let message = err.to_string();
        assert!(message.starts_with("Failed to generate any images. Errors: "));
        for phrase in ["Bear Toy", "Car Toy", "Spinner Toy", "Swing Toy"] {
            assert!(message.contains(phrase), "missing {phrase} in {message}");
        }
    }

    #[tokio::test]
    async fn test_unknown_style_fails_every_slot_without_calls() {
        let clock = Arc::new(ManualClock::default());
        let generator = Scripted::new(vec![]);
        let err = pipeline(generator.clone(), clock)
            .run("job", &GenerationRequest::new("rocket", 42, None))
            .await
            .unwrap_err();

        assert_eq!(*generator.calls.lock(), 0);
        assert!(matches!(err, PipelineError::NoImages { ref errors } if errors.len() == 4));
        assert!(err.to_string().contains("Invalid style ID: 42"));
    }

    #[test]
    fn test_backoff() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.backoff(0, None), Duration::from_millis(2000));
        assert_eq!(policy.backoff(2, None), Duration::from_millis(6000));
        assert_eq!(policy.backoff(1, Some(Duration::from_secs(30))), Duration::from_secs(30));
    }
}
