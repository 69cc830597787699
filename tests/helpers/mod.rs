//! Stub collaborators and polling helpers shared by the integration tests.

#![allow(dead_code)]

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::Semaphore;

use icon_forge::app_state::AppState;
use icon_forge::models::job::{Job, JobStatus};
use icon_forge::services::{
    cache::ResultCache,
    clock::ManualClock,
    generation::{GenerateOptions, GenerationClient, GenerationError},
    pipeline::{GenerationPipeline, RetryPolicy},
    prompt::{PromptBuilder, PromptError},
    queue::{JobQueue, QueueSettings},
    variations::VariationChain,
};

/// Uses the object phrase itself as the prompt, so stubs can key on it.
pub struct EchoPrompt;

impl PromptBuilder for EchoPrompt {
    fn build(&self, object: &str, style_id: u8, _colors: Option<&[String]>) -> Result<String, PromptError> {
        if !(1..=5).contains(&style_id) {
            return Err(PromptError::UnknownStyle(style_id));
        }
        Ok(object.to_string())
    }
}

/// Configurable image provider stub.
#[derive(Default)]
pub struct StubGenerator {
    /// Prompts that always fail permanently.
    failing: Vec<String>,
    /// Remaining rate-limit errors per prompt before it succeeds.
    rate_limits: Mutex<HashMap<String, u32>>,
    /// When set, every call waits for a permit.
    gate: Option<Arc<Semaphore>>,
    /// Prompts that panic inside the provider call.
    panicking: Vec<String>,
    calls: AtomicUsize,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl StubGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing_on(mut self, prompt: &str) -> Self {
        self.failing.push(prompt.to_string());
        self
    }

    pub fn rate_limited(self, prompt: &str, times: u32) -> Self {
        self.rate_limits.lock().insert(prompt.to_string(), times);
        self
    }

    pub fn gated(mut self, gate: Arc<Semaphore>) -> Self {
        self.gate = Some(gate);
        self
    }

    pub fn panicking_on(mut self, prompt: &str) -> Self {
        self.panicking.push(prompt.to_string());
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl GenerationClient for StubGenerator {
    async fn generate(&self, options: &GenerateOptions) -> Result<Vec<String>, GenerationError> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);

        if let Some(gate) = &self.gate {
            if let Ok(permit) = gate.acquire().await {
                permit.forget();
            }
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        let prompt = options.prompt.as_str();
        if self.panicking.iter().any(|p| p == prompt) {
            panic!("provider stub exploded on {prompt}");
        }
        if self.failing.iter().any(|p| p == prompt) {
            return Err(GenerationError::Permanent(format!("content policy rejected {prompt}")));
        }
        {
            let mut limits = self.rate_limits.lock();
            if let Some(remaining) = limits.get_mut(prompt) {
                if *remaining > 0 {
                    *remaining -= 1;
                    return Err(GenerationError::RateLimited { retry_after: None });
                }
            }
        }

        Ok(vec![format!("https://replicate.delivery/test/{call}.png")])
    }
}

/// A queue wired to stubs and a manual clock.
pub struct Harness {
    pub queue: JobQueue,
    pub cache: Arc<ResultCache>,
    pub clock: Arc<ManualClock>,
    pub generator: Arc<StubGenerator>,
}

impl Harness {
    pub fn new(generator: StubGenerator) -> Self {
        Self::with_variations(generator, VariationChain::default())
    }

    pub fn with_variations(generator: StubGenerator, variations: VariationChain) -> Self {
        let clock = Arc::new(ManualClock::default());
        let cache = Arc::new(ResultCache::new(clock.clone()));
        let generator = Arc::new(generator);
        let pipeline = GenerationPipeline::new(
            generator.clone(),
            variations,
            Arc::new(EchoPrompt),
            clock.clone(),
            RetryPolicy::default(),
        );
        let queue = JobQueue::new(cache.clone(), pipeline, clock.clone(), QueueSettings::default());

        Self {
            queue,
            cache,
            clock,
            generator,
        }
    }

    pub fn state(&self) -> AppState {
        AppState::new(self.queue.clone(), self.cache.clone())
    }
}

/// Yield to the runtime until `done` holds, failing the test if it never does.
pub async fn wait_until(mut done: impl FnMut() -> bool) {
    for _ in 0..100_000 {
        if done() {
            return;
        }
        tokio::task::yield_now().await;
    }
    panic!("condition not reached");
}

/// Wait for a job to reach a terminal state and return it.
pub async fn wait_for_terminal(queue: &JobQueue, job_id: &str) -> Job {
    wait_until(|| {
        queue
            .get_status(job_id)
            .map(|j| j.status.is_terminal())
            .unwrap_or(false)
    })
    .await;
    queue.get_status(job_id).expect("job vanished")
}

/// Statuses seen while polling a job to completion, without repeats.
pub async fn observe_statuses(queue: &JobQueue, job_id: &str) -> Vec<JobStatus> {
    let mut seen: Vec<JobStatus> = Vec::new();
    for _ in 0..100_000 {
        let status = queue.get_status(job_id).expect("job vanished").status;
        if seen.last() != Some(&status) {
            seen.push(status);
        }
        if status.is_terminal() {
            return seen;
        }
        tokio::task::yield_now().await;
    }
    panic!("job {job_id} never finished");
}
