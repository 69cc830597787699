use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;

use crate::models::job::{GenerationRequest, Job, JobStatus, QueueStats};
use crate::services::cache::ResultCache;
use crate::services::clock::{to_chrono, Clock};
use crate::services::pipeline::GenerationPipeline;

/// Scheduler limits and retention.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueueSettings {
    /// Jobs allowed to run their pipeline at the same time.
    pub max_concurrent: usize,
    /// How long a terminal job stays queryable.
    pub job_retention: Duration,
}

impl Default for QueueSettings {
    fn default() -> Self {
        Self {
            max_concurrent: 2,
            job_retention: Duration::from_secs(60 * 60),
        }
    }
}

/// Outcome of a generate request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Submission {
    Cached(Vec<String>),
    Queued(String),
}

#[derive(Default)]
struct QueueState {
    /// Insertion-ordered job table.
    jobs: Vec<Job>,
    /// Set while a scheduler loop owns dispatch.
    scheduler_active: bool,
}

struct Inner {
    state: Mutex<QueueState>,
    cache: Arc<ResultCache>,
    pipeline: GenerationPipeline,
    clock: Arc<dyn Clock>,
    settings: QueueSettings,
}

/// In-memory job queue with a single bounded-concurrency scheduler loop.
///
/// The job table and the scheduler flag share one lock, so selecting a batch,
/// marking it `processing` and retiring the loop are atomic with respect to
/// `submit`. A job submitted while the loop is winding down is therefore
/// either picked up by that loop or starts a new one, never neither.
#[derive(Clone)]
pub struct JobQueue {
    inner: Arc<Inner>,
}

impl JobQueue {
    pub fn new(
        cache: Arc<ResultCache>,
        pipeline: GenerationPipeline,
        clock: Arc<dyn Clock>,
        settings: QueueSettings,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                state: Mutex::new(QueueState::default()),
                cache,
                pipeline,
                clock,
                settings,
            }),
        }
    }

    /// Serve from cache when possible, otherwise queue a new job.
    pub fn generate(&self, request: GenerationRequest) -> Submission {
        match self
            .inner
            .cache
            .get(&request.prompt, request.style_id, request.colors())
        {
            Some(images) => Submission::Cached(images),
            None => Submission::Queued(self.submit(request)),
        }
    }

    /// Create a `pending` job and make sure a scheduler loop will run it.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn submit(&self, request: GenerationRequest) -> String {
        let job = Job::new(request, self.inner.clock.now());
        let job_id = job.id.clone();

        let start_loop = {
            let mut state = self.inner.state.lock();
            state.jobs.push(job);
            let idle = !state.scheduler_active;
            state.scheduler_active = true;
            idle
        };

        tracing::info!(job_id = %job_id, "Job submitted");
        metrics::counter!("icon_jobs_submitted_total").increment(1);
        self.publish_depth();

        if start_loop {
            let queue = self.clone();
            tokio::spawn(async move { queue.run_scheduler().await });
        }

        job_id
    }

    pub fn get_status(&self, job_id: &str) -> Option<Job> {
        self.inner
            .state
            .lock()
            .jobs
            .iter()
            .find(|j| j.id == job_id)
            .cloned()
    }

    pub fn stats(&self) -> QueueStats {
        let state = self.inner.state.lock();
        state.jobs.iter().fold(QueueStats::default(), |mut stats, job| {
            stats.record(job.status);
            stats
        })
    }

    pub fn is_scheduler_active(&self) -> bool {
        self.inner.state.lock().scheduler_active
    }

    /// Drop terminal jobs whose completion is older than the retention window.
    pub fn sweep(&self) -> usize {
        let cutoff = self.inner.clock.now() - to_chrono(self.inner.settings.job_retention);
        let mut state = self.inner.state.lock();
        let before = state.jobs.len();
        state.jobs.retain(|job| match job.completed_at {
            Some(done) if job.status.is_terminal() => done > cutoff,
            _ => true,
        });
        let removed = before - state.jobs.len();

        if removed > 0 {
            tracing::info!(removed, "Queue sweep removed old jobs");
        }
        removed
    }

    /// Claim up to `max_concurrent` pending jobs, or retire the loop if none remain.
    fn next_batch(&self) -> Vec<(String, GenerationRequest)> {
        let mut state = self.inner.state.lock();
        let limit = self.inner.settings.max_concurrent.max(1);
        let mut batch = Vec::with_capacity(limit);

        for job in state.jobs.iter_mut() {
            if batch.len() == limit {
                break;
            }
            if job.status == JobStatus::Pending && job.start().is_ok() {
                batch.push((job.id.clone(), job.request.clone()));
            }
        }

        if batch.is_empty() {
            state.scheduler_active = false;
        }
        batch
    }

    async fn run_scheduler(self) {
        tracing::debug!("Scheduler loop started");

        loop {
            let batch = self.next_batch();
            if batch.is_empty() {
                break;
            }
            self.publish_depth();

            let running: Vec<_> = batch
                .into_iter()
                .map(|(job_id, request)| {
                    let queue = self.clone();
                    let id = job_id.clone();
                    (job_id, tokio::spawn(async move { queue.execute(id, request).await }))
                })
                .collect();

            for (job_id, handle) in running {
                if let Err(e) = handle.await {
                    tracing::error!(job_id = %job_id, error = %e, "Job task aborted");
                    self.finish(&job_id, Err(format!("Job execution aborted: {e}")));
                }
            }
        }

        tracing::debug!("Scheduler loop idle");
    }

    async fn execute(&self, job_id: String, request: GenerationRequest) {
        tracing::info!(job_id = %job_id, prompt = %request.prompt, style_id = request.style_id, "Job started");
        let started = std::time::Instant::now();

        let outcome = self.inner.pipeline.run(&job_id, &request).await;
        metrics::histogram!("icon_job_duration_seconds").record(started.elapsed().as_secs_f64());

        match outcome {
            Ok(images) => {
                self.inner.cache.set(
                    &request.prompt,
                    request.style_id,
                    images.clone(),
                    request.colors(),
                    None,
                );
                self.finish(&job_id, Ok(images));
            }
            Err(e) => self.finish(&job_id, Err(e.to_string())),
        }
    }

    fn finish(&self, job_id: &str, outcome: Result<Vec<String>, String>) {
        let now = self.inner.clock.now();
        let mut state = self.inner.state.lock();
        let Some(job) = state.jobs.iter_mut().find(|j| j.id == job_id) else {
            tracing::warn!(job_id = %job_id, "Finished job no longer in table");
            return;
        };

        let transition = match outcome {
            Ok(images) => job.complete(images, now).map(|_| {
                tracing::info!(job_id = %job_id, "Job completed");
                metrics::counter!("icon_jobs_completed_total").increment(1);
            }),
            Err(message) => {
                tracing::error!(job_id = %job_id, error = %message, "Job failed");
                job.fail(message, now).map(|_| {
                    metrics::counter!("icon_jobs_failed_total").increment(1);
                })
            }
        };

        if let Err(e) = transition {
            tracing::warn!(error = %e, "Ignored job transition");
        }
    }

    fn publish_depth(&self) {
        let pending = self.stats().pending;
        metrics::gauge!("icon_queue_pending").set(pending as f64);
    }
}
