use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use crate::services::cache::ResultCache;
use crate::services::queue::JobQueue;

/// Periodically sweep expired cache entries.
pub fn spawn_cache_sweeper(cache: Arc<ResultCache>, every: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(every);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        ticker.tick().await;

        loop {
            ticker.tick().await;
            let removed = cache.sweep();
            tracing::debug!(removed, "Cache sweep tick");
        }
    })
}

/// Periodically drop terminal jobs past their retention window.
pub fn spawn_job_sweeper(queue: JobQueue, every: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(every);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        ticker.tick().await;

        loop {
            ticker.tick().await;
            let removed = queue.sweep();
            tracing::debug!(removed, "Job sweep tick");
        }
    })
}
