use metrics_exporter_prometheus::PrometheusHandle;
use std::sync::Arc;

use crate::services::{cache::ResultCache, queue::JobQueue};

/// Shared application state passed to all route handlers.
#[derive(Clone)]
pub struct AppState {
    pub queue: JobQueue,
    pub cache: Arc<ResultCache>,
    pub metrics: Option<Arc<PrometheusHandle>>,
}

impl AppState {
    pub fn new(queue: JobQueue, cache: Arc<ResultCache>) -> Self {
        Self {
            queue,
            cache,
            metrics: None,
        }
    }

    pub fn with_metrics(mut self, handle: PrometheusHandle) -> Self {
        self.metrics = Some(Arc::new(handle));
        self
    }
}
