use metrics_exporter_prometheus::PrometheusBuilder;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

use icon_forge::app_state::AppState;
use icon_forge::config::AppConfig;
use icon_forge::services::{
    cache::ResultCache,
    clock::{Clock, SystemClock},
    generation::ReplicateClient,
    maintenance,
    pipeline::GenerationPipeline,
    prompt::StylePromptBuilder,
    queue::JobQueue,
    variations::{OpenAiVariationClient, VariationChain, VariationResolver},
};

#[tokio::main]
async fn main() {
    // Initialize structured logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .json()
        .init();

    // Load configuration from environment
    let config = AppConfig::from_env().expect("Failed to load configuration from environment");

    tracing::info!("Initializing icon-forge server");

    let prometheus_handle = PrometheusBuilder::new()
        .install_recorder()
        .expect("Failed to install Prometheus metrics recorder");

    metrics::describe_counter!("icon_jobs_submitted_total", "Generation jobs queued");
    metrics::describe_counter!("icon_jobs_completed_total", "Generation jobs that produced 4 icons");
    metrics::describe_counter!("icon_jobs_failed_total", "Generation jobs that failed");
    metrics::describe_counter!("icon_cache_hits_total", "Requests served from the result cache");
    metrics::describe_counter!("icon_cache_misses_total", "Cache lookups that found no entry or an expired one");
    metrics::describe_counter!("icon_generation_retries_total", "Rate-limited image calls that were retried");
    metrics::describe_gauge!("icon_queue_pending", "Jobs waiting for a scheduler slot");
    metrics::describe_histogram!("icon_job_duration_seconds", "Wall time of a job's generation pipeline");

    let clock: Arc<dyn Clock> = Arc::new(SystemClock);

    tracing::info!(model = %config.replicate_model, "Initializing Replicate client");
    let generator = ReplicateClient::new(
        &config.replicate_base_url,
        &config.replicate_model,
        &config.replicate_api_token,
    )
    .expect("Failed to initialize Replicate client");

    let completion: Option<Arc<dyn VariationResolver>> = match config.openai_key() {
        Some(key) => {
            tracing::info!(model = %config.openai_model, "Completion-based variations enabled");
            let client = OpenAiVariationClient::new(&config.openai_base_url, &config.openai_model, key)
                .expect("Failed to initialize completion client");
            Some(Arc::new(client) as Arc<dyn VariationResolver>)
        }
        None => {
            tracing::warn!("OPENAI_API_KEY not set, using static variation table");
            None
        }
    };

    let cache = Arc::new(ResultCache::with_default_ttl(clock.clone(), config.cache_ttl()));
    let pipeline = GenerationPipeline::new(
        Arc::new(generator),
        VariationChain::new(completion),
        Arc::new(StylePromptBuilder),
        clock.clone(),
        config.retry_policy(),
    );
    let queue = JobQueue::new(cache.clone(), pipeline, clock, config.queue_settings());

    maintenance::spawn_cache_sweeper(cache.clone(), config.cache_sweep_interval());
    maintenance::spawn_job_sweeper(queue.clone(), config.job_sweep_interval());

    let state = AppState::new(queue, cache).with_metrics(prometheus_handle);
    let app = icon_forge::router(state);

    let listener = tokio::net::TcpListener::bind(&config.bind_addr)
        .await
        .expect("Failed to bind to address");

    tracing::info!("Server listening on {}", config.bind_addr);

    axum::serve(listener, app).await.expect("Server error");
}
