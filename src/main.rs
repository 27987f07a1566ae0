use axum::routing::get;
use axum::Router;
use frame_extract::{
    app_state::AppState,
    config::AppConfig,
    routes,
    services::{
        background::{BackgroundRemover, RembgClient},
        outputs::OutputStore,
        registry::JobRegistry,
        uploads::UploadStore,
        video::{FfmpegSource, FrameSource},
        worker::JobRunner,
    },
};
use metrics_exporter_prometheus::PrometheusBuilder;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

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

    tracing::info!("Initializing frame-extract server");

    // Initialize Prometheus metrics recorder
    let prometheus_handle = PrometheusBuilder::new()
        .install_recorder()
        .expect("Failed to install Prometheus metrics recorder");
    let prometheus_handle = Arc::new(prometheus_handle);

    // Register application metrics
    metrics::describe_histogram!(
        "frame_job_processing_seconds",
        "Time to process a frame extraction job"
    );
    metrics::describe_counter!("frame_jobs_total", "Total frame extraction jobs submitted");
    metrics::describe_counter!("frame_jobs_completed", "Total frame extraction jobs completed");
    metrics::describe_counter!("frame_jobs_failed", "Total frame extraction jobs that failed");
    metrics::describe_counter!("frames_extracted_total", "Total frames written to disk");

    // Prepare storage directories
    tokio::fs::create_dir_all(&config.upload_dir)
        .await
        .expect("Failed to create upload directory");
    tokio::fs::create_dir_all(&config.output_dir)
        .await
        .expect("Failed to create output directory");

    // Initialize video decoder
    let source = FfmpegSource::new(&config.ffmpeg_path, &config.ffprobe_path);
    if let Err(e) = source.health_check() {
        tracing::warn!(
            error = %e,
            "Video decoder unavailable, jobs will fail until it is installed"
        );
    }

    // Initialize optional background removal client
    let remover: Option<Arc<dyn BackgroundRemover>> = match &config.rembg_url {
        Some(url) => {
            tracing::info!(url = %url, "Background removal enabled");
            let client = RembgClient::new(url).expect("Failed to initialize rembg client");
            Some(Arc::new(client))
        }
        None => {
            tracing::info!("Background removal disabled (REMBG_URL not set)");
            None
        }
    };

    // Create shared application state
    let registry = Arc::new(JobRegistry::new());
    let runner = JobRunner::new(Arc::clone(&registry), Arc::new(source), remover);
    let state = AppState::new(
        registry,
        runner,
        UploadStore::new(&config.upload_dir, config.max_upload_bytes),
        OutputStore::new(&config.output_dir),
    );

    let app = Router::new()
        // Prometheus metrics endpoint (separate state)
        .route(
            "/metrics",
            get(routes::metrics::prometheus_metrics).with_state(prometheus_handle),
        )
        .merge(routes::build_router(state.clone()));

    tracing::info!("Starting frame-extract on {}", config.bind_addr);

    let listener = tokio::net::TcpListener::bind(&config.bind_addr)
        .await
        .expect("Failed to bind to address");

    tracing::info!("Server listening on {}", config.bind_addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .expect("Server error");

    tracing::info!("Waiting for running jobs to finish");
    state.runner.wait_all().await;
    tracing::info!("Shutdown complete");
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}
