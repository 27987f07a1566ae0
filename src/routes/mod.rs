use axum::extract::DefaultBodyLimit;
use axum::response::Html;
use axum::routing::{get, post};
use axum::Router;
use tower_http::compression::CompressionLayer;
use tower_http::cors::CorsLayer;
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::trace::TraceLayer;
use uuid::Uuid;

use crate::app_state::AppState;
use crate::error::{ApiError, ApiResult};
use crate::models::job::FrameJob;

pub mod frames;
pub mod health;
pub mod jobs;
pub mod metrics;

/// All application routes except `/metrics`, which needs the recorder handle.
pub fn build_router(state: AppState) -> Router {
    let max_upload_bytes = state.uploads.max_bytes();

    Router::new()
        // Polling client (embedded at compile time)
        .route("/", get(|| async { Html(include_str!("../../static/index.html")) }))
        .route("/health", get(health::health_check))
        .route("/process", post(jobs::submit_job))
        .route("/progress/{video_id}", get(jobs::get_progress))
        .route("/frames/{video_id}", get(frames::list_frames))
        .route("/outputs/{video_id}/{filename}", get(frames::serve_frame))
        .route("/download/{video_id}", get(frames::download_archive))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(CompressionLayer::new())
        .layer(CorsLayer::permissive())
        .layer(DefaultBodyLimit::disable())
        .layer(RequestBodyLimitLayer::new(max_upload_bytes))
}

/// Look up a job from a raw path segment. Malformed ids are simply unknown.
pub(crate) async fn find_job(state: &AppState, raw_id: &str) -> ApiResult<FrameJob> {
    let id = Uuid::parse_str(raw_id).map_err(|_| ApiError::not_found("video id not found"))?;
    state
        .registry
        .get(id)
        .await
        .ok_or_else(|| ApiError::not_found("video id not found"))
}
