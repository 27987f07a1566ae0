use axum::extract::{Path, State};
use axum::http::header;
use axum::response::{IntoResponse, Response};
use axum::Json;

use crate::app_state::AppState;
use crate::error::{ApiError, ApiResult};
use crate::models::job::{JobStatus, OutputFormat};
use crate::models::progress::FramesResponse;
use crate::routes::find_job;
use crate::services::outputs::OutputStore;

/// GET /frames/{video_id}: frames written so far, sorted by index.
pub async fn list_frames(
    State(state): State<AppState>,
    Path(video_id): Path<String>,
) -> ApiResult<Json<FramesResponse>> {
    let job = find_job(&state, &video_id).await?;
    let frames = OutputStore::list_frames(&job.output_dir)
        .await
        .map_err(|e| ApiError::internal(format!("failed to list frames: {e}")))?;
    Ok(Json(FramesResponse { frames }))
}

/// GET /outputs/{video_id}/{filename}: raw bytes of one frame.
pub async fn serve_frame(
    State(state): State<AppState>,
    Path((video_id, filename)): Path<(String, String)>,
) -> ApiResult<Response> {
    let job = find_job(&state, &video_id).await?;
    if !matches!(job.status, JobStatus::Processing | JobStatus::Completed) {
        return Err(ApiError::not_found("frame not available"));
    }

    let path = OutputStore::frame_path(&job.output_dir, &filename)
        .ok_or_else(|| ApiError::not_found("frame not found"))?;
    let bytes = match tokio::fs::read(&path).await {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err(ApiError::not_found("frame not found"));
        }
        Err(e) => return Err(ApiError::internal(format!("failed to read frame: {e}"))),
    };

    let content_type = filename
        .rsplit_once('.')
        .and_then(|(_, ext)| OutputFormat::from_extension(ext))
        .map(OutputFormat::content_type)
        .unwrap_or("application/octet-stream");

    Ok(([(header::CONTENT_TYPE, content_type)], bytes).into_response())
}

/// GET /download/{video_id}: ZIP archive of every frame of a finished job.
pub async fn download_archive(
    State(state): State<AppState>,
    Path(video_id): Path<String>,
) -> ApiResult<Response> {
    let job = find_job(&state, &video_id).await?;
    if job.status != JobStatus::Completed {
        return Err(ApiError::Conflict(format!(
            "processing has not finished (status: {})",
            job.status
        )));
    }

    let frames = OutputStore::list_frames(&job.output_dir)
        .await
        .map_err(|e| ApiError::internal(format!("failed to list frames: {e}")))?;
    let dir = job.output_dir.clone();
    let archive = tokio::task::spawn_blocking(move || OutputStore::build_archive(&dir, &frames))
        .await
        .map_err(|e| ApiError::internal(format!("archive task failed: {e}")))?
        .map_err(|e| ApiError::internal(format!("failed to build archive: {e}")))?;

    tracing::info!(video_id = %job.id, bytes = archive.len(), "Serving frame archive");

    Ok((
        [
            (header::CONTENT_TYPE, "application/zip".to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"frames_{}.zip\"", job.id),
            ),
        ],
        archive,
    )
        .into_response())
}
