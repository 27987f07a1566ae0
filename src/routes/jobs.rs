use axum::extract::{Multipart, Path, State};
use axum::http::StatusCode;
use axum::Json;
use garde::Validate;
use std::path::PathBuf;
use std::str::FromStr;
use tokio::io::AsyncWriteExt;
use uuid::Uuid;

use crate::app_state::AppState;
use crate::error::{ApiError, ApiResult};
use crate::models::job::{FrameJob, OutputFormat, ProcessingParams};
use crate::models::progress::{ProcessResponse, ProgressResponse};
use crate::routes::find_job;
use crate::services::uploads::{is_allowed_video, UploadStore};

/// Raw form fields of a processing request.
#[derive(Debug, Default)]
struct ProcessForm {
    interval: Option<String>,
    target_width: Option<String>,
    output_format: Option<String>,
    sharpen: bool,
    remove_background: bool,
}

impl ProcessForm {
    fn into_params(self) -> ApiResult<ProcessingParams> {
        let defaults = ProcessingParams::default();

        let interval_secs = match non_empty(self.interval.as_deref()) {
            Some(raw) => raw
                .parse::<f64>()
                .map_err(|_| ApiError::bad_request(format!("invalid interval: {raw}")))?,
            None => defaults.interval_secs,
        };

        let target_width = match non_empty(self.target_width.as_deref()) {
            Some(raw) => raw
                .parse::<u32>()
                .map_err(|_| ApiError::bad_request(format!("invalid target width: {raw}")))?,
            None => defaults.target_width,
        };

        let output_format = match non_empty(self.output_format.as_deref()) {
            Some(raw) => OutputFormat::from_str(raw)
                .map_err(|_| ApiError::bad_request(format!("unsupported output format: {raw}")))?,
            None => defaults.output_format,
        };

        let params = ProcessingParams {
            interval_secs,
            target_width,
            sharpen: self.sharpen,
            remove_background: self.remove_background,
            output_format,
        };
        params
            .validate()
            .map_err(|e| ApiError::bad_request(format!("invalid processing parameters: {e}")))?;
        Ok(params)
    }
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

/// Checkbox semantics: "on", "true", "1" and "yes" enable a flag.
fn is_checked(value: &str) -> bool {
    matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "on" | "true" | "1" | "yes"
    )
}

/// POST /process: upload a video and start extracting its frames.
pub async fn submit_job(
    State(state): State<AppState>,
    multipart: Multipart,
) -> ApiResult<(StatusCode, Json<ProcessResponse>)> {
    let video_id = Uuid::new_v4();
    let mut form = ProcessForm::default();
    let mut video_path = None;

    let received =
        receive_upload(&state.uploads, video_id, multipart, &mut form, &mut video_path).await;
    if let Err(e) = received {
        if let Some(path) = &video_path {
            discard_upload(path).await;
        }
        return Err(e);
    }
    let Some(video_path) = video_path else {
        return Err(ApiError::bad_request("no video file provided"));
    };

    let params = match form.into_params() {
        Ok(params) => params,
        Err(e) => {
            discard_upload(&video_path).await;
            return Err(e);
        }
    };

    let job = FrameJob::new(video_id, state.outputs.job_dir(video_id), params);
    state.registry.create(job.clone()).await;
    state.runner.spawn(&job, video_path).await;

    metrics::counter!("frame_jobs_total").increment(1);
    tracing::info!(video_id = %video_id, "Video accepted for processing");

    Ok((
        StatusCode::ACCEPTED,
        Json(ProcessResponse {
            video_id,
            message: "Processing started".to_string(),
        }),
    ))
}

/// Read every multipart field, streaming the video to the upload directory.
///
/// `video_path` is set as soon as the upload file exists, so the caller can
/// discard it when a later field fails.
async fn receive_upload(
    uploads: &UploadStore,
    video_id: Uuid,
    mut multipart: Multipart,
    form: &mut ProcessForm,
    video_path: &mut Option<PathBuf>,
) -> ApiResult<()> {
    while let Some(mut field) = multipart.next_field().await? {
        let name = field.name().unwrap_or_default().to_string();

        match name.as_str() {
            "video_file" => {
                if video_path.is_some() {
                    return Err(ApiError::bad_request("only one video file may be uploaded"));
                }
                let filename = field.file_name().unwrap_or_default().to_string();
                if filename.trim().is_empty() {
                    return Err(ApiError::bad_request("empty file name"));
                }
                if !is_allowed_video(&filename) {
                    return Err(ApiError::bad_request("file type not allowed"));
                }

                tokio::fs::create_dir_all(uploads.root()).await.map_err(|e| {
                    ApiError::internal(format!("failed to prepare upload directory: {e}"))
                })?;
                let path = uploads.path_for(video_id, &filename);
                let mut file = tokio::fs::File::create(&path)
                    .await
                    .map_err(|e| ApiError::internal(format!("failed to store upload: {e}")))?;
                *video_path = Some(path);

                while let Some(chunk) = field.chunk().await? {
                    file.write_all(&chunk)
                        .await
                        .map_err(|e| ApiError::internal(format!("failed to store upload: {e}")))?;
                }
                file.flush()
                    .await
                    .map_err(|e| ApiError::internal(format!("failed to store upload: {e}")))?;
            }
            "interval" | "target_width" | "output_format" | "sharpen" | "unblur_option"
            | "remove_background" => {
                let value = field.text().await?;
                match name.as_str() {
                    "interval" => form.interval = Some(value),
                    "target_width" => form.target_width = Some(value),
                    "output_format" => form.output_format = Some(value),
                    "sharpen" | "unblur_option" => form.sharpen |= is_checked(&value),
                    _ => form.remove_background = is_checked(&value),
                }
            }
            other => {
                tracing::debug!(field = other, "Ignoring unknown form field");
            }
        }
    }

    Ok(())
}

async fn discard_upload(path: &std::path::Path) {
    if let Err(e) = tokio::fs::remove_file(path).await {
        tracing::warn!(path = %path.display(), error = %e, "Failed to discard rejected upload");
    }
}

/// GET /progress/{video_id}: current status of a job.
pub async fn get_progress(
    State(state): State<AppState>,
    Path(video_id): Path<String>,
) -> ApiResult<Json<ProgressResponse>> {
    let job = find_job(&state, &video_id).await?;
    Ok(Json(ProgressResponse::from(&job)))
}
