//! Background frame extraction jobs.
//!
//! Every accepted upload gets exactly one task, spawned by [`JobRunner`] and
//! tracked by job id until it finishes. The task runs the pipeline stages in
//! a fixed order and is the only writer of its job's registry record.

use image::DynamicImage;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use uuid::Uuid;

use crate::models::job::{FrameJob, ProcessingParams};
use crate::services::background::{BackgroundError, BackgroundRemover};
use crate::services::frames::{self, FrameError};
use crate::services::outputs::OutputStore;
use crate::services::registry::JobRegistry;
use crate::services::video::{FrameSource, MediaError};

/// Spawns one pipeline task per job and keeps its handle until it finishes.
pub struct JobRunner {
    registry: Arc<JobRegistry>,
    source: Arc<dyn FrameSource>,
    remover: Option<Arc<dyn BackgroundRemover>>,
    running: Mutex<HashMap<Uuid, JoinHandle<()>>>,
}

impl JobRunner {
    pub fn new(
        registry: Arc<JobRegistry>,
        source: Arc<dyn FrameSource>,
        remover: Option<Arc<dyn BackgroundRemover>>,
    ) -> Self {
        Self {
            registry,
            source,
            remover,
            running: Mutex::new(HashMap::new()),
        }
    }

    pub fn source(&self) -> &Arc<dyn FrameSource> {
        &self.source
    }

    pub fn background_removal_enabled(&self) -> bool {
        self.remover.is_some()
    }

    /// Start processing `job`, reading frames from `video_path`.
    ///
    /// The video file is deleted once the job reaches a terminal state.
    pub async fn spawn(&self, job: &FrameJob, video_path: PathBuf) {
        let task = JobTask {
            id: job.id,
            params: job.params.clone(),
            output_dir: job.output_dir.clone(),
            video_path,
            registry: Arc::clone(&self.registry),
            source: Arc::clone(&self.source),
            remover: self.remover.clone(),
        };
        let handle = tokio::spawn(task.run());

        let mut running = self.running.lock().await;
        running.retain(|_, handle| !handle.is_finished());
        running.insert(job.id, handle);
    }

    /// Number of jobs whose task has not finished yet.
    pub async fn active_jobs(&self) -> usize {
        let mut running = self.running.lock().await;
        running.retain(|_, handle| !handle.is_finished());
        running.len()
    }

    /// Wait for every running job to reach a terminal state.
    pub async fn wait_all(&self) {
        let handles: Vec<(Uuid, JoinHandle<()>)> = self.running.lock().await.drain().collect();
        for (id, handle) in handles {
            if let Err(e) = handle.await {
                tracing::error!(video_id = %id, error = %e, "Job task panicked");
            }
        }
    }
}

struct JobTask {
    id: Uuid,
    params: ProcessingParams,
    output_dir: PathBuf,
    video_path: PathBuf,
    registry: Arc<JobRegistry>,
    source: Arc<dyn FrameSource>,
    remover: Option<Arc<dyn BackgroundRemover>>,
}

impl JobTask {
    async fn run(self) {
        let start = Instant::now();
        tracing::info!(
            video_id = %self.id,
            interval_secs = self.params.interval_secs,
            target_width = self.params.target_width,
            sharpen = self.params.sharpen,
            remove_background = self.params.remove_background,
            output_format = %self.params.output_format,
            "Processing video"
        );

        match self.process().await {
            Ok(frames_count) => {
                self.registry
                    .complete(
                        self.id,
                        frames_count,
                        format!("Processing finished. {frames_count} frames generated."),
                    )
                    .await;
                metrics::counter!("frame_jobs_completed").increment(1);
                tracing::info!(
                    video_id = %self.id,
                    frames_count,
                    duration_ms = start.elapsed().as_millis() as u64,
                    "Job completed"
                );
            }
            Err(e) => {
                self.registry.fail(self.id, format!("Processing error: {e}")).await;
                metrics::counter!("frame_jobs_failed").increment(1);
                tracing::error!(video_id = %self.id, error = %e, "Job failed");
            }
        }
        metrics::histogram!("frame_job_processing_seconds").record(start.elapsed().as_secs_f64());

        remove_source_video(self.id, &self.video_path).await;
    }

    /// Run the pipeline, returning the number of frames written.
    async fn process(&self) -> Result<u64, PipelineError> {
        self.registry.update(self.id, 0, "Opening video").await;

        let remover = match (self.params.remove_background, &self.remover) {
            (true, None) => return Err(PipelineError::BackgroundDisabled),
            (true, Some(remover)) => Some(Arc::clone(remover)),
            (false, _) => None,
        };

        let mut stream = self
            .source
            .open(&self.video_path, self.params.interval_secs)
            .await?;
        let plan = stream.plan();

        self.registry
            .start(
                self.id,
                plan.expected_frames,
                format!(
                    "Video: {} frames at {:.2} FPS. Extracting every {}s ({} frames).",
                    plan.total_video_frames, plan.fps, self.params.interval_secs, plan.frame_skip
                ),
            )
            .await;

        tokio::fs::create_dir_all(&self.output_dir).await?;

        let mut written: u64 = 0;
        while let Some(frame) = stream.next_frame().await? {
            let params = self.params.clone();
            let prepared = tokio::task::spawn_blocking(move || {
                let frame = frames::resize_to_width(frame, params.target_width);
                if params.sharpen {
                    frames::sharpen(&frame)
                } else {
                    frame
                }
            })
            .await?;

            let mut image = DynamicImage::ImageRgb8(prepared);
            if let Some(remover) = &remover {
                image = remover.remove(image).await?;
            }

            let format = self.params.output_format;
            let bytes = tokio::task::spawn_blocking(move || frames::encode(&image, format)).await??;

            let filename = frames::frame_filename(written, format);
            OutputStore::write_frame(&self.output_dir, &filename, &bytes)
                .await
                .map_err(FrameError::Io)?;
            written += 1;
            metrics::counter!("frames_extracted_total").increment(1);

            let progress = progress_percent(written, plan.expected_frames);
            self.registry
                .record_frame(
                    self.id,
                    written,
                    progress,
                    format!("Extraction: {written} frames generated. Progress: {progress}%"),
                )
                .await;
            tracing::debug!(video_id = %self.id, frame = %filename, progress, "Frame written");
        }

        Ok(written)
    }
}

/// `floor(done / expected * 100)`, capped at 100. Unknown totals report 0.
pub fn progress_percent(done: u64, expected: u64) -> u8 {
    if expected == 0 {
        return 0;
    }
    (done.saturating_mul(100) / expected).min(100) as u8
}

async fn remove_source_video(id: Uuid, path: &Path) {
    match tokio::fs::remove_file(path).await {
        Ok(()) => tracing::debug!(video_id = %id, path = %path.display(), "Removed source video"),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => {
            tracing::warn!(
                video_id = %id,
                path = %path.display(),
                error = %e,
                "Failed to remove source video"
            )
        }
    }
}

/// Any failure that stops a job. Its message is what the client sees.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error(transparent)]
    Media(#[from] MediaError),

    #[error(transparent)]
    Frame(#[from] FrameError),

    #[error(transparent)]
    Background(#[from] BackgroundError),

    #[error("background removal was requested but no background removal service is configured")]
    BackgroundDisabled,

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("frame processing task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}
