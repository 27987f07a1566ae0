use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::job::{FrameJob, JobStatus};

/// Response after accepting an upload.
#[derive(Debug, Serialize, Deserialize)]
pub struct ProcessResponse {
    pub video_id: Uuid,
    pub message: String,
}

/// Response for polling job progress.
#[derive(Debug, Serialize, Deserialize)]
pub struct ProgressResponse {
    pub status: JobStatus,
    pub progress: u8,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub error_message: Option<String>,
    pub frames_count: u64,
    pub total_frames: u64,
}

impl From<&FrameJob> for ProgressResponse {
    fn from(job: &FrameJob) -> Self {
        Self {
            status: job.status,
            progress: job.progress,
            message: job.message.clone(),
            error_message: job.error_message.clone(),
            frames_count: job.frames_count,
            total_frames: job.total_frames,
        }
    }
}

/// Response listing the frames written for a job.
#[derive(Debug, Serialize, Deserialize)]
pub struct FramesResponse {
    pub frames: Vec<String>,
}
