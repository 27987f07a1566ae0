use chrono::Utc;
use serde::Serialize;
use std::collections::HashMap;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::models::job::{FrameJob, JobStatus};

/// Number of known jobs in each status.
#[derive(Debug, Default, Clone, Serialize, PartialEq, Eq)]
pub struct JobCounts {
    pub pending: usize,
    pub processing: usize,
    pub completed: usize,
    pub error: usize,
}

/// In-memory store of job records keyed by job id.
///
/// Handlers only read from it; every mutation after `create` comes from the
/// job's own worker. Each read/modify/write happens under the write lock, and
/// jobs in a terminal state are never modified again.
#[derive(Debug, Default)]
pub struct JobRegistry {
    jobs: RwLock<HashMap<Uuid, FrameJob>>,
}

impl JobRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a new job and return its id.
    pub async fn create(&self, job: FrameJob) -> Uuid {
        let id = job.id;
        self.jobs.write().await.insert(id, job);
        id
    }

    /// Snapshot of a job record.
    pub async fn get(&self, id: Uuid) -> Option<FrameJob> {
        self.jobs.read().await.get(&id).cloned()
    }

    /// Set progress and message. Progress never decreases.
    pub async fn update(&self, id: Uuid, progress: u8, message: impl Into<String>) {
        let message = message.into();
        self.mutate(id, |job| {
            job.progress = job.progress.max(progress.min(100));
            job.message = message;
        })
        .await;
    }

    /// Move a pending job to `processing`.
    pub async fn start(&self, id: Uuid, total_frames: u64, message: impl Into<String>) {
        let message = message.into();
        self.mutate(id, |job| {
            job.status = JobStatus::Processing;
            job.total_frames = total_frames;
            job.message = message;
        })
        .await;
    }

    /// Record that another frame has been written.
    pub async fn record_frame(
        &self,
        id: Uuid,
        frames_count: u64,
        progress: u8,
        message: impl Into<String>,
    ) {
        let message = message.into();
        self.mutate(id, |job| {
            job.frames_count = job.frames_count.max(frames_count);
            job.progress = job.progress.max(progress.min(100));
            job.message = message;
        })
        .await;
    }

    pub async fn complete(&self, id: Uuid, frames_count: u64, message: impl Into<String>) {
        let message = message.into();
        self.mutate(id, |job| {
            job.status = JobStatus::Completed;
            job.frames_count = frames_count;
            job.progress = 100;
            job.message = message;
        })
        .await;
    }

    pub async fn fail(&self, id: Uuid, error_message: impl Into<String>) {
        let error_message = error_message.into();
        self.mutate(id, |job| {
            job.status = JobStatus::Error;
            job.progress = 100;
            job.message = error_message.clone();
            job.error_message = Some(error_message);
        })
        .await;
    }

    pub async fn counts(&self) -> JobCounts {
        let jobs = self.jobs.read().await;
        let mut counts = JobCounts::default();
        for job in jobs.values() {
            match job.status {
                JobStatus::Pending => counts.pending += 1,
                JobStatus::Processing => counts.processing += 1,
                JobStatus::Completed => counts.completed += 1,
                JobStatus::Error => counts.error += 1,
            }
        }
        counts
    }

    async fn mutate(&self, id: Uuid, apply: impl FnOnce(&mut FrameJob)) {
        let mut jobs = self.jobs.write().await;
        match jobs.get_mut(&id) {
            Some(job) if !job.status.is_terminal() => {
                apply(job);
                job.updated_at = Utc::now();
            }
            Some(job) => {
                tracing::debug!(
                    video_id = %id,
                    status = %job.status,
                    "Ignoring update to finished job"
                );
            }
            None => {
                tracing::warn!(video_id = %id, "Ignoring update to unknown job");
            }
        }
    }
}
