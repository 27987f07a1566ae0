use chrono::{DateTime, Utc};
use garde::Validate;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use strum::{Display, EnumString};
use uuid::Uuid;

/// Status of a frame extraction job.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Display, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum JobStatus {
    Pending,
    Processing,
    Completed,
    Error,
}

impl JobStatus {
    /// Completed and errored jobs never change again.
    pub fn is_terminal(self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::Error)
    }
}

/// Image format each extracted frame is encoded to.
#[derive(
    Debug, Clone, Copy, Default, Serialize, Deserialize, EnumString, Display, PartialEq, Eq,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum OutputFormat {
    #[default]
    Png,
    #[strum(to_string = "jpg", serialize = "jpeg")]
    #[serde(alias = "jpeg")]
    Jpg,
    Webp,
}

impl OutputFormat {
    pub fn extension(self) -> &'static str {
        match self {
            OutputFormat::Png => "png",
            OutputFormat::Jpg => "jpg",
            OutputFormat::Webp => "webp",
        }
    }

    pub fn content_type(self) -> &'static str {
        match self {
            OutputFormat::Png => "image/png",
            OutputFormat::Jpg => "image/jpeg",
            OutputFormat::Webp => "image/webp",
        }
    }

    /// Resolve a frame file extension back to its format.
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_ascii_lowercase().as_str() {
            "png" => Some(OutputFormat::Png),
            "jpg" | "jpeg" => Some(OutputFormat::Jpg),
            "webp" => Some(OutputFormat::Webp),
            _ => None,
        }
    }
}

/// User-selected options controlling how frames are extracted and processed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
pub struct ProcessingParams {
    /// Seconds of video between two extracted frames.
    #[garde(custom(positive_interval))]
    pub interval_secs: f64,

    /// Frames wider than this are scaled down proportionally.
    #[garde(range(min = 1))]
    pub target_width: u32,

    #[garde(skip)]
    pub sharpen: bool,

    #[garde(skip)]
    pub remove_background: bool,

    #[garde(skip)]
    pub output_format: OutputFormat,
}

impl Default for ProcessingParams {
    fn default() -> Self {
        Self {
            interval_secs: 1.0,
            target_width: 512,
            sharpen: false,
            remove_background: false,
            output_format: OutputFormat::Png,
        }
    }
}

fn positive_interval(value: &f64, _ctx: &()) -> garde::Result {
    if value.is_finite() && *value > 0.0 {
        Ok(())
    } else {
        Err(garde::Error::new("interval must be a positive number of seconds"))
    }
}

/// A video processing request and its lifecycle state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FrameJob {
    pub id: Uuid,
    pub status: JobStatus,
    /// Percentage in 0..=100.
    pub progress: u8,
    pub message: String,
    pub error_message: Option<String>,
    /// Frames written to `output_dir` so far.
    pub frames_count: u64,
    /// Frames the extraction is expected to write.
    pub total_frames: u64,
    pub output_dir: PathBuf,
    pub params: ProcessingParams,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl FrameJob {
    pub fn new(id: Uuid, output_dir: PathBuf, params: ProcessingParams) -> Self {
        let now = Utc::now();
        Self {
            id,
            status: JobStatus::Pending,
            progress: 0,
            message: "Waiting to start".to_string(),
            error_message: None,
            frames_count: 0,
            total_frames: 0,
            output_dir,
            params,
            created_at: now,
            updated_at: now,
        }
    }
}
