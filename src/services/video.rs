//! Video decoding through the ffmpeg/ffprobe command line tools.
//!
//! The video is probed once for its frame rate and frame count, then ffmpeg
//! decodes only the frames selected by the extraction interval and streams
//! them as raw RGB24 on stdout, one frame at a time.

use async_trait::async_trait;
use image::RgbImage;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::{Child, ChildStdout, Command};
use tokio::task::JoinHandle;

/// How many frames an extraction will produce.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ExtractionPlan {
    pub fps: f64,
    /// Frames in the video stream.
    pub total_video_frames: u64,
    /// Decoded frames between two extracted frames.
    pub frame_skip: u64,
    /// Frames the extraction will emit.
    pub expected_frames: u64,
}

impl ExtractionPlan {
    pub fn new(fps: f64, total_video_frames: u64, interval_secs: f64) -> Self {
        let frame_skip = frame_skip(fps, interval_secs);
        Self {
            fps,
            total_video_frames,
            frame_skip,
            expected_frames: total_video_frames.div_ceil(frame_skip),
        }
    }

    /// Whether the frame at this decode index is extracted.
    pub fn selects(&self, frame_index: u64) -> bool {
        frame_index % self.frame_skip == 0
    }
}

/// `max(1, floor(fps * interval))`.
pub fn frame_skip(fps: f64, interval_secs: f64) -> u64 {
    let skip = (fps * interval_secs).floor();
    if skip.is_finite() && skip >= 1.0 {
        skip as u64
    } else {
        1
    }
}

/// Opens videos for frame extraction.
#[async_trait]
pub trait FrameSource: Send + Sync {
    async fn open(
        &self,
        path: &Path,
        interval_secs: f64,
    ) -> Result<Box<dyn FrameStream>, MediaError>;

    /// Check that the decoder is usable.
    fn health_check(&self) -> Result<(), MediaError> {
        Ok(())
    }
}

/// Frames selected by an [`ExtractionPlan`], in decode order.
#[async_trait]
pub trait FrameStream: Send {
    fn plan(&self) -> ExtractionPlan;

    /// Next selected frame, or `None` once the video is exhausted.
    async fn next_frame(&mut self) -> Result<Option<RgbImage>, MediaError>;
}

/// [`FrameSource`] backed by the ffmpeg and ffprobe binaries.
#[derive(Debug, Clone)]
pub struct FfmpegSource {
    ffmpeg: PathBuf,
    ffprobe: PathBuf,
}

impl FfmpegSource {
    pub fn new(ffmpeg: impl Into<PathBuf>, ffprobe: impl Into<PathBuf>) -> Self {
        Self {
            ffmpeg: ffmpeg.into(),
            ffprobe: ffprobe.into(),
        }
    }

    /// Read the dimensions, frame rate and frame count of the first video stream.
    pub async fn probe(&self, path: &Path) -> Result<VideoInfo, MediaError> {
        if !path.exists() {
            return Err(MediaError::FileNotFound(path.to_path_buf()));
        }
        which::which(&self.ffprobe).map_err(|_| MediaError::FfprobeNotFound)?;

        let output = Command::new(&self.ffprobe)
            .args([
                "-v",
                "error",
                "-print_format",
                "json",
                "-show_format",
                "-show_streams",
            ])
            .arg(path)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .await?;

        if !output.status.success() {
            return Err(MediaError::FfprobeFailed {
                message: "could not open the video file".to_string(),
                stderr: Some(String::from_utf8_lossy(&output.stderr).trim().to_string()),
            });
        }

        VideoInfo::from_ffprobe_json(&output.stdout)
    }
}

#[async_trait]
impl FrameSource for FfmpegSource {
    async fn open(
        &self,
        path: &Path,
        interval_secs: f64,
    ) -> Result<Box<dyn FrameStream>, MediaError> {
        let info = self.probe(path).await?;
        which::which(&self.ffmpeg).map_err(|_| MediaError::FfmpegNotFound)?;

        let plan = ExtractionPlan::new(info.fps, info.frame_count, interval_secs);
        tracing::debug!(
            path = %path.display(),
            width = info.width,
            height = info.height,
            fps = info.fps,
            duration_secs = info.duration,
            frame_count = info.frame_count,
            frame_skip = plan.frame_skip,
            "Starting ffmpeg frame decode"
        );

        let select = format!("select=not(mod(n\\,{}))", plan.frame_skip);
        let mut child = Command::new(&self.ffmpeg)
            .args(["-v", "error", "-nostdin", "-noautorotate", "-i"])
            .arg(path)
            .args([
                "-map",
                "0:v:0",
                "-vf",
                select.as_str(),
                "-fps_mode",
                "passthrough",
                "-f",
                "rawvideo",
                "-pix_fmt",
                "rgb24",
                "-",
            ])
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()?;

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| MediaError::Internal("ffmpeg stdout was not captured".to_string()))?;
        let stderr_task = child.stderr.take().map(collect_output);

        Ok(Box::new(FfmpegStream {
            child,
            stdout,
            stderr_task,
            width: info.width,
            height: info.height,
            plan,
        }))
    }

    fn health_check(&self) -> Result<(), MediaError> {
        which::which(&self.ffmpeg).map_err(|_| MediaError::FfmpegNotFound)?;
        which::which(&self.ffprobe).map_err(|_| MediaError::FfprobeNotFound)?;
        Ok(())
    }
}

fn collect_output<R>(mut reader: R) -> JoinHandle<String>
where
    R: AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let mut out = String::new();
        let _ = reader.read_to_string(&mut out).await;
        out
    })
}

struct FfmpegStream {
    child: Child,
    stdout: ChildStdout,
    stderr_task: Option<JoinHandle<String>>,
    width: u32,
    height: u32,
    plan: ExtractionPlan,
}

impl FfmpegStream {
    fn frame_len(&self) -> usize {
        self.width as usize * self.height as usize * 3
    }

    async fn finish(&mut self) -> Result<(), MediaError> {
        let status = self.child.wait().await?;
        let stderr = match self.stderr_task.take() {
            Some(task) => task.await.unwrap_or_default(),
            None => String::new(),
        };

        if status.success() {
            Ok(())
        } else {
            tracing::warn!(exit_code = ?status.code(), "ffmpeg exited with an error");
            Err(MediaError::FfmpegFailed {
                message: format!("ffmpeg exited with {status}"),
                stderr: Some(stderr.trim().to_string()),
                exit_code: status.code(),
            })
        }
    }
}

#[async_trait]
impl FrameStream for FfmpegStream {
    fn plan(&self) -> ExtractionPlan {
        self.plan
    }

    async fn next_frame(&mut self) -> Result<Option<RgbImage>, MediaError> {
        let frame_len = self.frame_len();
        let mut buf = vec![0u8; frame_len];
        let mut filled = 0;
        while filled < frame_len {
            let read = self.stdout.read(&mut buf[filled..]).await?;
            if read == 0 {
                break;
            }
            filled += read;
        }

        if filled == 0 {
            self.finish().await?;
            return Ok(None);
        }
        if filled < frame_len {
            self.finish().await?;
            return Err(MediaError::TruncatedFrame {
                expected: frame_len,
                received: filled,
            });
        }

        RgbImage::from_raw(self.width, self.height, buf)
            .map(Some)
            .ok_or_else(|| {
                MediaError::Internal("frame buffer does not match dimensions".to_string())
            })
    }
}

/// Stream properties reported by ffprobe.
#[derive(Debug, Clone, PartialEq)]
pub struct VideoInfo {
    pub width: u32,
    pub height: u32,
    pub fps: f64,
    /// Container frame count, or `duration * fps` when the container has none.
    pub frame_count: u64,
    pub duration: f64,
}

#[derive(Debug, Deserialize)]
struct FfprobeOutput {
    #[serde(default)]
    format: Option<FfprobeFormat>,
    #[serde(default)]
    streams: Vec<FfprobeStream>,
}

#[derive(Debug, Deserialize)]
struct FfprobeFormat {
    duration: Option<String>,
}

#[derive(Debug, Deserialize)]
struct FfprobeStream {
    codec_type: Option<String>,
    width: Option<u32>,
    height: Option<u32>,
    avg_frame_rate: Option<String>,
    r_frame_rate: Option<String>,
    nb_frames: Option<String>,
    duration: Option<String>,
}

impl VideoInfo {
    pub fn from_ffprobe_json(raw: &[u8]) -> Result<Self, MediaError> {
        let probe: FfprobeOutput = serde_json::from_slice(raw)?;

        let stream = probe
            .streams
            .iter()
            .find(|s| s.codec_type.as_deref() == Some("video"))
            .ok_or_else(|| MediaError::InvalidVideo("no video stream found".to_string()))?;

        let width = stream.width.unwrap_or(0);
        let height = stream.height.unwrap_or(0);
        if width == 0 || height == 0 {
            return Err(MediaError::InvalidVideo(
                "video stream has no dimensions".to_string(),
            ));
        }

        let fps = stream
            .avg_frame_rate
            .as_deref()
            .and_then(parse_frame_rate)
            .or_else(|| stream.r_frame_rate.as_deref().and_then(parse_frame_rate))
            .ok_or_else(|| MediaError::InvalidVideo("unknown frame rate".to_string()))?;

        let duration = stream
            .duration
            .as_deref()
            .or(probe.format.as_ref().and_then(|f| f.duration.as_deref()))
            .and_then(|d| d.parse::<f64>().ok())
            .unwrap_or(0.0);

        let frame_count = stream
            .nb_frames
            .as_deref()
            .and_then(|n| n.parse::<u64>().ok())
            .filter(|n| *n > 0)
            .unwrap_or_else(|| (duration * fps).round().max(0.0) as u64);

        Ok(Self {
            width,
            height,
            fps,
            frame_count,
            duration,
        })
    }
}

/// Parse a frame rate like "30000/1001" or "25".
fn parse_frame_rate(raw: &str) -> Option<f64> {
    let fps = match raw.split_once('/') {
        Some((num, den)) => {
            let num: f64 = num.trim().parse().ok()?;
            let den: f64 = den.trim().parse().ok()?;
            if den == 0.0 {
                return None;
            }
            num / den
        }
        None => raw.trim().parse().ok()?,
    };
    (fps.is_finite() && fps > 0.0).then_some(fps)
}

#[derive(Debug, thiserror::Error)]
pub enum MediaError {
    #[error("ffmpeg not found in PATH")]
    FfmpegNotFound,

    #[error("ffprobe not found in PATH")]
    FfprobeNotFound,

    #[error("{message}: {}", .stderr.as_deref().unwrap_or_default())]
    FfmpegFailed {
        message: String,
        stderr: Option<String>,
        exit_code: Option<i32>,
    },

    #[error("{message}: {}", .stderr.as_deref().unwrap_or_default())]
    FfprobeFailed {
        message: String,
        stderr: Option<String>,
    },

    #[error("video file not found: {}", .0.display())]
    FileNotFound(PathBuf),

    #[error("invalid video: {0}")]
    InvalidVideo(String),

    #[error("truncated frame: expected {expected} bytes, received {received}")]
    TruncatedFrame { expected: usize, received: usize },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("could not parse ffprobe output: {0}")]
    JsonParse(#[from] serde_json::Error),

    #[error("internal error: {0}")]
    Internal(String),
}
