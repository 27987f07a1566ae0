//! Synthetic decoder and background remover, so the API can be exercised
//! without ffmpeg or a rembg server.

#![allow(dead_code)]

use async_trait::async_trait;
use frame_extract::services::background::{BackgroundError, BackgroundRemover};
use frame_extract::services::video::{ExtractionPlan, FrameSource, FrameStream, MediaError};
use image::{DynamicImage, Rgb, RgbImage, Rgba};
use std::path::Path;
use std::sync::Arc;
use tokio::sync::Semaphore;

/// Pretends every uploaded file is a video with fixed properties.
#[derive(Clone)]
pub struct SyntheticSource {
    pub fps: f64,
    pub video_frames: u64,
    pub width: u32,
    pub height: u32,
    /// Emit an error instead of the frame with this index.
    pub fail_at: Option<u64>,
    /// When set, every emitted frame consumes one permit.
    pub gate: Option<Arc<Semaphore>>,
}

impl SyntheticSource {
    pub fn new(fps: f64, video_frames: u64) -> Self {
        Self {
            fps,
            video_frames,
            width: 640,
            height: 360,
            fail_at: None,
            gate: None,
        }
    }
}

struct SyntheticStream {
    source: SyntheticSource,
    plan: ExtractionPlan,
    next_index: u64,
    emitted: u64,
}

#[async_trait]
impl FrameSource for SyntheticSource {
    async fn open(
        &self,
        path: &Path,
        interval_secs: f64,
    ) -> Result<Box<dyn FrameStream>, MediaError> {
        if !path.exists() {
            return Err(MediaError::FileNotFound(path.to_path_buf()));
        }
        Ok(Box::new(SyntheticStream {
            source: self.clone(),
            plan: ExtractionPlan::new(self.fps, self.video_frames, interval_secs),
            next_index: 0,
            emitted: 0,
        }))
    }
}

#[async_trait]
impl FrameStream for SyntheticStream {
    fn plan(&self) -> ExtractionPlan {
        self.plan
    }

    async fn next_frame(&mut self) -> Result<Option<RgbImage>, MediaError> {
        if self.next_index >= self.plan.total_video_frames {
            return Ok(None);
        }
        if let Some(gate) = &self.source.gate {
            gate.acquire()
                .await
                .map_err(|e| MediaError::Internal(e.to_string()))?
                .forget();
        }
        if Some(self.emitted) == self.source.fail_at {
            return Err(MediaError::InvalidVideo("corrupt frame data".to_string()));
        }

        let shade = (self.emitted * 40 % 256) as u8;
        let frame = RgbImage::from_fn(self.source.width, self.source.height, |x, _| {
            Rgb([shade, (x % 256) as u8, 255 - shade])
        });
        self.next_index += self.plan.frame_skip;
        self.emitted += 1;
        Ok(Some(frame))
    }
}

/// Makes the left half of every frame transparent.
pub struct HalfTransparentRemover;

#[async_trait]
impl BackgroundRemover for HalfTransparentRemover {
    async fn remove(&self, frame: DynamicImage) -> Result<DynamicImage, BackgroundError> {
        let mut rgba = frame.to_rgba8();
        let half = rgba.width() / 2;
        for (x, _, pixel) in rgba.enumerate_pixels_mut() {
            if x < half {
                *pixel = Rgba([pixel.0[0], pixel.0[1], pixel.0[2], 0]);
            }
        }
        Ok(DynamicImage::ImageRgba8(rgba))
    }
}
