use image::codecs::jpeg::JpegEncoder;
use image::codecs::png::PngEncoder;
use image::codecs::webp::WebPEncoder;
use image::imageops::{self, FilterType};
use image::{DynamicImage, RgbImage};

use crate::models::job::OutputFormat;

/// JPEG quality used for `jpg` output.
const JPEG_QUALITY: u8 = 95;

/// Gaussian sigma of the unsharp mask.
const SHARPEN_SIGMA: f32 = 5.0;

/// Deterministic file name of the frame at `index`.
pub fn frame_filename(index: u64, format: OutputFormat) -> String {
    format!("frame_{:05}.{}", index, format.extension())
}

/// Scale a frame down to `target_width`, keeping its aspect ratio.
///
/// Frames already narrower than the target are returned untouched.
pub fn resize_to_width(frame: RgbImage, target_width: u32) -> RgbImage {
    let (width, height) = frame.dimensions();
    if target_width == 0 || width <= target_width {
        return frame;
    }
    let target_height = ((height as u64 * target_width as u64) / width as u64).max(1) as u32;
    imageops::resize(&frame, target_width, target_height, FilterType::Triangle)
}

/// Unsharp mask: `1.5 * original - 0.5 * blurred`.
pub fn sharpen(frame: &RgbImage) -> RgbImage {
    let blurred = imageops::blur(frame, SHARPEN_SIGMA);
    let mut out = frame.clone();
    for (pixel, soft) in out.pixels_mut().zip(blurred.pixels()) {
        for (channel, blurred_channel) in pixel.0.iter_mut().zip(soft.0) {
            let value = 1.5 * f32::from(*channel) - 0.5 * f32::from(blurred_channel);
            *channel = value.round().clamp(0.0, 255.0) as u8;
        }
    }
    out
}

/// Encode a processed frame.
///
/// PNG and WebP keep an alpha channel when the frame has one; JPEG drops it.
pub fn encode(frame: &DynamicImage, format: OutputFormat) -> Result<Vec<u8>, FrameError> {
    let mut buf = Vec::new();
    match format {
        OutputFormat::Png => {
            frame.write_with_encoder(PngEncoder::new(&mut buf))?;
        }
        OutputFormat::Jpg => {
            let rgb = frame.to_rgb8();
            rgb.write_with_encoder(JpegEncoder::new_with_quality(&mut buf, JPEG_QUALITY))?;
        }
        OutputFormat::Webp => {
            let encoder = WebPEncoder::new_lossless(&mut buf);
            if frame.color().has_alpha() {
                frame.to_rgba8().write_with_encoder(encoder)?;
            } else {
                frame.to_rgb8().write_with_encoder(encoder)?;
            }
        }
    }
    Ok(buf)
}

#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    #[error("image encoding failed: {0}")]
    Image(#[from] image::ImageError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
