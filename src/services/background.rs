use async_trait::async_trait;
use image::codecs::png::PngEncoder;
use image::DynamicImage;
use reqwest::{multipart, Client};
use std::time::Duration;

/// Removes the background of a frame, returning an RGBA image.
#[async_trait]
pub trait BackgroundRemover: Send + Sync {
    async fn remove(&self, frame: DynamicImage) -> Result<DynamicImage, BackgroundError>;
}

/// Client for a rembg HTTP server (`rembg s`).
pub struct RembgClient {
    http: Client,
    endpoint: String,
}

impl RembgClient {
    pub fn new(base_url: &str) -> Result<Self, BackgroundError> {
        let http = Client::builder()
            .timeout(Duration::from_secs(120))
            .build()
            .map_err(BackgroundError::Http)?;
        Ok(Self {
            http,
            endpoint: format!("{}/api/remove", base_url.trim_end_matches('/')),
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait]
impl BackgroundRemover for RembgClient {
    async fn remove(&self, frame: DynamicImage) -> Result<DynamicImage, BackgroundError> {
        let png = tokio::task::spawn_blocking(move || {
            let mut buf = Vec::new();
            frame.write_with_encoder(PngEncoder::new(&mut buf)).map(|_| buf)
        })
        .await
        .map_err(|e| BackgroundError::Task(e.to_string()))??;

        let part = multipart::Part::bytes(png)
            .file_name("frame.png")
            .mime_str("image/png")
            .map_err(BackgroundError::Http)?;
        let form = multipart::Form::new().part("file", part);

        let response = self
            .http
            .post(&self.endpoint)
            .multipart(form)
            .send()
            .await
            .map_err(BackgroundError::Http)?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(BackgroundError::Rejected {
                status: status.as_u16(),
                body,
            });
        }

        let bytes = response.bytes().await.map_err(BackgroundError::Http)?;
        tokio::task::spawn_blocking(move || image::load_from_memory(&bytes))
            .await
            .map_err(|e| BackgroundError::Task(e.to_string()))?
            .map(|img| DynamicImage::ImageRgba8(img.to_rgba8()))
            .map_err(BackgroundError::Image)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum BackgroundError {
    #[error("background removal request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("background removal service returned {status}: {body}")]
    Rejected { status: u16, body: String },

    #[error("invalid image from background removal: {0}")]
    Image(#[from] image::ImageError),

    #[error("background removal task failed: {0}")]
    Task(String),
}
