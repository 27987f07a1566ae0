//! Test helper utilities for driving the HTTP API

#![allow(dead_code)]

use frame_extract::{
    app_state::AppState,
    models::progress::{FramesResponse, ProcessResponse, ProgressResponse},
    routes,
    services::{
        background::BackgroundRemover, outputs::OutputStore, registry::JobRegistry,
        uploads::UploadStore, video::FrameSource, worker::JobRunner,
    },
};
use reqwest::multipart;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use tokio::time::sleep;
use uuid::Uuid;

/// A server running on an ephemeral port with its own storage directories.
pub struct TestApp {
    pub base_url: String,
    pub state: AppState,
    pub dir: TempDir,
}

impl TestApp {
    pub fn upload_dir(&self) -> std::path::PathBuf {
        self.dir.path().join("uploads")
    }
}

pub async fn spawn_app(
    source: Arc<dyn FrameSource>,
    remover: Option<Arc<dyn BackgroundRemover>>,
) -> TestApp {
    let dir = tempfile::tempdir().expect("Failed to create temp dir");
    let registry = Arc::new(JobRegistry::new());
    let runner = JobRunner::new(Arc::clone(&registry), source, remover);
    let state = AppState::new(
        registry,
        runner,
        UploadStore::new(dir.path().join("uploads"), 16 * 1024 * 1024),
        OutputStore::new(dir.path().join("outputs")),
    );

    let app = routes::build_router(state.clone());
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind test listener");
    let addr = listener.local_addr().expect("Failed to read local address");
    tokio::spawn(async move {
        axum::serve(listener, app).await.expect("Test server error");
    });

    TestApp {
        base_url: format!("http://{}", addr),
        state,
        dir,
    }
}

/// Upload a video to POST /process with the given extra form fields.
pub async fn upload_video(
    client: &reqwest::Client,
    base_url: &str,
    filename: &str,
    bytes: Vec<u8>,
    fields: &[(&str, &str)],
) -> Result<reqwest::Response, reqwest::Error> {
    let mut form = multipart::Form::new().part(
        "video_file",
        multipart::Part::bytes(bytes).file_name(filename.to_string()),
    );
    for (name, value) in fields {
        form = form.text(name.to_string(), value.to_string());
    }

    client
        .post(format!("{}/process", base_url))
        .multipart(form)
        .send()
        .await
}

/// Upload and return the new job id, failing on a non-success status.
pub async fn submit(
    client: &reqwest::Client,
    base_url: &str,
    fields: &[(&str, &str)],
) -> Result<Uuid, Box<dyn std::error::Error>> {
    let response =
        upload_video(client, base_url, "clip.mp4", b"fake video".to_vec(), fields).await?;
    let status = response.status();
    if !status.is_success() {
        let error_text = response.text().await?;
        return Err(format!("Upload failed with status {}: {}", status, error_text).into());
    }
    Ok(response.json::<ProcessResponse>().await?.video_id)
}

pub async fn get_progress(
    client: &reqwest::Client,
    base_url: &str,
    video_id: Uuid,
) -> Result<ProgressResponse, Box<dyn std::error::Error>> {
    let response = client
        .get(format!("{}/progress/{}", base_url, video_id))
        .send()
        .await?;
    if !response.status().is_success() {
        return Err(format!("Progress check failed: {}", response.status()).into());
    }
    Ok(response.json::<ProgressResponse>().await?)
}

pub async fn get_frames(
    client: &reqwest::Client,
    base_url: &str,
    video_id: Uuid,
) -> Result<Vec<String>, Box<dyn std::error::Error>> {
    let response = client
        .get(format!("{}/frames/{}", base_url, video_id))
        .send()
        .await?;
    if !response.status().is_success() {
        return Err(format!("Frame listing failed: {}", response.status()).into());
    }
    Ok(response.json::<FramesResponse>().await?.frames)
}

/// Poll progress until the job is completed or errored, returning every
/// observed snapshot in order (the last one is terminal).
pub async fn poll_until_finished(
    client: &reqwest::Client,
    base_url: &str,
    video_id: Uuid,
    poll_interval: Duration,
    timeout: Duration,
) -> Result<Vec<ProgressResponse>, Box<dyn std::error::Error>> {
    let deadline = tokio::time::Instant::now() + timeout;
    let mut history = Vec::new();

    loop {
        let snapshot = get_progress(client, base_url, video_id).await?;
        let finished = snapshot.status.is_terminal();
        history.push(snapshot);
        if finished {
            return Ok(history);
        }
        if tokio::time::Instant::now() >= deadline {
            return Err(format!("Job did not finish within {:?}", timeout).into());
        }
        sleep(poll_interval).await;
    }
}

/// Poll until the job has written at least `count` frames.
pub async fn wait_for_frames(
    client: &reqwest::Client,
    base_url: &str,
    video_id: Uuid,
    count: u64,
) -> Result<ProgressResponse, Box<dyn std::error::Error>> {
    for _ in 0..500 {
        let snapshot = get_progress(client, base_url, video_id).await?;
        if snapshot.frames_count >= count {
            return Ok(snapshot);
        }
        sleep(Duration::from_millis(10)).await;
    }
    Err(format!("Job never reached {} frames", count).into())
}

/// Assert that progress never went backwards across polled snapshots.
pub fn assert_monotonic(history: &[ProgressResponse]) {
    for pair in history.windows(2) {
        assert!(
            pair[1].progress >= pair[0].progress,
            "progress went backwards: {} -> {}",
            pair[0].progress,
            pair[1].progress
        );
        assert!(
            pair[1].frames_count >= pair[0].frames_count,
            "frames_count went backwards: {} -> {}",
            pair[0].frames_count,
            pair[1].frames_count
        );
    }
}
