use std::io::{Cursor, Write};
use std::path::{Path, PathBuf};
use uuid::Uuid;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

use crate::models::job::OutputFormat;

const FRAME_PREFIX: &str = "frame_";
const PARTIAL_SUFFIX: &str = ".part";

/// Per-job output directories holding extracted frames.
#[derive(Debug, Clone)]
pub struct OutputStore {
    root: PathBuf,
}

impl OutputStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn job_dir(&self, id: Uuid) -> PathBuf {
        self.root.join(id.to_string())
    }

    /// Write a frame so that readers never observe a partially written file.
    pub async fn write_frame(dir: &Path, filename: &str, bytes: &[u8]) -> std::io::Result<()> {
        let partial = dir.join(format!("{filename}{PARTIAL_SUFFIX}"));
        tokio::fs::write(&partial, bytes).await?;
        tokio::fs::rename(&partial, dir.join(filename)).await
    }

    /// Sorted names of the finished frames in `dir`. A missing directory has none.
    pub async fn list_frames(dir: &Path) -> std::io::Result<Vec<String>> {
        let mut entries = match tokio::fs::read_dir(dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e),
        };

        let mut frames = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            if !entry.file_type().await?.is_file() {
                continue;
            }
            if let Some(name) = entry.file_name().to_str() {
                if is_frame_name(name) {
                    frames.push(name.to_string());
                }
            }
        }
        frames.sort();
        Ok(frames)
    }

    /// Resolve a frame name inside `dir`, rejecting anything that could escape it.
    pub fn frame_path(dir: &Path, filename: &str) -> Option<PathBuf> {
        is_frame_name(filename).then(|| dir.join(filename))
    }

    /// Build a deflate-compressed ZIP of the named frames.
    pub fn build_archive(dir: &Path, frames: &[String]) -> Result<Vec<u8>, ArchiveError> {
        let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
        let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);

        for name in frames {
            let bytes = std::fs::read(dir.join(name))?;
            zip.start_file(name.as_str(), options)?;
            zip.write_all(&bytes)?;
        }

        Ok(zip.finish()?.into_inner())
    }
}

/// Names produced by the frame writer: `frame_<index>.<ext>`, no path components.
fn is_frame_name(name: &str) -> bool {
    if name.contains(['/', '\\']) || name.contains("..") {
        return false;
    }
    let Some(rest) = name.strip_prefix(FRAME_PREFIX) else {
        return false;
    };
    let Some((index, ext)) = rest.split_once('.') else {
        return false;
    };
    !index.is_empty()
        && index.chars().all(|c| c.is_ascii_digit())
        && OutputFormat::from_extension(ext).is_some()
}

#[derive(Debug, thiserror::Error)]
pub enum ArchiveError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("ZIP error: {0}")]
    Zip(#[from] zip::result::ZipError),
}
