use std::path::{Path, PathBuf};
use uuid::Uuid;

/// Video container extensions accepted for upload.
pub const ALLOWED_EXTENSIONS: &[&str] = &["mp4", "mov", "avi"];

/// Directory holding uploaded videos until their job finishes.
#[derive(Debug, Clone)]
pub struct UploadStore {
    root: PathBuf,
    max_bytes: usize,
}

impl UploadStore {
    pub fn new(root: impl Into<PathBuf>, max_bytes: usize) -> Self {
        Self {
            root: root.into(),
            max_bytes,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn max_bytes(&self) -> usize {
        self.max_bytes
    }

    /// Where the upload for job `id` is stored: `<root>/<id>_<sanitized name>`.
    pub fn path_for(&self, id: Uuid, original_name: &str) -> PathBuf {
        self.root.join(format!("{}_{}", id, sanitize_filename(original_name)))
    }
}

/// Whether the file name carries an accepted video extension.
pub fn is_allowed_video(filename: &str) -> bool {
    filename
        .rsplit_once('.')
        .map(|(_, ext)| {
            let ext = ext.to_ascii_lowercase();
            ALLOWED_EXTENSIONS.contains(&ext.as_str())
        })
        .unwrap_or(false)
}

/// Reduce a client-supplied file name to a safe single path component.
pub fn sanitize_filename(name: &str) -> String {
    let base = name.rsplit(['/', '\\']).next().unwrap_or_default();
    let cleaned: String = base
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') {
                c
            } else {
                '_'
            }
        })
        .collect();
    let cleaned = cleaned.trim_matches(|c| c == '.' || c == '_');
    if cleaned.is_empty() {
        "upload".to_string()
    } else {
        cleaned.to_string()
    }
}
