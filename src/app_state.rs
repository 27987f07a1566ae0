use std::sync::Arc;

use crate::services::{
    outputs::OutputStore, registry::JobRegistry, uploads::UploadStore, worker::JobRunner,
};

/// Shared application state passed to all route handlers.
#[derive(Clone)]
pub struct AppState {
    pub registry: Arc<JobRegistry>,
    pub runner: Arc<JobRunner>,
    pub uploads: Arc<UploadStore>,
    pub outputs: Arc<OutputStore>,
}

impl AppState {
    pub fn new(
        registry: Arc<JobRegistry>,
        runner: JobRunner,
        uploads: UploadStore,
        outputs: OutputStore,
    ) -> Self {
        Self {
            registry,
            runner: Arc::new(runner),
            uploads: Arc::new(uploads),
            outputs: Arc::new(outputs),
        }
    }
}
