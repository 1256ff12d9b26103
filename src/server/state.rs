//! Shared application state.

use crate::config::PipelineConfig;
use crate::pipeline::llm::LanguageModel;
use crate::store::DocumentStore;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Cheap-to-clone handle every handler receives.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    store: DocumentStore,
    model: Arc<dyn LanguageModel>,
    pipeline: PipelineConfig,
    upload_dir: PathBuf,
    max_upload_bytes: usize,
}

impl AppState {
    pub fn new(
        model: Arc<dyn LanguageModel>,
        pipeline: PipelineConfig,
        upload_dir: PathBuf,
        max_upload_bytes: usize,
    ) -> Self {
        Self {
            inner: Arc::new(AppStateInner {
                store: DocumentStore::new(),
                model,
                pipeline,
                upload_dir,
                max_upload_bytes,
            }),
        }
    }

    pub fn store(&self) -> &DocumentStore {
        &self.inner.store
    }

    pub fn model(&self) -> &dyn LanguageModel {
        self.inner.model.as_ref()
    }

    pub fn pipeline(&self) -> &PipelineConfig {
        &self.inner.pipeline
    }

    pub fn upload_dir(&self) -> &Path {
        &self.inner.upload_dir
    }

    pub fn max_upload_bytes(&self) -> usize {
        self.inner.max_upload_bytes
    }
}
