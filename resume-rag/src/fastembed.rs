//! Local ONNX embeddings through `fastembed`.
//!
//! This module is only available when the `fastembed` feature is enabled.

use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use ::fastembed::{EmbeddingModel, InitOptions, TextEmbedding};
use tracing::{debug, info};

use crate::embedding::EmbeddingProvider;
use crate::error::{RagError, Result};

/// Output size of all-MiniLM-L6-v2.
pub const MINILM_DIMENSIONS: usize = 384;

const PROVIDER: &str = "fastembed";
const MODEL_NAME: &str = "fastembed/all-MiniLM-L6-v2";

/// An [`EmbeddingProvider`] running all-MiniLM-L6-v2 in process.
///
/// The model needs `&mut` access and is CPU bound, so calls take a mutex on a
/// blocking thread.
pub struct FastEmbedProvider {
    model: Arc<Mutex<TextEmbedding>>,
}

impl FastEmbedProvider {
    /// Load the model, downloading it into `cache_dir` on first use.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::EmbeddingError`] if the model cannot be loaded.
    pub fn new(cache_dir: Option<PathBuf>) -> Result<Self> {
        let mut options =
            InitOptions::new(EmbeddingModel::AllMiniLML6V2).with_show_download_progress(false);
        if let Some(dir) = cache_dir {
            options = options.with_cache_dir(dir);
        }

        let model = TextEmbedding::try_new(options).map_err(|e| RagError::EmbeddingError {
            provider: PROVIDER.into(),
            message: format!("failed to load all-MiniLM-L6-v2: {e}"),
        })?;
        info!(model = MODEL_NAME, "loaded local embedding model");
        Ok(Self { model: Arc::new(Mutex::new(model)) })
    }
}

#[async_trait]
impl EmbeddingProvider for FastEmbedProvider {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let results = self.embed_batch(&[text]).await?;
        results.into_iter().next().ok_or_else(|| RagError::EmbeddingError {
            provider: PROVIDER.into(),
            message: "model returned no embedding".into(),
        })
    }

    async fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        debug!(provider = PROVIDER, batch_size = texts.len(), "embedding batch");

        let owned: Vec<String> = texts.iter().map(|s| (*s).to_string()).collect();
        let model = Arc::clone(&self.model);
        let embedded = tokio::task::spawn_blocking(move || {
            let mut model = model.lock().map_err(|_| "embedding model mutex poisoned".to_string())?;
            model.embed(owned, None).map_err(|e| e.to_string())
        })
        .await
        .map_err(|e| RagError::EmbeddingError {
            provider: PROVIDER.into(),
            message: e.to_string(),
        })?;

        embedded.map_err(|message| RagError::EmbeddingError { provider: PROVIDER.into(), message })
    }

    fn dimensions(&self) -> usize {
        MINILM_DIMENSIONS
    }

    fn name(&self) -> &str {
        MODEL_NAME
    }
}
