use async_trait::async_trait;
use fastembed::{EmbeddingModel, InitOptions, TextEmbedding};
use std::path::Path;
use std::sync::{Arc, Mutex};
use tracing::{debug, info};

use super::{EmbeddingEngine, EmbeddingError, validate_batch};
use crate::config::EmbeddingConfig;

/// In-process ONNX embedding engine
#[derive(Clone)]
pub struct FastEmbedEngine {
    model: Arc<Mutex<TextEmbedding>>,
    model_id: String,
    dimension: usize,
    batch_size: usize,
}

impl std::fmt::Debug for FastEmbedEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FastEmbedEngine")
            .field("model_id", &self.model_id)
            .field("dimension", &self.dimension)
            .finish_non_exhaustive()
    }
}

/// Map a configured model name onto a supported model and its dimension
fn resolve_model(name: &str) -> Option<(EmbeddingModel, &'static str, usize)> {
    match name.trim().to_ascii_lowercase().as_str() {
        "all-minilm" | "all-minilm-l6-v2" | "sentence-transformers/all-minilm-l6-v2" => Some((
            EmbeddingModel::AllMiniLML6V2,
            "sentence-transformers/all-MiniLM-L6-v2",
            384,
        )),
        "all-minilm-l12-v2" | "sentence-transformers/all-minilm-l12-v2" => Some((
            EmbeddingModel::AllMiniLML12V2,
            "sentence-transformers/all-MiniLM-L12-v2",
            384,
        )),
        "bge-small-en-v1.5" | "baai/bge-small-en-v1.5" => {
            Some((EmbeddingModel::BGESmallENV15, "BAAI/bge-small-en-v1.5", 384))
        }
        _ => None,
    }
}

impl FastEmbedEngine {
    /// Load the model, downloading it into `cache_dir` on first use
    #[inline]
    pub fn new(config: &EmbeddingConfig, cache_dir: &Path) -> Result<Self, EmbeddingError> {
        let (model, model_id, dimension) = resolve_model(&config.model).ok_or_else(|| {
            EmbeddingError::Model(format!(
                "model '{}' is not supported by the fastembed provider",
                config.model
            ))
        })?;

        if dimension != config.dimension as usize {
            return Err(EmbeddingError::DimensionMismatch {
                expected: config.dimension as usize,
                actual: dimension,
            });
        }

        info!("Loading {} into {}", model_id, cache_dir.display());
        let options = InitOptions::new(model)
            .with_cache_dir(cache_dir.to_path_buf())
            .with_show_download_progress(false);
        let text_embedding =
            TextEmbedding::try_new(options).map_err(|e| EmbeddingError::Model(e.to_string()))?;

        Ok(Self {
            model: Arc::new(Mutex::new(text_embedding)),
            model_id: model_id.to_string(),
            dimension,
            batch_size: config.batch_size.max(1) as usize,
        })
    }
}

#[async_trait]
impl EmbeddingEngine for FastEmbedEngine {
    fn model_id(&self) -> &str {
        &self.model_id
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let model = Arc::clone(&self.model);
        let batch_size = self.batch_size;
        let texts = texts.to_vec();
        let requested = texts.len();

        debug!("Embedding {} texts in-process", requested);
        let vectors = tokio::task::spawn_blocking(move || {
            let guard = model
                .lock()
                .map_err(|_| EmbeddingError::Model("embedding model lock poisoned".to_string()))?;
            guard
                .embed(texts, Some(batch_size))
                .map_err(|e| EmbeddingError::Model(e.to_string()))
        })
        .await
        .map_err(|e| EmbeddingError::Model(format!("embedding task failed: {e}")))??;

        validate_batch(requested, &vectors, self.dimension)?;
        Ok(vectors)
    }
}
