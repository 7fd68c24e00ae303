// Embeddings module
// Text chunking plus the engines that turn chunks into vectors

pub mod chunking;
pub mod hashing;
pub mod ollama;
#[cfg(feature = "fastembed")]
pub mod onnx;

#[cfg(test)]
mod tests;

use async_trait::async_trait;
use std::path::Path;
use std::sync::Arc;
use thiserror::Error;
use tracing::info;

use crate::config::{EmbeddingConfig, EmbeddingProvider};

pub use chunking::{ChunkingConfig, chunk_text};
pub use hashing::HashingEmbedder;
pub use ollama::OllamaEmbedder;
#[cfg(feature = "fastembed")]
pub use onnx::FastEmbedEngine;

/// Model used when the configuration does not name one
pub const DEFAULT_EMBEDDING_MODEL: &str = "all-minilm";
/// Output dimension of all-MiniLM-L6-v2
pub const DEFAULT_EMBEDDING_DIMENSION: u32 = 384;

#[derive(Debug, Error)]
pub enum EmbeddingError {
    #[error("Embedding model error: {0}")]
    Model(String),

    #[error("Embedding transport error: {0}")]
    Transport(String),

    #[error("Invalid embedding response: {0}")]
    InvalidResponse(String),

    #[error("Embedding dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("Embedding count mismatch: {expected} inputs, {actual} vectors")]
    CountMismatch { expected: usize, actual: usize },
}

/// A text embedding model pinned for the lifetime of the process.
///
/// Implementations must return one vector per input text, in input order,
/// each exactly [`dimension`](EmbeddingEngine::dimension) long. The same text
/// must always map to the same vector.
#[async_trait]
pub trait EmbeddingEngine: Send + Sync {
    /// Identifier of the underlying model, reported in collection stats
    fn model_id(&self) -> &str;

    fn dimension(&self) -> usize;

    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError>;
}

/// Check a batch of model output against the request it answers
#[inline]
pub fn validate_batch(
    requested: usize,
    vectors: &[Vec<f32>],
    dimension: usize,
) -> Result<(), EmbeddingError> {
    if vectors.len() != requested {
        return Err(EmbeddingError::CountMismatch {
            expected: requested,
            actual: vectors.len(),
        });
    }

    if let Some(bad) = vectors.iter().find(|vector| vector.len() != dimension) {
        return Err(EmbeddingError::DimensionMismatch {
            expected: dimension,
            actual: bad.len(),
        });
    }

    Ok(())
}

/// Cosine similarity in `[-1, 1]`; 0.0 when either vector has zero norm
/// or the lengths differ.
#[inline]
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() {
        return 0.0;
    }

    let dot_product: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();

    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }

    (dot_product / (norm_a * norm_b)).clamp(-1.0, 1.0)
}

/// Build the engine selected by the configuration
#[inline]
pub fn build_engine(
    config: &EmbeddingConfig,
    model_cache: &Path,
) -> Result<Arc<dyn EmbeddingEngine>, EmbeddingError> {
    let engine: Arc<dyn EmbeddingEngine> = match config.provider {
        EmbeddingProvider::Ollama => Arc::new(OllamaEmbedder::new(config)?),
        EmbeddingProvider::Hashing => Arc::new(HashingEmbedder::new(config.dimension as usize)),
        #[cfg(feature = "fastembed")]
        EmbeddingProvider::FastEmbed => Arc::new(FastEmbedEngine::new(config, model_cache)?),
        #[cfg(not(feature = "fastembed"))]
        EmbeddingProvider::FastEmbed => {
            let _ = model_cache;
            return Err(EmbeddingError::Model(
                "this build does not include the fastembed provider; rebuild with --features fastembed"
                    .to_string(),
            ));
        }
    };

    info!(
        "Using {} embeddings with model {} ({} dimensions)",
        config.provider,
        engine.model_id(),
        engine.dimension()
    );

    Ok(engine)
}
