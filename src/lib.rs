use thiserror::Error;

pub type Result<T> = std::result::Result<T, RagError>;

#[derive(Error, Debug)]
pub enum RagError {
    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error(transparent)]
    Extraction(#[from] extraction::ExtractionError),

    #[error(transparent)]
    Embedding(#[from] embeddings::EmbeddingError),

    #[error(transparent)]
    Store(#[from] database::StoreError),

    #[error("Document '{0}' produced no text to index")]
    EmptyDocument(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Other error: {0}")]
    Other(#[from] anyhow::Error),
}

pub mod commands;
pub mod config;
pub mod conflicts;
pub mod database;
pub mod documents;
pub mod embeddings;
pub mod extraction;
pub mod retrieval;
