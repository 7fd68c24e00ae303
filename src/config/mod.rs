// Configuration management module
// TOML-backed settings plus the interactive editor

pub mod interactive;
pub mod settings;


pub use interactive::{run_interactive_config, show_config};
pub use settings::{
    Config, ConfigError, ConflictConfig, EmbeddingConfig, EmbeddingProvider, OllamaConfig,
    RetrievalConfig, StorageBackend, StorageConfig,
};
