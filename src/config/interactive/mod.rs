#[cfg(test)]
mod tests;

use anyhow::{Context, Result};
use console::style;
use dialoguer::{Confirm, Input, Select};
use std::time::Duration;

use super::{Config, ConfigError, EmbeddingConfig, EmbeddingProvider, OllamaConfig, StorageBackend};
use crate::embeddings::OllamaEmbedder;

#[inline]
pub fn run_interactive_config() -> Result<()> {
    eprintln!("{}", style("🔧 Bid RAG Configuration Setup").bold().cyan());
    eprintln!();

    let mut config = load_existing_config()?;

    eprintln!("{}", style("Embedding Configuration").bold().yellow());
    eprintln!("Choose how document chunks are turned into vectors.");
    eprintln!();

    configure_embedding(&mut config.embedding)?;

    if config.embedding.provider == EmbeddingProvider::Ollama {
        eprintln!();
        eprintln!("{}", style("Testing configuration...").yellow());

        match probe_ollama(&config.embedding) {
            Ok(()) => eprintln!("{}", style("✓ Ollama is serving the model").green()),
            Err(reason) => {
                eprintln!("{} {}", style("⚠ Ollama check failed:").yellow(), reason);
                eprintln!("Saving anyway; start Ollama and pull the model before indexing.");
            }
        }
    }

    eprintln!();
    eprintln!("{}", style("Chunking & Storage").bold().yellow());
    configure_chunking_and_storage(&mut config)?;

    eprintln!();
    if Confirm::new()
        .with_prompt("Save configuration?")
        .default(true)
        .interact()?
    {
        config.save().context("Failed to save configuration")?;
        eprintln!("{}", style("✓ Configuration saved successfully!").green());
        eprintln!(
            "Configuration saved to: {}",
            style(config.config_file_path().display()).cyan()
        );
    } else {
        eprintln!("Configuration not saved.");
    }

    Ok(())
}

#[inline]
pub fn show_config() -> Result<()> {
    let config = Config::load_default().context("Failed to load configuration")?;

    eprintln!("{}", style("📋 Current Configuration").bold().cyan());
    eprintln!();

    eprintln!("{}", style("Embedding Settings:").bold().yellow());
    eprintln!("  Provider: {}", style(config.embedding.provider).cyan());
    eprintln!("  Model: {}", style(&config.embedding.model).cyan());
    eprintln!("  Dimension: {}", style(config.embedding.dimension).cyan());
    eprintln!("  Batch Size: {}", style(config.embedding.batch_size).cyan());
    if config.embedding.provider == EmbeddingProvider::Ollama {
        match config.ollama_url() {
            Ok(url) => eprintln!("  Ollama URL: {}", style(url).cyan()),
            Err(e) => eprintln!("  Ollama URL: {} ({})", style("Invalid").red(), e),
        }
    }

    eprintln!();
    eprintln!("{}", style("Chunking:").bold().yellow());
    eprintln!("  Chunk Size: {}", style(config.chunking.chunk_size).cyan());
    eprintln!("  Overlap: {}", style(config.chunking.overlap).cyan());

    eprintln!();
    eprintln!("{}", style("Retrieval:").bold().yellow());
    eprintln!("  Default k: {}", style(config.retrieval.default_top_k).cyan());
    eprintln!(
        "  Context: {} historical bids, {} RFQ chunks",
        style(config.retrieval.n_historical_bids).cyan(),
        style(config.retrieval.n_rfq_chunks).cyan()
    );
    eprintln!(
        "  Unclassified files: {}",
        style(config.retrieval.fallback_document_type).cyan()
    );

    eprintln!();
    eprintln!("{}", style("Conflicts:").bold().yellow());
    eprintln!("  Threshold: {}", style(config.conflicts.threshold).cyan());
    eprintln!(
        "  High Severity Above: {}",
        style(config.conflicts.high_severity).cyan()
    );

    eprintln!();
    eprintln!("{}", style("Storage:").bold().yellow());
    eprintln!("  Backend: {}", style(config.storage.backend).cyan());
    eprintln!(
        "  Vectors: {}",
        style(config.vector_database_path().display()).dim()
    );
    eprintln!("  Ledger: {}", style(config.ledger_path().display()).dim());

    eprintln!();
    eprintln!(
        "Config file: {}",
        style(config.config_file_path().display()).dim()
    );

    Ok(())
}

fn load_existing_config() -> Result<Config> {
    Config::load_default().map_or_else(
        |_| {
            eprintln!(
                "{}",
                style("No existing configuration found. Using defaults.").yellow()
            );
            Ok(Config::default())
        },
        |config| {
            eprintln!("{}", style("Found existing configuration.").green());
            Ok(config)
        },
    )
}

fn configure_embedding(embedding: &mut EmbeddingConfig) -> Result<()> {
    let providers = EmbeddingProvider::ALL.map(EmbeddingProvider::as_str);
    let default_index = EmbeddingProvider::ALL
        .iter()
        .position(|&p| p == embedding.provider)
        .unwrap_or(0);

    let provider_index = Select::new()
        .with_prompt("Embedding provider")
        .default(default_index)
        .items(&providers)
        .interact()?;
    embedding.provider = EmbeddingProvider::ALL[provider_index];

    if embedding.provider == EmbeddingProvider::Ollama {
        configure_ollama(&mut embedding.ollama)?;
    }

    let model: String = Input::new()
        .with_prompt("Embedding model")
        .default(embedding.model.clone())
        .validate_with(|input: &String| -> Result<(), &str> {
            if input.trim().is_empty() {
                Err("Model name cannot be empty")
            } else {
                Ok(())
            }
        })
        .interact_text()?;

    let dimension: u32 = Input::new()
        .with_prompt("Embedding dimension")
        .default(embedding.dimension)
        .validate_with(|input: &u32| -> Result<(), &str> {
            if (8..=4096).contains(input) {
                Ok(())
            } else {
                Err("Dimension must be between 8 and 4096")
            }
        })
        .interact_text()?;

    let batch_size: u32 = Input::new()
        .with_prompt("Batch size for embedding generation")
        .default(embedding.batch_size)
        .validate_with(|input: &u32| -> Result<(), &str> {
            if *input == 0 {
                Err("Batch size must be greater than 0")
            } else if *input > 1000 {
                Err("Batch size must be 1000 or less")
            } else {
                Ok(())
            }
        })
        .interact_text()?;

    embedding.set_model(model)?;
    embedding.set_dimension(dimension)?;
    embedding.set_batch_size(batch_size)?;

    Ok(())
}

fn configure_ollama(ollama: &mut OllamaConfig) -> Result<()> {
    let protocols = &["http", "https"];
    let default_index = protocols
        .iter()
        .position(|&p| p == ollama.protocol)
        .unwrap_or(0);

    let protocol_index = Select::new()
        .with_prompt("Ollama protocol")
        .default(default_index)
        .items(protocols)
        .interact()?;

    let protocol = protocols[protocol_index].to_string();

    let host: String = Input::new()
        .with_prompt("Ollama host")
        .default(ollama.host.clone())
        .validate_with(|input: &String| -> Result<(), ConfigError> {
            let temp_config = OllamaConfig {
                protocol: protocol.clone(),
                host: input.clone(),
                port: 11434, // Use default port for validation
            };
            temp_config.validate()
        })
        .interact_text()?;

    let port: u16 = Input::new()
        .with_prompt("Ollama port")
        .default(ollama.port)
        .validate_with(|input: &u16| -> Result<(), &str> {
            if *input == 0 {
                Err("Port must be greater than 0")
            } else {
                Ok(())
            }
        })
        .interact_text()?;

    ollama.set_protocol(protocol)?;
    ollama.set_host(host)?;
    ollama.set_port(port)?;

    Ok(())
}

fn configure_chunking_and_storage(config: &mut Config) -> Result<()> {
    let chunk_size: usize = Input::new()
        .with_prompt("Chunk size (characters)")
        .default(config.chunking.chunk_size)
        .validate_with(|input: &usize| -> Result<(), &str> {
            if (50..=8192).contains(input) {
                Ok(())
            } else {
                Err("Chunk size must be between 50 and 8192")
            }
        })
        .interact_text()?;

    let overlap: usize = Input::new()
        .with_prompt("Chunk overlap (characters)")
        .default(config.chunking.overlap.min(chunk_size.saturating_sub(1)))
        .validate_with(|input: &usize| -> Result<(), &str> {
            if *input < chunk_size {
                Ok(())
            } else {
                Err("Overlap must be smaller than the chunk size")
            }
        })
        .interact_text()?;

    let backends = &["lancedb (persistent)", "memory (discarded on exit)"];
    let backend_index = Select::new()
        .with_prompt("Vector storage backend")
        .default(match config.storage.backend {
            StorageBackend::Lancedb => 0,
            StorageBackend::Memory => 1,
        })
        .items(backends)
        .interact()?;

    config.chunking.chunk_size = chunk_size;
    config.chunking.overlap = overlap;
    config.storage.backend = if backend_index == 0 {
        StorageBackend::Lancedb
    } else {
        StorageBackend::Memory
    };

    Ok(())
}

/// Probe the server and the configured model with a short timeout
fn probe_ollama(embedding: &EmbeddingConfig) -> std::result::Result<(), String> {
    OllamaEmbedder::new(embedding)
        .map_err(|e| e.to_string())?
        .with_timeout(Duration::from_secs(5))
        .with_retry_attempts(1)
        .health_check()
        .map_err(|e| format!("{e:#}"))
}
