use super::{load_existing_config as load_existing_config_impl, probe_ollama};
use crate::config::{EmbeddingConfig, OllamaConfig};
use serial_test::serial;
use tempfile::TempDir;

#[test]
#[serial]
fn load_existing_config() {
    let temp_dir = TempDir::new().expect("should create temp dir");
    // SAFETY: serialized with every other test touching the process environment
    unsafe { std::env::set_var(crate::config::settings::HOME_ENV_VAR, temp_dir.path()) };
    let config = load_existing_config_impl();
    // SAFETY: see above
    unsafe { std::env::remove_var(crate::config::settings::HOME_ENV_VAR) };

    let config = config.expect("config loaded successfully");
    assert!(!config.embedding.model.is_empty());
    assert!(config.embedding.batch_size > 0);
    assert!(config.embedding.ollama.port > 0);
    assert_eq!(config.base_dir, temp_dir.path());
}

#[test]
fn unreachable_ollama_is_reported() {
    let embedding = EmbeddingConfig {
        ollama: OllamaConfig {
            protocol: "http".to_string(),
            host: "127.0.0.1".to_string(),
            port: 1,
        },
        ..EmbeddingConfig::default()
    };

    let reason = probe_ollama(&embedding).expect_err("nothing listens on port 1");
    assert!(reason.contains("not reachable"), "{reason}");
}
