
use anyhow::{Context, Result, bail};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, error, info, warn};
use url::Url;

use super::{EmbeddingEngine, EmbeddingError, validate_batch};
use crate::config::EmbeddingConfig;

const DEFAULT_TIMEOUT_SECONDS: u64 = 30;
const DEFAULT_RETRY_ATTEMPTS: u32 = 3;
const BACKOFF_BASE_MS: u64 = 1000;

/// Embedding engine backed by a local Ollama server.
///
/// The HTTP client is blocking; the async [`EmbeddingEngine`] impl moves each
/// call onto the blocking pool.
#[derive(Debug, Clone)]
pub struct OllamaEmbedder {
    base_url: Url,
    model: String,
    dimension: usize,
    batch_size: u32,
    agent: ureq::Agent,
    retry_attempts: u32,
}

#[derive(Debug, Serialize)]
struct EmbedRequest<'a> {
    model: &'a str,
    input: &'a [String],
}

#[derive(Debug, Deserialize)]
struct EmbedResponse {
    embeddings: Vec<Vec<f32>>,
}

/// A model pulled into the local Ollama instance
#[derive(Debug, Deserialize)]
pub struct InstalledModel {
    pub name: String,
    #[serde(default)]
    pub size: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct TagsResponse {
    models: Vec<InstalledModel>,
}

fn build_agent(timeout: Duration) -> ureq::Agent {
    ureq::Agent::config_builder()
        .timeout_global(Some(timeout))
        .build()
        .into()
}

/// Server errors and connection-level failures are worth another attempt
fn is_transient(error: &ureq::Error) -> bool {
    match error {
        ureq::Error::StatusCode(status) => *status >= 500,
        ureq::Error::ConnectionFailed
        | ureq::Error::HostNotFound
        | ureq::Error::Timeout(_)
        | ureq::Error::Io(_) => true,
        _ => false,
    }
}

fn backoff(attempt: u32) -> Duration {
    Duration::from_millis(BACKOFF_BASE_MS << attempt.saturating_sub(1).min(6))
}

impl OllamaEmbedder {
    #[inline]
    pub fn new(config: &EmbeddingConfig) -> Result<Self, EmbeddingError> {
        let base_url = config
            .ollama
            .ollama_url()
            .map_err(|e| EmbeddingError::Model(format!("invalid Ollama URL: {e}")))?;

        Ok(Self {
            base_url,
            model: config.model.clone(),
            dimension: config.dimension as usize,
            batch_size: config.batch_size.max(1),
            agent: build_agent(Duration::from_secs(DEFAULT_TIMEOUT_SECONDS)),
            retry_attempts: DEFAULT_RETRY_ATTEMPTS,
        })
    }

    #[inline]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.agent = build_agent(timeout);
        self
    }

    #[inline]
    pub fn with_retry_attempts(mut self, attempts: u32) -> Self {
        self.retry_attempts = attempts.max(1);
        self
    }

    /// Confirm the server answers and has the configured model pulled
    #[inline]
    pub fn health_check(&self) -> Result<()> {
        let models = self
            .list_models()
            .with_context(|| format!("Ollama at {} is not reachable", self.base_url))?;

        if !models.iter().any(|m| self.matches_model(&m.name)) {
            let installed: Vec<&str> = models.iter().map(|m| m.name.as_str()).collect();
            warn!("Model {} missing from {:?}", self.model, installed);
            bail!(
                "Model '{}' is not pulled; run `ollama pull {}` (installed: {})",
                self.model,
                self.model,
                installed.join(", ")
            );
        }

        info!("Ollama at {} serves {}", self.base_url, self.model);
        Ok(())
    }

    /// Ollama reports untagged pulls as `name:latest`
    fn matches_model(&self, name: &str) -> bool {
        name == self.model || name.strip_suffix(":latest") == Some(self.model.as_str())
    }

    #[inline]
    pub fn list_models(&self) -> Result<Vec<InstalledModel>> {
        let url = self.base_url.join("/api/tags")?;
        let body = self.send_with_retry(|| {
            self.agent
                .get(url.as_str())
                .call()
                .and_then(|mut resp| resp.body_mut().read_to_string())
        })?;

        let tags: TagsResponse =
            serde_json::from_str(&body).context("Unexpected /api/tags response")?;
        debug!("Ollama reports {} installed models", tags.models.len());
        Ok(tags.models)
    }

    /// Embed `texts` synchronously, `batch_size` inputs per request
    #[inline]
    pub fn embed_blocking(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let url = self
            .base_url
            .join("/api/embed")
            .map_err(|e| EmbeddingError::Transport(format!("failed to build embed URL: {e}")))?;

        let mut vectors = Vec::with_capacity(texts.len());
        for batch in texts.chunks(self.batch_size as usize) {
            vectors.extend(self.embed_batch(&url, batch)?);
        }

        validate_batch(texts.len(), &vectors, self.dimension)?;
        debug!("Embedded {} texts with {}", vectors.len(), self.model);
        Ok(vectors)
    }

    fn embed_batch(&self, url: &Url, batch: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        let payload = serde_json::to_string(&EmbedRequest {
            model: &self.model,
            input: batch,
        })
        .map_err(|e| EmbeddingError::Model(format!("failed to serialize request: {e}")))?;

        let body = self
            .send_with_retry(|| {
                self.agent
                    .post(url.as_str())
                    .header("Content-Type", "application/json")
                    .send(&payload)
                    .and_then(|mut resp| resp.body_mut().read_to_string())
            })
            .map_err(|e| EmbeddingError::Transport(format!("{e:#}")))?;

        let response: EmbedResponse = serde_json::from_str(&body)
            .map_err(|e| EmbeddingError::InvalidResponse(e.to_string()))?;

        if response.embeddings.len() != batch.len() {
            return Err(EmbeddingError::CountMismatch {
                expected: batch.len(),
                actual: response.embeddings.len(),
            });
        }

        Ok(response.embeddings)
    }

    /// Run `send` until it succeeds, fails permanently, or the attempts run out
    fn send_with_retry<F>(&self, mut send: F) -> Result<String>
    where
        F: FnMut() -> Result<String, ureq::Error>,
    {
        let mut attempt = 1;
        loop {
            match send() {
                Ok(body) => return Ok(body),
                Err(err) if !is_transient(&err) => {
                    warn!("Ollama request failed: {}", err);
                    bail!("Ollama request failed: {}", err);
                }
                Err(err) if attempt >= self.retry_attempts => {
                    error!(
                        "Ollama at {} still failing after {} attempts: {}",
                        self.base_url, attempt, err
                    );
                    bail!("Ollama request failed after {} attempts: {}", attempt, err);
                }
                Err(err) => {
                    let delay = backoff(attempt);
                    warn!(
                        "Ollama request attempt {}/{} failed ({}), retrying in {:?}",
                        attempt, self.retry_attempts, err, delay
                    );
                    std::thread::sleep(delay);
                    attempt += 1;
                }
            }
        }
    }
}

#[async_trait]
impl EmbeddingEngine for OllamaEmbedder {
    fn model_id(&self) -> &str {
        &self.model
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let client = self.clone();
        let texts = texts.to_vec();
        tokio::task::spawn_blocking(move || client.embed_blocking(&texts))
            .await
            .map_err(|e| EmbeddingError::Model(format!("embedding task failed: {e}")))?
    }
}
