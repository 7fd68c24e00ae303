// Conflict detection
// Pairwise embedding similarity over a small caller-supplied batch of documents


use itertools::Itertools;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info};

use crate::config::ConflictConfig;
use crate::embeddings::{EmbeddingEngine, EmbeddingError, cosine_similarity};

/// The only kind of finding the detector produces
pub const SEMANTIC_SIMILARITY: &str = "semantic_similarity";

/// A document submitted for conflict review
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConflictDocument {
    pub content: String,
    pub source_label: String,
}

impl ConflictDocument {
    #[inline]
    pub fn new(content: impl Into<String>, source_label: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            source_label: source_label.into(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Medium,
    High,
}

impl fmt::Display for Severity {
    #[inline]
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Medium => "medium",
            Self::High => "high",
        })
    }
}

/// Two documents whose embeddings are closer than the threshold.
///
/// Similarity alone cannot tell a duplicate from a topically identical
/// contradiction, so findings are candidates for human review.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConflictFinding {
    pub index_a: usize,
    pub index_b: usize,
    pub label_a: String,
    pub label_b: String,
    pub preview_a: String,
    pub preview_b: String,
    pub similarity_score: f32,
    pub severity: Severity,
    pub conflict_type: &'static str,
}

fn preview(text: &str, chars: usize) -> String {
    text.chars().take(chars).collect()
}

/// Flags highly similar pairs within one batch of documents
pub struct ConflictDetector {
    engine: Arc<dyn EmbeddingEngine>,
    high_severity: f32,
    preview_chars: usize,
}

impl fmt::Debug for ConflictDetector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConflictDetector")
            .field("model", &self.engine.model_id())
            .field("high_severity", &self.high_severity)
            .field("preview_chars", &self.preview_chars)
            .finish()
    }
}

impl ConflictDetector {
    #[inline]
    pub fn new(engine: Arc<dyn EmbeddingEngine>, config: &ConflictConfig) -> Self {
        Self {
            engine,
            high_severity: config.high_severity,
            preview_chars: config.preview_chars,
        }
    }

    #[inline]
    pub const fn high_severity(&self) -> f32 {
        self.high_severity
    }

    /// Compare every unordered pair `(i, j)` with `i < j` and report those with
    /// similarity strictly above `threshold`.
    ///
    /// Fewer than two documents yields no findings. Cost grows quadratically
    /// with the batch size; callers pass tens of documents, not a corpus.
    #[inline]
    pub async fn detect(
        &self,
        documents: &[ConflictDocument],
        threshold: f32,
    ) -> Result<Vec<ConflictFinding>, EmbeddingError> {
        if documents.len() < 2 {
            return Ok(Vec::new());
        }

        let texts: Vec<String> = documents.iter().map(|d| d.content.clone()).collect();
        let embeddings = self.engine.embed(&texts).await?;

        let findings: Vec<ConflictFinding> = (0..documents.len())
            .tuple_combinations()
            .filter_map(|(i, j)| {
                let similarity = cosine_similarity(&embeddings[i], &embeddings[j]);
                debug!("Similarity of documents {} and {}: {:.4}", i, j, similarity);
                (similarity > threshold).then(|| self.finding(documents, i, j, similarity))
            })
            .collect();

        info!(
            "Compared {} documents ({} pairs), {} potential conflicts",
            documents.len(),
            documents.len() * (documents.len() - 1) / 2,
            findings.len()
        );

        Ok(findings)
    }

    fn finding(
        &self,
        documents: &[ConflictDocument],
        i: usize,
        j: usize,
        similarity: f32,
    ) -> ConflictFinding {
        ConflictFinding {
            index_a: i,
            index_b: j,
            label_a: documents[i].source_label.clone(),
            label_b: documents[j].source_label.clone(),
            preview_a: preview(&documents[i].content, self.preview_chars),
            preview_b: preview(&documents[j].content, self.preview_chars),
            similarity_score: similarity,
            severity: if similarity > self.high_severity {
                Severity::High
            } else {
                Severity::Medium
            },
            conflict_type: SEMANTIC_SIMILARITY,
        }
    }
}
