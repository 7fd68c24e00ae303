use std::path::Path;

use super::DocumentType;

/// Outcome of classifying a file before indexing
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Classification {
    Known(DocumentType),
    Unknown,
}

impl Classification {
    /// Resolve to a concrete type, using `fallback` when undecided
    #[inline]
    pub const fn or(self, fallback: DocumentType) -> DocumentType {
        match self {
            Self::Known(document_type) => document_type,
            Self::Unknown => fallback,
        }
    }
}

/// Decides which collection a file belongs to
pub trait DocumentClassifier: Send + Sync {
    fn classify(&self, path: &Path) -> Classification;
}

/// Classifies by keywords found anywhere in the lowercased path
#[derive(Debug, Clone)]
pub struct KeywordClassifier {
    rules: Vec<(DocumentType, Vec<String>)>,
}

impl Default for KeywordClassifier {
    #[inline]
    fn default() -> Self {
        Self::new()
            .with_rule(
                DocumentType::Rfq,
                &["rfq", "rfp", "request", "proposal_request"],
            )
            .with_rule(
                DocumentType::Bid,
                &["bid", "proposal", "winning", "historical"],
            )
    }
}

impl KeywordClassifier {
    /// A classifier with no rules; everything is `Unknown`
    #[inline]
    pub const fn new() -> Self {
        Self { rules: Vec::new() }
    }

    /// Append a rule. Rules are checked in insertion order and the first
    /// rule with a matching keyword wins.
    #[inline]
    #[must_use]
    pub fn with_rule(mut self, document_type: DocumentType, keywords: &[&str]) -> Self {
        self.rules.push((
            document_type,
            keywords.iter().map(|k| k.to_lowercase()).collect(),
        ));
        self
    }
}

impl DocumentClassifier for KeywordClassifier {
    fn classify(&self, path: &Path) -> Classification {
        let haystack = path.to_string_lossy().to_lowercase();

        self.rules
            .iter()
            .find(|(_, keywords)| keywords.iter().any(|k| haystack.contains(k.as_str())))
            .map_or(Classification::Unknown, |(document_type, _)| {
                Classification::Known(*document_type)
            })
    }
}
