// Document vocabulary shared by every layer: types, metadata and classification

pub mod classifier;
pub mod samples;


use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

pub use classifier::{Classification, DocumentClassifier, KeywordClassifier};

/// Flat scalar metadata attached to every stored chunk
pub type Metadata = BTreeMap<String, MetadataValue>;

/// Reserved metadata keys written by the indexing pipeline
pub mod keys {
    pub const DOC_ID: &str = "doc_id";
    pub const SOURCE_FILE: &str = "source_file";
    pub const DOCUMENT_TYPE: &str = "document_type";
    pub const FILE_TYPE: &str = "file_type";
    pub const CHUNK_INDEX: &str = "chunk_index";
    pub const TOTAL_CHUNKS: &str = "total_chunks";
    pub const CHUNK_TEXT_PREVIEW: &str = "chunk_text_preview";
    pub const INDEXED_AT: &str = "indexed_at";
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MetadataValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
}

impl MetadataValue {
    #[inline]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Text(value) => Some(value),
            _ => None,
        }
    }

    #[inline]
    pub const fn as_int(&self) -> Option<i64> {
        match self {
            Self::Int(value) => Some(*value),
            _ => None,
        }
    }

    /// Parse a `key=value` CLI tag value, preferring the narrowest scalar type.
    /// `NaN` and infinities stay text since JSON has no encoding for them.
    #[inline]
    pub fn parse_loose(raw: &str) -> Self {
        if let Ok(value) = raw.parse::<bool>() {
            Self::Bool(value)
        } else if let Ok(value) = raw.parse::<i64>() {
            Self::Int(value)
        } else if let Some(value) = raw.parse::<f64>().ok().filter(|v| v.is_finite()) {
            Self::Float(value)
        } else {
            Self::Text(raw.to_string())
        }
    }

    #[inline]
    pub const fn is_finite(&self) -> bool {
        match self {
            Self::Float(value) => value.is_finite(),
            _ => true,
        }
    }
}

impl fmt::Display for MetadataValue {
    #[inline]
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bool(value) => write!(f, "{value}"),
            Self::Int(value) => write!(f, "{value}"),
            Self::Float(value) => write!(f, "{value}"),
            Self::Text(value) => f.write_str(value),
        }
    }
}

impl From<&str> for MetadataValue {
    #[inline]
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<String> for MetadataValue {
    #[inline]
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<i64> for MetadataValue {
    #[inline]
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

impl From<usize> for MetadataValue {
    #[inline]
    fn from(value: usize) -> Self {
        Self::Int(i64::try_from(value).unwrap_or(i64::MAX))
    }
}

impl From<f64> for MetadataValue {
    #[inline]
    fn from(value: f64) -> Self {
        Self::Float(value)
    }
}

impl From<bool> for MetadataValue {
    #[inline]
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

/// The three document collections
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    Serialize,
    Deserialize,
    sqlx::Type,
    clap::ValueEnum,
)]
#[serde(rename_all = "lowercase")]
#[sqlx(type_name = "TEXT", rename_all = "lowercase")]
pub enum DocumentType {
    /// Incoming requests for quotation
    Rfq,
    /// Past bids, used as drafting context
    Bid,
    /// Ad-hoc documents checked against each other
    Conflict,
}

impl DocumentType {
    pub const ALL: [Self; 3] = [Self::Rfq, Self::Bid, Self::Conflict];

    #[inline]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Rfq => "rfq",
            Self::Bid => "bid",
            Self::Conflict => "conflict",
        }
    }

    /// Name of the vector collection holding this type
    #[inline]
    pub const fn collection_name(self) -> &'static str {
        match self {
            Self::Rfq => "rfq_documents",
            Self::Bid => "historical_bids",
            Self::Conflict => "conflict_documents",
        }
    }
}

impl fmt::Display for DocumentType {
    #[inline]
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DocumentType {
    type Err = String;

    #[inline]
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "rfq" => Ok(Self::Rfq),
            "bid" => Ok(Self::Bid),
            "conflict" => Ok(Self::Conflict),
            other => Err(format!(
                "unknown document type '{other}' (expected rfq, bid or conflict)"
            )),
        }
    }
}
