// Document text extraction
// One extractor per file format behind a common trait, dispatched by a registry

pub mod docx;
pub mod email;
pub mod key_info;
pub mod msg;
pub mod pdf;
pub mod spreadsheet;
pub mod text;


use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::path::Path;
use std::str::FromStr;
use thiserror::Error;
use tracing::debug;

use crate::documents::{Metadata, MetadataValue};

pub use docx::DocxExtractor;
pub use email::EmailExtractor;
pub use key_info::{KeyInfo, extract_key_info};
pub use msg::OutlookMsgExtractor;
pub use pdf::PdfExtractor;
pub use spreadsheet::SpreadsheetExtractor;
pub use text::PlainTextExtractor;

#[derive(Debug, Error)]
pub enum ExtractionError {
    #[error("Unsupported file format: {0}")]
    UnsupportedFormat(String),

    #[error("Corrupt {format} file: {reason}")]
    CorruptFile {
        format: DocumentFormat,
        reason: String,
    },

    #[error("Failed to extract text from {format} file: {reason}")]
    ExtractorFailure {
        format: DocumentFormat,
        reason: String,
    },
}

impl ExtractionError {
    pub(crate) fn corrupt(format: DocumentFormat, reason: impl fmt::Display) -> Self {
        Self::CorruptFile {
            format,
            reason: reason.to_string(),
        }
    }
}

/// Supported input formats
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DocumentFormat {
    Pdf,
    PlainText,
    Docx,
    Spreadsheet,
    Email,
    OutlookMsg,
}

impl DocumentFormat {
    pub const ALL: [Self; 6] = [
        Self::Pdf,
        Self::PlainText,
        Self::Docx,
        Self::Spreadsheet,
        Self::Email,
        Self::OutlookMsg,
    ];

    /// Infer the format from a file extension, with or without the dot
    #[inline]
    pub fn from_extension(extension: &str) -> Result<Self, ExtractionError> {
        match extension.trim_start_matches('.').to_ascii_lowercase().as_str() {
            "pdf" => Ok(Self::Pdf),
            "txt" | "text" | "md" | "log" => Ok(Self::PlainText),
            "docx" => Ok(Self::Docx),
            "xlsx" | "xlsm" | "xlsb" | "xls" | "ods" => Ok(Self::Spreadsheet),
            "eml" => Ok(Self::Email),
            "msg" => Ok(Self::OutlookMsg),
            other => Err(ExtractionError::UnsupportedFormat(other.to_string())),
        }
    }

    #[inline]
    pub fn from_path(path: &Path) -> Result<Self, ExtractionError> {
        let extension = path
            .extension()
            .and_then(|ext| ext.to_str())
            .ok_or_else(|| ExtractionError::UnsupportedFormat(path.display().to_string()))?;
        Self::from_extension(extension)
    }

    /// Short label recorded as the `file_type` metadata value
    #[inline]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Pdf => "PDF",
            Self::PlainText => "TXT",
            Self::Docx => "DOCX",
            Self::Spreadsheet => "XLSX",
            Self::Email => "EML",
            Self::OutlookMsg => "MSG",
        }
    }
}

impl fmt::Display for DocumentFormat {
    #[inline]
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for DocumentFormat {
    type Err = ExtractionError;

    #[inline]
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_extension(s)
    }
}

/// Plain text pulled out of a document, with per-format facts
#[derive(Debug, Clone, PartialEq)]
pub struct ExtractedText {
    pub text: String,
    pub format: DocumentFormat,
    pub properties: Metadata,
}

impl ExtractedText {
    #[inline]
    pub fn new(text: String, format: DocumentFormat) -> Self {
        Self {
            text,
            format,
            properties: Metadata::new(),
        }
    }

    #[inline]
    #[must_use]
    pub fn with_property(mut self, key: &str, value: impl Into<MetadataValue>) -> Self {
        self.properties.insert(key.to_string(), value.into());
        self
    }

    #[inline]
    pub fn char_count(&self) -> usize {
        self.text.chars().count()
    }

    #[inline]
    pub fn word_count(&self) -> usize {
        self.text.split_whitespace().count()
    }
}

/// Converts the raw bytes of one format into text
pub trait TextExtractor: Send + Sync {
    fn format(&self) -> DocumentFormat;

    fn extract(&self, bytes: &[u8]) -> Result<ExtractedText, ExtractionError>;
}

/// Maps each format to the extractor responsible for it
pub struct ExtractorRegistry {
    extractors: HashMap<DocumentFormat, Box<dyn TextExtractor>>,
}

impl fmt::Debug for ExtractorRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExtractorRegistry")
            .field("formats", &self.supported_formats())
            .finish()
    }
}

impl Default for ExtractorRegistry {
    #[inline]
    fn default() -> Self {
        let mut registry = Self::empty();
        registry.register(Box::new(PdfExtractor));
        registry.register(Box::new(PlainTextExtractor));
        registry.register(Box::new(DocxExtractor));
        registry.register(Box::new(SpreadsheetExtractor));
        registry.register(Box::new(EmailExtractor));
        registry.register(Box::new(OutlookMsgExtractor));
        registry
    }
}

impl ExtractorRegistry {
    #[inline]
    pub fn empty() -> Self {
        Self {
            extractors: HashMap::new(),
        }
    }

    /// Register an extractor, replacing any previous one for its format
    #[inline]
    pub fn register(&mut self, extractor: Box<dyn TextExtractor>) {
        self.extractors.insert(extractor.format(), extractor);
    }

    #[inline]
    pub fn supported_formats(&self) -> Vec<DocumentFormat> {
        DocumentFormat::ALL
            .into_iter()
            .filter(|format| self.extractors.contains_key(format))
            .collect()
    }

    #[inline]
    pub fn extract_text(
        &self,
        bytes: &[u8],
        format: DocumentFormat,
    ) -> Result<ExtractedText, ExtractionError> {
        let extractor = self
            .extractors
            .get(&format)
            .ok_or_else(|| ExtractionError::UnsupportedFormat(format.label().to_string()))?;

        let extracted = extractor.extract(bytes)?;
        debug!(
            "Extracted {} characters from {} bytes of {}",
            extracted.char_count(),
            bytes.len(),
            format
        );
        Ok(extracted)
    }
}

/// Extract text with the default set of extractors
#[inline]
pub fn extract_text(bytes: &[u8], format: DocumentFormat) -> Result<ExtractedText, ExtractionError> {
    ExtractorRegistry::default().extract_text(bytes, format)
}
