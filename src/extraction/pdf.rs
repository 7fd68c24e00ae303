use std::panic::{self, AssertUnwindSafe};
use tracing::{debug, warn};

use super::{DocumentFormat, ExtractedText, ExtractionError, TextExtractor};

/// PDF text via `pdf-extract`, falling back to page-wise `lopdf` extraction
#[derive(Debug, Clone, Copy, Default)]
pub struct PdfExtractor;

impl TextExtractor for PdfExtractor {
    fn format(&self) -> DocumentFormat {
        DocumentFormat::Pdf
    }

    fn extract(&self, bytes: &[u8]) -> Result<ExtractedText, ExtractionError> {
        let primary_error = match extract_primary(bytes) {
            Ok(text) => {
                return Ok(ExtractedText::new(text, DocumentFormat::Pdf)
                    .with_property("extractor", "pdf-extract"));
            }
            Err(reason) => reason,
        };

        debug!("pdf-extract failed ({}), trying lopdf", primary_error);

        match extract_fallback(bytes) {
            Ok((text, pages)) => Ok(ExtractedText::new(text, DocumentFormat::Pdf)
                .with_property("extractor", "lopdf")
                .with_property("pages", pages)),
            Err(fallback_error) => Err(ExtractionError::ExtractorFailure {
                format: DocumentFormat::Pdf,
                reason: format!("pdf-extract: {primary_error}; lopdf: {fallback_error}"),
            }),
        }
    }
}

fn extract_primary(bytes: &[u8]) -> Result<String, String> {
    // pdf-extract panics on some malformed inputs
    let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
        pdf_extract::extract_text_from_mem(bytes)
    }));

    match outcome {
        Ok(Ok(text)) if text.trim().is_empty() => Err("no text extracted".to_string()),
        Ok(Ok(text)) => Ok(text),
        Ok(Err(e)) => Err(e.to_string()),
        Err(_) => Err("extractor panicked".to_string()),
    }
}

fn extract_fallback(bytes: &[u8]) -> Result<(String, usize), String> {
    let document = lopdf::Document::load_mem(bytes).map_err(|e| e.to_string())?;
    let pages = document.get_pages();

    let mut parts = Vec::with_capacity(pages.len());
    for page_number in pages.keys() {
        match document.extract_text(&[*page_number]) {
            Ok(text) if !text.trim().is_empty() => {
                parts.push(format!("--- Page {page_number} ---\n{text}"));
            }
            Ok(_) => {}
            Err(e) => warn!("Skipping unreadable PDF page {}: {}", page_number, e),
        }
    }

    Ok((parts.join("\n\n"), pages.len()))
}
