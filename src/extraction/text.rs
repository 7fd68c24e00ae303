use super::{DocumentFormat, ExtractedText, ExtractionError, TextExtractor};

const UTF8_BOM: &[u8] = b"\xEF\xBB\xBF";

/// UTF-8 text, decoded as Latin-1 when the bytes are not valid UTF-8
#[derive(Debug, Clone, Copy, Default)]
pub struct PlainTextExtractor;

impl TextExtractor for PlainTextExtractor {
    fn format(&self) -> DocumentFormat {
        DocumentFormat::PlainText
    }

    fn extract(&self, bytes: &[u8]) -> Result<ExtractedText, ExtractionError> {
        let bytes = bytes.strip_prefix(UTF8_BOM).unwrap_or(bytes);

        let (text, encoding) = match std::str::from_utf8(bytes) {
            Ok(text) => (text.to_string(), "utf-8"),
            Err(_) => (decode_latin1(bytes), "latin-1"),
        };

        Ok(ExtractedText::new(text, DocumentFormat::PlainText).with_property("encoding", encoding))
    }
}

/// Every byte maps to the code point of the same value
pub(crate) fn decode_latin1(bytes: &[u8]) -> String {
    bytes.iter().copied().map(char::from).collect()
}
