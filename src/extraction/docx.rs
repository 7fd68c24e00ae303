use quick_xml::Reader;
use quick_xml::events::Event;
use std::io::{Cursor, Read};

use super::{DocumentFormat, ExtractedText, ExtractionError, TextExtractor};

const DOCUMENT_PART: &str = "word/document.xml";

/// Word documents: body paragraphs, then table rows under a `[TABLES]` marker
#[derive(Debug, Clone, Copy, Default)]
pub struct DocxExtractor;

impl TextExtractor for DocxExtractor {
    fn format(&self) -> DocumentFormat {
        DocumentFormat::Docx
    }

    fn extract(&self, bytes: &[u8]) -> Result<ExtractedText, ExtractionError> {
        let corrupt = |e: &dyn std::fmt::Display| ExtractionError::corrupt(DocumentFormat::Docx, e);

        let mut archive = zip::ZipArchive::new(Cursor::new(bytes)).map_err(|e| corrupt(&e))?;
        let mut xml = String::new();
        archive
            .by_name(DOCUMENT_PART)
            .map_err(|e| corrupt(&e))?
            .read_to_string(&mut xml)
            .map_err(|e| corrupt(&e))?;

        let body = parse_document_xml(&xml).map_err(|e| corrupt(&e))?;

        let mut text = body.paragraphs.join("\n\n");
        if !body.table_rows.is_empty() {
            text.push_str("\n\n[TABLES]\n");
            text.push_str(&body.table_rows.join("\n"));
        }

        Ok(ExtractedText::new(text, DocumentFormat::Docx)
            .with_property("paragraphs", body.paragraphs.len())
            .with_property("tables", body.tables))
    }
}

#[derive(Debug, Default, PartialEq, Eq)]
pub(crate) struct DocumentBody {
    pub paragraphs: Vec<String>,
    pub table_rows: Vec<String>,
    pub tables: usize,
}

/// Walk WordprocessingML, collecting top-level paragraphs and table rows
pub(crate) fn parse_document_xml(xml: &str) -> Result<DocumentBody, quick_xml::Error> {
    let mut reader = Reader::from_str(xml);
    let mut body = DocumentBody::default();

    let mut table_depth = 0_usize;
    let mut in_text = false;
    let mut paragraph = String::new();
    let mut cell = String::new();
    let mut row: Vec<String> = Vec::new();

    loop {
        match reader.read_event()? {
            Event::Start(element) => match element.name().as_ref() {
                b"w:tbl" => {
                    if table_depth == 0 {
                        body.tables += 1;
                    }
                    table_depth += 1;
                }
                b"w:tr" => row.clear(),
                b"w:tc" => cell.clear(),
                b"w:p" => paragraph.clear(),
                b"w:t" => in_text = true,
                b"w:tab" => paragraph.push('\t'),
                b"w:br" => paragraph.push('\n'),
                _ => {}
            },
            Event::Empty(element) => match element.name().as_ref() {
                b"w:tab" => paragraph.push('\t'),
                b"w:br" => paragraph.push('\n'),
                _ => {}
            },
            Event::Text(content) if in_text => {
                paragraph.push_str(&content.unescape()?);
            }
            Event::End(element) => match element.name().as_ref() {
                b"w:t" => in_text = false,
                b"w:p" => {
                    let text = paragraph.trim();
                    if table_depth == 0 {
                        if !text.is_empty() {
                            body.paragraphs.push(text.to_string());
                        }
                    } else if !text.is_empty() {
                        if !cell.is_empty() {
                            cell.push(' ');
                        }
                        cell.push_str(text);
                    }
                    paragraph.clear();
                }
                b"w:tc" => row.push(std::mem::take(&mut cell)),
                b"w:tr" => {
                    if row.iter().any(|c| !c.is_empty()) {
                        body.table_rows.push(row.join(" | "));
                    }
                    row.clear();
                }
                b"w:tbl" => table_depth = table_depth.saturating_sub(1),
                _ => {}
            },
            Event::Eof => break,
            _ => {}
        }
    }

    Ok(body)
}
