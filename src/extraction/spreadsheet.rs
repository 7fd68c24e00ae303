use calamine::{Data, Range, Reader, open_workbook_auto_from_rs};
use std::io::Cursor;

use super::{DocumentFormat, ExtractedText, ExtractionError, TextExtractor};

/// Workbooks: every sheet serialized row by row under a sheet header
#[derive(Debug, Clone, Copy, Default)]
pub struct SpreadsheetExtractor;

impl TextExtractor for SpreadsheetExtractor {
    fn format(&self) -> DocumentFormat {
        DocumentFormat::Spreadsheet
    }

    fn extract(&self, bytes: &[u8]) -> Result<ExtractedText, ExtractionError> {
        let mut workbook = open_workbook_auto_from_rs(Cursor::new(bytes.to_vec()))
            .map_err(|e| ExtractionError::corrupt(DocumentFormat::Spreadsheet, e))?;

        let sheet_names = workbook.sheet_names();
        let mut sections = Vec::with_capacity(sheet_names.len());

        for name in &sheet_names {
            let range = workbook.worksheet_range(name).map_err(|e| {
                ExtractionError::ExtractorFailure {
                    format: DocumentFormat::Spreadsheet,
                    reason: format!("sheet '{name}': {e}"),
                }
            })?;
            sections.push(format!("=== Sheet: {name} ===\n{}", render_rows(&range)));
        }

        Ok(ExtractedText::new(sections.join("\n\n"), DocumentFormat::Spreadsheet)
            .with_property("sheets", sheet_names.len()))
    }
}

/// One line per non-empty row, cells separated by ` | `
pub(crate) fn render_rows(range: &Range<Data>) -> String {
    range
        .rows()
        .filter(|row| row.iter().any(|cell| !matches!(cell, Data::Empty)))
        .map(|row| {
            row.iter()
                .map(ToString::to_string)
                .collect::<Vec<_>>()
                .join(" | ")
        })
        .collect::<Vec<_>>()
        .join("\n")
}
