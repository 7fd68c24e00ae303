use cfb::CompoundFile;
use std::io::{Cursor, Read, Seek};
use tracing::debug;

use super::email::EmailParts;
use super::text::decode_latin1;
use super::{DocumentFormat, ExtractedText, ExtractionError, TextExtractor};

const ATTACHMENT_PREFIX: &str = "__attach_version1.0_";

// MAPI property tags, stored as `__substg1.0_{tag}{type}` streams
const PR_SUBJECT: &str = "0037";
const PR_TRANSPORT_HEADERS: &str = "007D";
const PR_SENDER_NAME: &str = "0C1A";
const PR_SENDER_EMAIL: &str = "0C1F";
const PR_DISPLAY_TO: &str = "0E04";
const PR_BODY: &str = "1000";
const PR_ATTACH_FILENAME: &str = "3704";
const PR_ATTACH_LONG_FILENAME: &str = "3707";

/// Outlook messages (`.msg`, OLE compound file)
#[derive(Debug, Clone, Copy, Default)]
pub struct OutlookMsgExtractor;

impl TextExtractor for OutlookMsgExtractor {
    fn format(&self) -> DocumentFormat {
        DocumentFormat::OutlookMsg
    }

    fn extract(&self, bytes: &[u8]) -> Result<ExtractedText, ExtractionError> {
        let mut file = CompoundFile::open(Cursor::new(bytes))
            .map_err(|e| ExtractionError::corrupt(DocumentFormat::OutlookMsg, e))?;

        let sender_name = read_property(&mut file, "", PR_SENDER_NAME).unwrap_or_default();
        let sender_email = read_property(&mut file, "", PR_SENDER_EMAIL).unwrap_or_default();
        let from = match (sender_name.is_empty(), sender_email.is_empty()) {
            (false, false) => format!("{sender_name} <{sender_email}>"),
            (false, true) => sender_name,
            _ => sender_email,
        };

        let date = read_property(&mut file, "", PR_TRANSPORT_HEADERS)
            .and_then(|headers| header_value(&headers, "Date"))
            .unwrap_or_default();

        let attachment_storages: Vec<String> = file
            .read_storage("/")
            .map_err(|e| ExtractionError::corrupt(DocumentFormat::OutlookMsg, e))?
            .filter(|entry| entry.is_storage() && entry.name().starts_with(ATTACHMENT_PREFIX))
            .map(|entry| format!("/{}", entry.name()))
            .collect();

        let attachments = attachment_storages
            .iter()
            .enumerate()
            .map(|(i, storage)| {
                read_property(&mut file, storage, PR_ATTACH_LONG_FILENAME)
                    .or_else(|| read_property(&mut file, storage, PR_ATTACH_FILENAME))
                    .unwrap_or_else(|| format!("attachment-{}", i + 1))
            })
            .collect();

        let parts = EmailParts {
            from,
            to: read_property(&mut file, "", PR_DISPLAY_TO).unwrap_or_default(),
            subject: read_property(&mut file, "", PR_SUBJECT).unwrap_or_default(),
            date,
            body: read_property(&mut file, "", PR_BODY)
                .map(|body| body.trim().to_string())
                .unwrap_or_default(),
            attachments,
        };

        debug!(
            "Parsed Outlook message '{}' with {} attachments",
            parts.subject,
            parts.attachments.len()
        );

        Ok(parts.into_extracted(DocumentFormat::OutlookMsg))
    }
}

/// Read a string property from `storage` ("" for the root), preferring the
/// UTF-16 stream over the 8-bit one
fn read_property<F: Read + Seek>(
    file: &mut CompoundFile<F>,
    storage: &str,
    tag: &str,
) -> Option<String> {
    if let Some(raw) = read_stream(file, &format!("{storage}/__substg1.0_{tag}001F")) {
        return Some(decode_utf16le(&raw));
    }

    read_stream(file, &format!("{storage}/__substg1.0_{tag}001E"))
        .map(|raw| decode_latin1(&raw).trim_end_matches('\0').to_string())
}

fn read_stream<F: Read + Seek>(file: &mut CompoundFile<F>, path: &str) -> Option<Vec<u8>> {
    let mut stream = file.open_stream(path).ok()?;
    let mut buffer = Vec::new();
    stream.read_to_end(&mut buffer).ok()?;
    Some(buffer)
}

pub(crate) fn decode_utf16le(raw: &[u8]) -> String {
    let units: Vec<u16> = raw
        .chunks_exact(2)
        .map(|pair| u16::from_le_bytes([pair[0], pair[1]]))
        .collect();
    String::from_utf16_lossy(&units)
        .trim_end_matches('\0')
        .to_string()
}

/// Value of the first `name:` header in an RFC 822 header block
fn header_value(headers: &str, name: &str) -> Option<String> {
    headers.lines().find_map(|line| {
        let (key, value) = line.split_once(':')?;
        key.trim()
            .eq_ignore_ascii_case(name)
            .then(|| value.trim().to_string())
    })
}
