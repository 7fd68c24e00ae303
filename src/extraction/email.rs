use mail_parser::{Addr, Address, MessageParser, MimeHeaders};

use super::{DocumentFormat, ExtractedText, ExtractionError, TextExtractor};

/// Header, body and attachment summary in the shared email layout
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EmailParts {
    pub from: String,
    pub to: String,
    pub subject: String,
    pub date: String,
    pub body: String,
    pub attachments: Vec<String>,
}

impl EmailParts {
    /// Render as `From/To/Subject/Date` lines, a blank line, the body, then
    /// an attachment list when there is one
    #[inline]
    pub fn render(&self) -> String {
        let mut lines = vec![
            format!("From: {}", self.from),
            format!("To: {}", self.to),
            format!("Subject: {}", self.subject),
            format!("Date: {}", self.date),
            format!("\n{}", self.body),
        ];

        if !self.attachments.is_empty() {
            lines.push(format!("\n[Attachments: {}]", self.attachments.len()));
            lines.extend(self.attachments.iter().map(|name| format!("  - {name}")));
        }

        lines.join("\n")
    }

    pub(crate) fn into_extracted(self, format: DocumentFormat) -> ExtractedText {
        let attachments = self.attachments.len();
        let subject = self.subject.clone();
        ExtractedText::new(self.render(), format)
            .with_property("attachments", attachments)
            .with_property("subject", subject)
    }
}

/// RFC 822 messages (`.eml`)
#[derive(Debug, Clone, Copy, Default)]
pub struct EmailExtractor;

impl TextExtractor for EmailExtractor {
    fn format(&self) -> DocumentFormat {
        DocumentFormat::Email
    }

    fn extract(&self, bytes: &[u8]) -> Result<ExtractedText, ExtractionError> {
        let message = MessageParser::default()
            .parse(bytes)
            .ok_or_else(|| ExtractionError::corrupt(DocumentFormat::Email, "unparsable message"))?;

        let parts = EmailParts {
            from: message.from().map(format_address).unwrap_or_default(),
            to: message.to().map(format_address).unwrap_or_default(),
            subject: message.subject().unwrap_or_default().to_string(),
            date: message.date().map(|d| d.to_rfc3339()).unwrap_or_default(),
            body: message
                .body_text(0)
                .map(|body| body.trim().to_string())
                .unwrap_or_default(),
            attachments: message
                .attachments()
                .enumerate()
                .map(|(i, part)| {
                    part.attachment_name()
                        .map_or_else(|| format!("attachment-{}", i + 1), ToString::to_string)
                })
                .collect(),
        };

        if parts.from.is_empty()
            && parts.to.is_empty()
            && parts.subject.is_empty()
            && parts.body.is_empty()
        {
            return Err(ExtractionError::corrupt(
                DocumentFormat::Email,
                "no headers or body found",
            ));
        }

        Ok(parts.into_extracted(DocumentFormat::Email))
    }
}

fn format_address(address: &Address<'_>) -> String {
    let addrs: Vec<&Addr<'_>> = match address {
        Address::List(list) => list.iter().collect(),
        Address::Group(groups) => groups.iter().flat_map(|g| g.addresses.iter()).collect(),
    };

    addrs
        .into_iter()
        .map(|addr| match (addr.name(), addr.address()) {
            (Some(name), Some(email)) => format!("{name} <{email}>"),
            (Some(name), None) => name.to_string(),
            (None, Some(email)) => email.to_string(),
            (None, None) => String::new(),
        })
        .filter(|formatted| !formatted.is_empty())
        .collect::<Vec<_>>()
        .join(", ")
}
