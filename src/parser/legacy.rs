//! Decoder for Outlook `.msg` files (OLE compound-file containers).
//!
//! The container itself is read by a [`LegacyReader`]. When no reader is
//! available, or the file cannot be opened in time, decoding still succeeds
//! with a placeholder message so that one file never aborts an import batch.

use std::sync::mpsc::{self, RecvTimeoutError};
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tracing::{debug, warn};

use crate::error::{EmlError, Result};
use crate::model::attachment::{Attachment, AttachmentKind, AttachmentSize, TransferEncoding};
use crate::model::message::Message;
use crate::parser::{body, codec};

/// Body stored in a legacy container.
#[derive(Debug, Clone, PartialEq)]
pub enum LegacyBody {
    Plain(String),
    Html(String),
}

/// One attachment as stored in the container, with raw content.
#[derive(Debug, Clone, PartialEq)]
pub struct RawAttachment {
    pub file_name: String,
    pub mime_type: Option<String>,
    pub content: Vec<u8>,
}

/// Fields a structured-storage reader can recover from a legacy container.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LegacyRecord {
    pub sender: Option<String>,
    pub recipients: Vec<String>,
    pub subject: Option<String>,
    pub delivered_at: Option<String>,
    pub body: Option<LegacyBody>,
    pub attachments: Vec<RawAttachment>,
}

/// Capability that opens a legacy container.
///
/// Returns `UnsupportedFormat` when the bytes cannot be read.
pub trait LegacyReader: Send + Sync {
    fn read(&self, bytes: &[u8]) -> Result<LegacyRecord>;
}

/// Reader used when no container decoder is compiled in.
#[derive(Debug, Default, Clone, Copy)]
pub struct UnavailableReader;

impl LegacyReader for UnavailableReader {
    fn read(&self, _bytes: &[u8]) -> Result<LegacyRecord> {
        Err(EmlError::UnsupportedFormat(
            "no .msg reader is available in this build".into(),
        ))
    }
}

#[cfg(feature = "outlook")]
pub use outlook::OutlookReader;

/// The best reader this build offers.
pub fn default_reader() -> Arc<dyn LegacyReader> {
    #[cfg(feature = "outlook")]
    {
        Arc::new(OutlookReader)
    }
    #[cfg(not(feature = "outlook"))]
    {
        Arc::new(UnavailableReader)
    }
}

/// Decode a legacy container, degrading to a placeholder on any failure.
///
/// The reader runs on a worker thread; if it does not answer within
/// `timeout` the placeholder is returned and the worker is left to finish.
pub fn decode_legacy(
    name: &str,
    bytes: &[u8],
    reader: &Arc<dyn LegacyReader>,
    timeout: Duration,
) -> Message {
    let size = bytes.len() as u64;
    match read_with_timeout(bytes, reader, timeout) {
        Ok(record) => {
            debug!(file = name, attachments = record.attachments.len(), "Decoded MSG");
            record_to_message(name, size, record)
        }
        Err(e) => {
            warn!(file = name, error = %e, "MSG file could not be decoded, using placeholder");
            placeholder(name, size)
        }
    }
}

fn read_with_timeout(
    bytes: &[u8],
    reader: &Arc<dyn LegacyReader>,
    timeout: Duration,
) -> Result<LegacyRecord> {
    let (tx, rx) = mpsc::channel();
    let worker = Arc::clone(reader);
    let data = bytes.to_vec();

    std::thread::Builder::new()
        .name("msg-reader".into())
        .spawn(move || {
            let _ = tx.send(worker.read(&data));
        })
        .map_err(|e| EmlError::UnsupportedFormat(format!("cannot start reader: {e}")))?;

    match rx.recv_timeout(timeout) {
        Ok(result) => result,
        Err(RecvTimeoutError::Timeout) => Err(EmlError::UnsupportedFormat(format!(
            "reader did not finish within {}s",
            timeout.as_secs_f32()
        ))),
        Err(RecvTimeoutError::Disconnected) => Err(EmlError::UnsupportedFormat(
            "reader stopped unexpectedly".into(),
        )),
    }
}

fn record_to_message(name: &str, size: u64, record: LegacyRecord) -> Message {
    let text = match record.body {
        Some(LegacyBody::Plain(text)) => text,
        Some(LegacyBody::Html(html)) => codec::strip_html(&html),
        None => String::new(),
    };

    let recipients = record
        .recipients
        .iter()
        .map(|r| r.trim())
        .filter(|r| !r.is_empty())
        .collect::<Vec<_>>()
        .join(", ");

    let attachments = record
        .attachments
        .into_iter()
        .map(|raw| Attachment {
            kind: AttachmentKind::from_filename(&raw.file_name),
            size: AttachmentSize::Exact(raw.content.len() as u64),
            mime_type: raw
                .mime_type
                .filter(|m| !m.trim().is_empty())
                .unwrap_or_else(|| "application/octet-stream".to_string()),
            transfer_encoding: TransferEncoding::Base64,
            payload: codec::encode_base64(&raw.content),
            name: raw.file_name,
        })
        .collect();

    Message {
        id: None,
        sender: non_empty(record.sender).unwrap_or_else(|| "Unknown".to_string()),
        recipients: if recipients.is_empty() {
            "Unknown".to_string()
        } else {
            recipients
        },
        subject: non_empty(record.subject).unwrap_or_else(|| "No Subject".to_string()),
        sent_at: non_empty(record.delivered_at).unwrap_or_else(|| Utc::now().to_rfc3339()),
        body: body::finish_body(&text),
        attachments,
        source_file_name: name.to_string(),
        source_file_size: size,
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

/// Message returned when the container cannot be read.
pub fn placeholder(name: &str, size: u64) -> Message {
    let subject = match name.rsplit_once('.') {
        Some((stem, ext)) if ext.eq_ignore_ascii_case("msg") => stem.to_string(),
        _ => name.to_string(),
    };

    Message {
        id: None,
        sender: "MSG file - conversion to EML recommended".to_string(),
        recipients: "Recipient information not available".to_string(),
        subject,
        sent_at: Utc::now().to_rfc3339(),
        body: "This MSG file could not be read. Convert it to EML format to see its content and attachments."
            .to_string(),
        attachments: Vec::new(),
        source_file_name: name.to_string(),
        source_file_size: size,
    }
}

#[cfg(feature = "outlook")]
mod outlook {
    use std::io::Write;

    use msg_parser::Outlook;

    use super::{LegacyBody, LegacyReader, LegacyRecord, RawAttachment};
    use crate::error::{EmlError, Result};
    use crate::parser::codec;

    /// Reader backed by the `msg_parser` crate.
    #[derive(Debug, Default, Clone, Copy)]
    pub struct OutlookReader;

    impl LegacyReader for OutlookReader {
        fn read(&self, bytes: &[u8]) -> Result<LegacyRecord> {
            // msg_parser only opens paths, so spool the bytes first.
            let mut spool = tempfile::NamedTempFile::new()?;
            spool.write_all(bytes)?;
            spool.flush()?;

            let outlook = Outlook::from_path(spool.path())
                .map_err(|e| EmlError::UnsupportedFormat(format!("invalid MSG file: {e}")))?;
            Ok(to_record(outlook))
        }
    }

    fn person(name: &str, email: &str) -> String {
        match (name.trim(), email.trim()) {
            ("", email) => email.to_string(),
            (name, "") => name.to_string(),
            (name, email) => format!("{name} <{email}>"),
        }
    }

    fn to_record(outlook: Outlook) -> LegacyRecord {
        let sender = person(&outlook.sender.name, &outlook.sender.email);
        let recipients = outlook
            .to
            .iter()
            .map(|p| person(&p.name, &p.email))
            .filter(|p| !p.is_empty())
            .collect();

        let attachments = outlook
            .attachments
            .iter()
            .map(|att| RawAttachment {
                file_name: if att.file_name.is_empty() {
                    att.display_name.clone()
                } else {
                    att.file_name.clone()
                },
                mime_type: Some(att.mime_tag.clone()),
                content: decode_payload(&att.payload),
            })
            .collect();

        LegacyRecord {
            sender: Some(sender),
            recipients,
            subject: Some(outlook.subject),
            delivered_at: Some(outlook.headers.date),
            body: (!outlook.body.is_empty()).then(|| LegacyBody::Plain(outlook.body)),
            attachments,
        }
    }

    /// Attachment payloads come back as text: hex digits or base64.
    fn decode_payload(payload: &str) -> Vec<u8> {
        let trimmed = payload.trim();
        if let Some(bytes) = decode_hex(trimmed) {
            return bytes;
        }
        codec::decode_base64(trimmed).unwrap_or_else(|_| trimmed.as_bytes().to_vec())
    }

    fn decode_hex(text: &str) -> Option<Vec<u8>> {
        if text.is_empty() || text.len() % 2 != 0 || !text.bytes().all(|b| b.is_ascii_hexdigit()) {
            return None;
        }
        (0..text.len())
            .step_by(2)
            .map(|i| u8::from_str_radix(&text[i..i + 2], 16).ok())
            .collect()
    }

}

#[cfg(test)]
mod tests {
    use super::*;

    struct FixedReader(LegacyRecord);

    impl LegacyReader for FixedReader {
        fn read(&self, _bytes: &[u8]) -> Result<LegacyRecord> {
            Ok(self.0.clone())
        }
    }

    struct SlowReader;

    impl LegacyReader for SlowReader {
        fn read(&self, _bytes: &[u8]) -> Result<LegacyRecord> {
            std::thread::sleep(Duration::from_millis(500));
            Ok(LegacyRecord::default())
        }
    }

    #[test]
    fn test_unavailable_reader_gives_placeholder() {
        let reader: Arc<dyn LegacyReader> = Arc::new(UnavailableReader);
        let msg = decode_legacy("Budget Q3.msg", b"\xd0\xcf\x11\xe0", &reader, Duration::from_secs(1));
        assert_eq!(msg.subject, "Budget Q3");
        assert!(msg.attachments.is_empty());
        assert!(msg.sender.contains("conversion"));
        assert_eq!(msg.source_file_size, 4);
    }

    #[test]
    fn test_timeout_gives_placeholder() {
        let reader: Arc<dyn LegacyReader> = Arc::new(SlowReader);
        let msg = decode_legacy("slow.msg", b"x", &reader, Duration::from_millis(20));
        assert_eq!(msg.subject, "slow");
        assert!(msg.attachments.is_empty());
    }

    #[test]
    fn test_record_mapping() {
        let record = LegacyRecord {
            sender: Some("Ann <ann@example.com>".into()),
            recipients: vec!["bob@example.com".into(), " ".into(), "cy@example.com".into()],
            subject: None,
            delivered_at: Some("2024-03-01T10:00:00Z".into()),
            body: Some(LegacyBody::Html("<p>Hello</p><p>World</p>".into())),
            attachments: vec![RawAttachment {
                file_name: "scan.pdf".into(),
                mime_type: None,
                content: b"%PDF-1.4".to_vec(),
            }],
        };
        let reader: Arc<dyn LegacyReader> = Arc::new(FixedReader(record));
        let msg = decode_legacy("mail.msg", b"ignored", &reader, Duration::from_secs(5));

        assert_eq!(msg.sender, "Ann <ann@example.com>");
        assert_eq!(msg.recipients, "bob@example.com, cy@example.com");
        assert_eq!(msg.subject, "No Subject");
        assert_eq!(msg.sent_at, "2024-03-01T10:00:00Z");
        assert_eq!(msg.body, "Hello\n\nWorld");
        assert_eq!(msg.attachments.len(), 1);
        let att = &msg.attachments[0];
        assert_eq!(att.kind, AttachmentKind::Pdf);
        assert_eq!(att.transfer_encoding, TransferEncoding::Base64);
        assert_eq!(att.mime_type, "application/octet-stream");
        assert_eq!(att.size, AttachmentSize::Exact(8));
        assert_eq!(att.decode_payload().unwrap(), b"%PDF-1.4");
    }
}
