//! Decoded message entity.

use serde::{Deserialize, Serialize};

use super::attachment::Attachment;

/// Body text used when nothing readable could be extracted.
pub const NO_READABLE_CONTENT: &str = "No readable content found.";

/// One decoded input file.
///
/// Built once by a message decoder and not mutated afterwards, except for
/// `id`, which belongs to the import layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    /// Identity assigned by the import session (not part of decoding).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<u64>,

    /// Raw `From:` value.
    pub sender: String,

    /// Raw `To:` value (comma-joined, not validated).
    pub recipients: String,

    pub subject: String,

    /// Raw `Date:` value; not parsed into a calendar type.
    pub sent_at: String,

    /// Decoded, cleaned plain text. Never empty.
    pub body: String,

    /// Attachments in positional order.
    pub attachments: Vec<Attachment>,

    pub source_file_name: String,

    /// Size of the input file in bytes.
    pub source_file_size: u64,
}

impl Message {
    /// Attachments that may take part in a PDF merge.
    pub fn pdf_attachments(&self) -> impl Iterator<Item = &Attachment> {
        self.attachments.iter().filter(|a| a.is_pdf())
    }
}

/// Flatten the PDF attachments of several messages, in message order.
pub fn collect_pdf_attachments(messages: &[Message]) -> Vec<Attachment> {
    messages
        .iter()
        .flat_map(|m| m.pdf_attachments().cloned())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::attachment::{AttachmentKind, AttachmentSize, TransferEncoding};

    fn attachment(name: &str) -> Attachment {
        Attachment {
            name: name.to_string(),
            size: AttachmentSize::Unknown,
            kind: AttachmentKind::from_filename(name),
            mime_type: "application/octet-stream".to_string(),
            transfer_encoding: TransferEncoding::Base64,
            payload: String::new(),
        }
    }

    fn message(subject: &str, names: &[&str]) -> Message {
        Message {
            id: None,
            sender: "Unknown".into(),
            recipients: "Unknown".into(),
            subject: subject.into(),
            sent_at: "Unknown Date".into(),
            body: NO_READABLE_CONTENT.into(),
            attachments: names.iter().map(|n| attachment(n)).collect(),
            source_file_name: format!("{subject}.eml"),
            source_file_size: 0,
        }
    }

    #[test]
    fn test_collect_pdf_attachments_in_message_order() {
        let messages = vec![
            message("a", &["one.pdf", "pic.png", "two.PDF"]),
            message("b", &[]),
            message("c", &["three.pdf"]),
        ];
        let names: Vec<_> = collect_pdf_attachments(&messages)
            .into_iter()
            .map(|a| a.name)
            .collect();
        assert_eq!(names, ["one.pdf", "two.PDF", "three.pdf"]);
    }

    #[test]
    fn test_id_is_skipped_when_unset() {
        let json = serde_json::to_value(message("a", &[])).unwrap();
        assert!(json.get("id").is_none());
        assert_eq!(json["subject"], "a");
    }
}
