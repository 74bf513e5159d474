//! Decoder for individual `.eml` files (RFC 5322 / MIME text messages).

use std::panic::{self, AssertUnwindSafe};

use tracing::debug;

use crate::error::{EmlError, Result};
use crate::model::message::Message;
use crate::parser::{attachment, body, codec, header, splitter};

/// Decode one `.eml` file into a [`Message`].
///
/// Any unexpected failure is reported as a single `FileDecode` error for
/// this file; no partial message is returned.
pub fn decode_eml(name: &str, bytes: &[u8]) -> Result<Message> {
    panic::catch_unwind(AssertUnwindSafe(|| decode_eml_text(name, bytes))).map_err(|cause| {
        let reason = cause
            .downcast_ref::<&str>()
            .map(|s| s.to_string())
            .or_else(|| cause.downcast_ref::<String>().cloned())
            .unwrap_or_else(|| "unexpected failure".to_string());
        EmlError::FileDecode {
            name: name.to_string(),
            reason,
        }
    })
}

fn decode_eml_text(name: &str, bytes: &[u8]) -> Message {
    let text = codec::decode_input(bytes);
    let lines: Vec<&str> = text.split('\n').collect();

    let top = header::parse_top_headers(&lines);
    let body_text = lines[top.body_start.min(lines.len())..].join("\n");

    let boundary = top_level_boundary(&top.block, &text);
    let body = match boundary.as_deref() {
        Some(boundary) => body::extract_email_body(&body_text, Some(boundary)),
        None => {
            let decoded = body::decode_single_part(&body_text, &top.block);
            body::extract_email_body(&decoded, None)
        }
    };

    let attachments = attachment::extract_attachments(&text);
    debug!(
        file = name,
        multipart = boundary.is_some(),
        attachments = attachments.len(),
        "Decoded EML"
    );

    Message {
        id: None,
        sender: top.from.unwrap_or_else(|| "Unknown".to_string()),
        recipients: top.to.unwrap_or_else(|| "Unknown".to_string()),
        subject: top.subject.unwrap_or_else(|| "No Subject".to_string()),
        sent_at: top.date.unwrap_or_else(|| "Unknown Date".to_string()),
        body,
        attachments,
        source_file_name: name.to_string(),
        source_file_size: bytes.len() as u64,
    }
}

/// Boundary of a multipart message.
///
/// A declared non-multipart `Content-Type` means single part, whatever the
/// body says. Without any top-level `Content-Type` the whole text is searched.
fn top_level_boundary(block: &header::HeaderBlock, text: &str) -> Option<String> {
    match block.content_type() {
        Some(ct) if ct.starts_with("multipart/") => block
            .content_type_param("boundary")
            .or_else(|| splitter::find_boundary(text)),
        Some(_) => None,
        None => splitter::find_boundary(text),
    }
}
