//! Attachment isolation.
//!
//! This pass re-splits the full message on its own; it shares no state with
//! body resolution. Fragments without a CRLF-CRLF separator are dropped.

use tracing::debug;

use crate::model::attachment::{Attachment, AttachmentKind, AttachmentSize, TransferEncoding};
use crate::parser::body::MAX_DEPTH;
use crate::parser::header::HeaderBlock;
use crate::parser::splitter::{self, Separator};

/// List the attachments of a raw message, in positional order.
///
/// A part qualifies when it declares `Content-Disposition: attachment`, or
/// has a `Content-Disposition` header together with a `filename=` parameter.
/// Nested multiparts are descended depth-first.
pub fn extract_attachments(text: &str) -> Vec<Attachment> {
    let (boundary, _) = match splitter::split_multipart(text) {
        Ok(split) => split,
        Err(e) => {
            debug!(error = %e, "no attachments");
            return Vec::new();
        }
    };

    let mut found = Vec::new();
    collect(text, &boundary, 0, &mut found);
    found
}

fn collect(text: &str, boundary: &str, depth: usize, found: &mut Vec<Attachment>) {
    for part in splitter::split_parts(text, boundary) {
        let (head, content) = match part.sections(Separator::CrlfOnly) {
            Ok(sections) => sections,
            Err(e) => {
                debug!(error = %e, "dropping part");
                continue;
            }
        };
        let headers = HeaderBlock::parse(head);

        if let Some(content_type) = headers.content_type() {
            if content_type.starts_with("multipart/") {
                if let Some(inner) = headers.content_type_param("boundary") {
                    if depth < MAX_DEPTH && inner != boundary {
                        collect(content, &inner, depth + 1, found);
                    }
                }
                continue;
            }
        }

        let qualifies = headers.is_attachment()
            || (headers.has("content-disposition") && headers.filename().is_some());
        if !qualifies {
            continue;
        }
        let Some(name) = headers.filename() else {
            debug!(position = part.position, "attachment without filename, skipping");
            continue;
        };

        let transfer_encoding = headers.transfer_encoding();
        let payload = content.trim().to_string();
        let size = match transfer_encoding {
            TransferEncoding::Base64 => AttachmentSize::Estimated(estimate_base64_size(&payload)),
            _ => AttachmentSize::Unknown,
        };

        found.push(Attachment {
            kind: AttachmentKind::from_filename(&name),
            mime_type: headers
                .raw_content_type()
                .unwrap_or_else(|| "application/octet-stream".to_string()),
            name,
            size,
            transfer_encoding,
            payload,
        });
    }
}

/// Approximate decoded size of a base64 payload: `ceil(len * 3 / 4)`,
/// where `len` ignores whitespace.
pub fn estimate_base64_size(payload: &str) -> u64 {
    let len = payload.chars().filter(|c| !c.is_whitespace()).count() as u64;
    (len * 3).div_ceil(4)
}

#[cfg(test)]
mod tests {
    use super::*;

    const TWO_ATTACHMENTS: &str = "From: a@example.com\r\n\
Content-Type: multipart/mixed; boundary=\"MIX\"\r\n\r\n\
--MIX\r\n\
Content-Type: text/plain\r\n\r\n\
See attached.\r\n\
--MIX\r\n\
Content-Type: application/pdf; name=\"report.pdf\"\r\n\
Content-Disposition: attachment; filename=\"report.pdf\"\r\n\
Content-Transfer-Encoding: base64\r\n\r\n\
JVBERi0xLjQK\r\n\
--MIX\r\n\
Content-Type: image/png\r\n\
Content-Disposition: inline; filename=logo.PNG\r\n\
Content-Transfer-Encoding: base64\r\n\r\n\
iVBORw0KGgo=\r\n\
--MIX--\r\n";

    #[test]
    fn test_extracts_in_order_with_kinds() {
        let atts = extract_attachments(TWO_ATTACHMENTS);
        assert_eq!(atts.len(), 2);
        assert_eq!(atts[0].name, "report.pdf");
        assert_eq!(atts[0].kind, AttachmentKind::Pdf);
        assert_eq!(atts[0].mime_type, "application/pdf");
        assert_eq!(atts[0].payload, "JVBERi0xLjQK");
        assert_eq!(atts[0].size, AttachmentSize::Estimated(9));
        assert_eq!(atts[1].name, "logo.PNG");
        assert_eq!(atts[1].kind, AttachmentKind::Image);
    }

    #[test]
    fn test_lf_only_fragments_are_dropped() {
        let lf = TWO_ATTACHMENTS.replace("\r\n", "\n");
        assert!(extract_attachments(&lf).is_empty());
    }

    #[test]
    fn test_no_boundary_no_attachments() {
        assert!(extract_attachments("Subject: x\r\n\r\nbody").is_empty());
    }

    #[test]
    fn test_non_base64_size_unknown() {
        let text = "Content-Type: multipart/mixed; boundary=Q\r\n\r\n--Q\r\n\
Content-Type: text/csv\r\nContent-Disposition: attachment; filename=data.csv\r\n\r\n\
a,b\r\n1,2\r\n--Q--\r\n";
        let atts = extract_attachments(text);
        assert_eq!(atts.len(), 1);
        assert_eq!(atts[0].size, AttachmentSize::Unknown);
        assert_eq!(atts[0].transfer_encoding, TransferEncoding::SevenBit);
        assert_eq!(atts[0].decode_payload().unwrap(), b"a,b\r\n1,2");
    }

    #[test]
    fn test_estimate_base64_size() {
        assert_eq!(estimate_base64_size("QUJD"), 3);
        assert_eq!(estimate_base64_size("QU\r\nJD\n"), 3);
        assert_eq!(estimate_base64_size("QUJDRA"), 5);
        // 1366 chars -> 1025 bytes -> "1.00 KB"
        let payload = "A".repeat(1366);
        let bytes = estimate_base64_size(&payload);
        assert_eq!(bytes, 1025);
        assert_eq!(AttachmentSize::Estimated(bytes).to_string(), "1.00 KB");
    }
}
