//! Body resolution: pick one readable plain-text body out of a message.
//!
//! Preference order is load-bearing and must stay as it is:
//! 1. the last non-empty decoded `text/plain` part
//! 2. the last non-empty `text/html` part, reduced with [`strip_html`]
//! 3. the raw-multipart fallback over the whole text
//!
//! The result always goes through [`finish_body`], which never returns an
//! empty string.

use once_cell::sync::Lazy;
use regex::Regex;
use tracing::{debug, warn};

use crate::model::attachment::TransferEncoding;
use crate::model::message::NO_READABLE_CONTENT;
use crate::parser::codec::{self, strip_html};
use crate::parser::header::HeaderBlock;
use crate::parser::splitter::{self, Separator};

/// Maximum depth for nested multipart descent (guards adversarial input).
pub const MAX_DEPTH: usize = 10;

/// Boundary-like tokens recognised by the raw fallback (Outlook-style `--_…`).
static RAW_BOUNDARY: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"--_[A-Za-z0-9_]+").expect("valid regex"));

static STRAY_HEADER_LINE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?im)^(from|to|subject|date|sent):.*$").expect("valid regex"));
static STRAY_CONTENT_HEADER: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)content-(type|transfer-encoding):[^\n]*(\n|$)").expect("valid regex")
});
static INLINE_SPACE: Lazy<Regex> = Lazy::new(|| Regex::new(r"[ \t]+").expect("valid regex"));
static LEADING_SPACE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?m)^ ").expect("valid regex"));
static TRAILING_SPACE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?m) $").expect("valid regex"));
static EXCESS_NEWLINES: Lazy<Regex> = Lazy::new(|| Regex::new(r"\n{3,}").expect("valid regex"));

/// Resolve the readable body of a message.
///
/// `text` is the message with its top-level headers removed. `boundary` is
/// the top-level boundary when one was found in the original message.
pub fn extract_email_body(text: &str, boundary: Option<&str>) -> String {
    let is_multipart = boundary.is_some()
        || text.contains("Content-Type: multipart/")
        || RAW_BOUNDARY.is_match(text);

    let mut body = if is_multipart {
        let boundary = boundary
            .map(str::to_string)
            .or_else(|| splitter::find_boundary(text));
        match boundary {
            Some(boundary) => resolve_multipart(text, &boundary),
            None => {
                debug!("multipart markers without boundary, using raw fallback");
                extract_from_raw_multipart(text)
            }
        }
    } else {
        text.to_string()
    };

    if looks_like_html(&body) {
        body = strip_html(&body);
    }

    finish_body(&body)
}

/// Decode a single-part body according to its top-level headers.
///
/// Only text types in quoted-printable or base64 are touched; anything else
/// is returned unchanged.
pub fn decode_single_part(text: &str, headers: &HeaderBlock) -> String {
    let content_type = headers
        .content_type()
        .unwrap_or_else(|| "text/plain".to_string());
    if !content_type.starts_with("text/") {
        return text.to_string();
    }
    let charset = headers.content_type_param("charset");
    decode_content(text, &headers.transfer_encoding(), &content_type, charset.as_deref())
}

/// Run the cleanup pass and substitute the placeholder for empty results.
pub fn finish_body(body: &str) -> String {
    let cleaned = clean_email_body(body);
    if cleaned.is_empty() {
        NO_READABLE_CONTENT.to_string()
    } else {
        cleaned
    }
}

#[derive(Default)]
struct Candidates {
    plain: Option<String>,
    html: Option<String>,
}

fn resolve_multipart(text: &str, boundary: &str) -> String {
    let mut found = Candidates::default();
    collect_candidates(text, boundary, 0, &mut found);

    if let Some(plain) = found.plain {
        return plain.trim().to_string();
    }
    if let Some(html) = found.html {
        return strip_html(&html);
    }
    debug!(boundary, "no text part resolved, using raw fallback");
    extract_from_raw_multipart(text)
}

fn collect_candidates(text: &str, boundary: &str, depth: usize, found: &mut Candidates) {
    for part in splitter::split_parts(text, boundary) {
        let (head, content) = match part.sections(Separator::CrlfOrLf) {
            Ok(sections) => sections,
            Err(e) => {
                debug!(error = %e, "skipping part");
                continue;
            }
        };

        let headers = HeaderBlock::parse(head);
        if headers.is_attachment() {
            continue;
        }
        let Some(content_type) = headers.content_type() else {
            continue;
        };

        if content_type.starts_with("multipart/") {
            match headers.content_type_param("boundary") {
                Some(inner) if depth < MAX_DEPTH => {
                    collect_candidates(content, &inner, depth + 1, found);
                }
                _ => debug!(depth, "not descending into nested multipart"),
            }
            continue;
        }

        let content = truncate_at_boundary_marker(content).trim();
        let charset = headers.content_type_param("charset");
        let decoded = decode_content(
            content,
            &headers.transfer_encoding(),
            &content_type,
            charset.as_deref(),
        );
        if decoded.trim().is_empty() {
            continue;
        }

        if content_type.starts_with("text/plain") {
            found.plain = Some(decoded);
        } else if content_type.starts_with("text/html") {
            found.html = Some(decoded);
        }
    }
}

fn decode_content(
    content: &str,
    encoding: &TransferEncoding,
    content_type: &str,
    charset: Option<&str>,
) -> String {
    match encoding {
        TransferEncoding::QuotedPrintable => codec::decode_quoted_printable_text(content, charset),
        TransferEncoding::Base64 if content_type.starts_with("text/") => {
            match codec::decode_base64(content) {
                Ok(bytes) => codec::decode_text(&bytes, charset),
                Err(e) => {
                    warn!(error = %e, "failed to decode base64 text part");
                    content.to_string()
                }
            }
        }
        _ => content.to_string(),
    }
}

/// Cut `content` before the first line that looks like a boundary delimiter.
///
/// A delimiter line starts with `--`, contains no whitespace and at least one
/// alphanumeric character (so `-- ` signatures and dashed rules survive).
fn truncate_at_boundary_marker(content: &str) -> &str {
    let mut offset = 0;
    for line in content.split_inclusive('\n') {
        let token = line.trim_end();
        let is_marker = token.len() > 2
            && token.starts_with("--")
            && !token.contains(char::is_whitespace)
            && token.chars().any(|c| c.is_ascii_alphanumeric());
        if is_marker {
            return &content[..offset];
        }
        offset += line.len();
    }
    content
}

/// Last-resort extraction between repeated `--_…` tokens.
///
/// Takes the longest text-typed segment, decoding quoted-printable when the
/// segment contains `=`. Returns the input unchanged if nothing qualifies.
fn extract_from_raw_multipart(text: &str) -> String {
    let marks: Vec<_> = RAW_BOUNDARY.find_iter(text).collect();
    let mut best = String::new();

    for pair in marks.windows(2) {
        let segment = &text[pair[0].end()..pair[1].start()];
        if !(segment.contains("text/plain") || segment.contains("text/html")) {
            continue;
        }

        let start = segment
            .find("\r\n\r\n")
            .map(|i| i + 4)
            .or_else(|| segment.find("\n\n").map(|i| i + 2));
        let Some(start) = start else {
            continue;
        };

        let mut content = segment[start..].trim().to_string();
        if content.contains('=') {
            content = codec::decode_quoted_printable_text(&content, None);
        }
        let content = RAW_BOUNDARY.replace_all(&content, "").trim().to_string();

        if content.len() > best.len() {
            best = content;
        }
    }

    if best.is_empty() {
        text.to_string()
    } else {
        best
    }
}

fn looks_like_html(body: &str) -> bool {
    let lower = body.to_ascii_lowercase();
    ["<html", "<body", "<div", "<p>"]
        .iter()
        .any(|marker| lower.contains(marker))
}

/// Remove header-looking lines, boundary artifacts and leftover content
/// headers, then normalise whitespace.
fn clean_email_body(body: &str) -> String {
    let text = body.replace("\r\n", "\n").replace('\r', "\n");
    let text = STRAY_HEADER_LINE.replace_all(&text, "");
    let text = RAW_BOUNDARY.replace_all(&text, "");
    let text = STRAY_CONTENT_HEADER.replace_all(&text, "");
    let text = INLINE_SPACE.replace_all(&text, " ");
    let text = LEADING_SPACE.replace_all(&text, "");
    let text = TRAILING_SPACE.replace_all(&text, "");
    let text = EXCESS_NEWLINES.replace_all(&text, "\n\n");
    text.trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_single_part() {
        let body = extract_email_body("Hello there,\n\nSee you soon.\n\n", None);
        assert_eq!(body, "Hello there,\n\nSee you soon.");
    }

    #[test]
    fn test_prefers_plain_over_html() {
        let text = "--B\r\nContent-Type: text/html\r\n\r\n<p>html version</p>\r\n\
                    --B\r\nContent-Type: text/plain\r\n\r\nplain version\r\n--B--\r\n";
        assert_eq!(extract_email_body(text, Some("B")), "plain version");
    }

    #[test]
    fn test_last_text_part_of_a_type_wins() {
        let text = "--B\r\nContent-Type: text/plain\r\n\r\nfirst plain\r\n\
                    --B\r\nContent-Type: text/plain\r\nContent-Disposition: inline\r\n\r\nsecond plain\r\n\
                    --B\r\nContent-Type: text/plain\r\n\r\n   \r\n--B--\r\n";
        assert_eq!(extract_email_body(text, Some("B")), "second plain");
    }

    #[test]
    fn test_html_only_keeps_paragraph_breaks() {
        let text = "--B\nContent-Type: text/html; charset=utf-8\n\n<p>One</p><p>Two</p>\n--B--\n";
        let body = extract_email_body(text, Some("B"));
        assert_eq!(body, "One\n\nTwo");
    }

    #[test]
    fn test_base64_text_part() {
        // "Grüße" in UTF-8
        let text = "--B\r\nContent-Type: text/plain; charset=utf-8\r\n\
                    Content-Transfer-Encoding: base64\r\n\r\nR3LDvMOfZQ==\r\n--B--";
        assert_eq!(extract_email_body(text, Some("B")), "Grüße");
    }

    #[test]
    fn test_attachment_parts_are_ignored() {
        let text = "--B\r\nContent-Type: text/plain\r\nContent-Disposition: attachment; filename=a.txt\r\n\r\n\
                    attached text\r\n--B\r\nContent-Type: text/plain\r\n\r\nreal body\r\n--B--";
        assert_eq!(extract_email_body(text, Some("B")), "real body");
    }

    #[test]
    fn test_nested_alternative() {
        let text = "--outer\r\nContent-Type: multipart/alternative; boundary=\"inner\"\r\n\r\n\
                    --inner\r\nContent-Type: text/plain\r\n\r\nnested plain\r\n--inner--\r\n\
                    --outer\r\nContent-Type: application/pdf\r\nContent-Disposition: attachment; filename=x.pdf\r\n\r\nJVBERi0=\r\n\
                    --outer--\r\n";
        assert_eq!(extract_email_body(text, Some("outer")), "nested plain");
    }

    #[test]
    fn test_raw_fallback() {
        let text = "--_000_ABC_\r\nContent-Type: text/plain; charset=\"us-ascii\"\r\n\
                    Content-Transfer-Encoding: quoted-printable\r\n\r\n\
                    Caf=C3=A9 meeting moved to Friday\r\n\
                    --_000_ABC_--\r\n";
        let body = extract_email_body(text, None);
        assert_eq!(body, "Café meeting moved to Friday");
    }

    #[test]
    fn test_empty_body_placeholder() {
        assert_eq!(extract_email_body("   \n\n", None), NO_READABLE_CONTENT);
    }

    #[test]
    fn test_cleanup_strips_stray_headers() {
        let body = finish_body("From: someone\nContent-Type: text/plain\nActual   text\n\n\n\nMore");
        assert_eq!(body, "Actual text\n\nMore");
    }

    #[test]
    fn test_truncate_at_boundary_marker() {
        assert_eq!(truncate_at_boundary_marker("a\n-- \nsig\n--inner--\nz"), "a\n-- \nsig\n");
        assert_eq!(truncate_at_boundary_marker("a\n----------\nb"), "a\n----------\nb");
    }
}
