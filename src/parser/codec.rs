//! Transfer-encoding codecs and the HTML-to-text reducer.
//!
//! Everything here is pure: no I/O, no shared state.

use base64::alphabet;
use base64::engine::general_purpose::{GeneralPurpose, GeneralPurposeConfig, STANDARD};
use base64::engine::DecodePaddingMode;
use base64::Engine as _;
use encoding_rs::{Encoding, UTF_8, WINDOWS_1252};
use once_cell::sync::Lazy;
use regex::Regex;

use crate::error::{EmlError, Result};

/// Base64 engine that accepts missing or present padding.
const LENIENT_BASE64: GeneralPurpose = GeneralPurpose::new(
    &alphabet::STANDARD,
    GeneralPurposeConfig::new()
        .with_decode_padding_mode(DecodePaddingMode::Indifferent)
        .with_decode_allow_trailing_bits(true),
);

/// Maximum encoded line length before a soft break is inserted.
const QP_LINE_LIMIT: usize = 75;

// ── Quoted-printable ────────────────────────────────────────────

/// Decode quoted-printable text into raw bytes.
///
/// Soft line breaks (`=` before a line terminator) are removed and `=XX`
/// escapes become the byte they name. Malformed escapes pass through as-is.
pub fn decode_quoted_printable(text: &str) -> Vec<u8> {
    let bytes = text.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;

    while i < bytes.len() {
        if bytes[i] == b'=' {
            match (bytes.get(i + 1), bytes.get(i + 2)) {
                (Some(&b'\n'), _) => {
                    i += 2;
                    continue;
                }
                (Some(&b'\r'), Some(&b'\n')) => {
                    i += 3;
                    continue;
                }
                (Some(&hi), Some(&lo)) => {
                    if let (Some(hi), Some(lo)) = (hex_value(hi), hex_value(lo)) {
                        out.push(hi << 4 | lo);
                        i += 3;
                        continue;
                    }
                }
                _ => {}
            }
        }
        out.push(bytes[i]);
        i += 1;
    }

    out
}

/// Decode quoted-printable text and interpret the bytes in `charset`.
pub fn decode_quoted_printable_text(text: &str, charset: Option<&str>) -> String {
    decode_text(&decode_quoted_printable(text), charset)
}

/// Encode text as quoted-printable, using `=XX` for control and non-ASCII
/// bytes and `=` + newline soft breaks for long lines.
pub fn encode_quoted_printable(text: &str) -> String {
    let bytes = text.as_bytes();
    let mut out = String::with_capacity(bytes.len() * 3 / 2);
    let mut line_len = 0;

    for (i, &b) in bytes.iter().enumerate() {
        if b == b'\n' {
            out.push('\n');
            line_len = 0;
            continue;
        }

        let next_is_eol = matches!(bytes.get(i + 1), None | Some(&b'\n'));
        let literal = match b {
            b' ' | b'\t' => !next_is_eol,
            b'=' => false,
            33..=126 => true,
            _ => false,
        };
        let token = if literal {
            (b as char).to_string()
        } else {
            format!("={b:02X}")
        };

        if line_len + token.len() > QP_LINE_LIMIT {
            out.push_str("=\n");
            line_len = 0;
        }
        line_len += token.len();
        out.push_str(&token);
    }

    out
}

fn hex_value(b: u8) -> Option<u8> {
    (b as char).to_digit(16).map(|d| d as u8)
}

// ── Base64 ──────────────────────────────────────────────────────

/// Decode base64 text after stripping all whitespace.
pub fn decode_base64(text: &str) -> Result<Vec<u8>> {
    let cleaned: String = text.chars().filter(|c| !c.is_whitespace()).collect();
    LENIENT_BASE64
        .decode(cleaned.as_bytes())
        .map_err(|e| EmlError::Decode(format!("invalid base64: {e}")))
}

/// Encode bytes as standard padded base64 (single line).
pub fn encode_base64(bytes: &[u8]) -> String {
    STANDARD.encode(bytes)
}

// ── Charsets ────────────────────────────────────────────────────

/// Interpret decoded bytes in the declared charset (UTF-8 when absent or unknown).
pub fn decode_text(bytes: &[u8], charset: Option<&str>) -> String {
    let encoding = charset
        .and_then(|label| Encoding::for_label(label.trim().trim_matches('"').as_bytes()))
        .unwrap_or(UTF_8);
    let (text, _, _) = encoding.decode(bytes);
    text.into_owned()
}

/// Turn raw file bytes into text: UTF-8 when valid, windows-1252 otherwise.
pub fn decode_input(bytes: &[u8]) -> String {
    match std::str::from_utf8(bytes) {
        Ok(s) => s.to_string(),
        Err(_) => {
            let (text, _, _) = WINDOWS_1252.decode(bytes);
            text.into_owned()
        }
    }
}

// ── HTML ────────────────────────────────────────────────────────

static SCRIPT_OR_STYLE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?is)<script\b.*?</script\s*>|<style\b.*?</style\s*>").expect("valid regex")
});

/// Block-level tags and their text replacement, applied in order.
static BLOCK_RULES: Lazy<Vec<(Regex, &'static str)>> = Lazy::new(|| {
    [
        (r"(?i)</p\s*>", "\n\n"),
        (r"(?i)</div\s*>", "\n"),
        (r"(?i)</h[1-6]\s*>", "\n\n"),
        (r"(?i)<br\s*/?>", "\n"),
        (r"(?i)</td\s*>", " "),
        (r"(?i)</tr\s*>", "\n"),
        (r"(?i)</table\s*>", "\n"),
        (r"(?i)<li\b[^>]*>", "\n• "),
    ]
    .into_iter()
    .map(|(pattern, replacement)| (Regex::new(pattern).expect("valid regex"), replacement))
    .collect()
});

static ANY_TAG: Lazy<Regex> = Lazy::new(|| Regex::new(r"<[^>]+>").expect("valid regex"));
static INLINE_SPACE: Lazy<Regex> = Lazy::new(|| Regex::new(r"[^\S\n]+").expect("valid regex"));
static SPACE_AROUND_NEWLINE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r" ?\n ?").expect("valid regex"));
static EXCESS_NEWLINES: Lazy<Regex> = Lazy::new(|| Regex::new(r"\n{3,}").expect("valid regex"));

/// Reduce HTML to readable plain text.
///
/// - Drops `<script>` and `<style>` blocks
/// - Turns paragraph, heading, div, row and table ends into line breaks
/// - Turns `<li>` into `"• item"` lines
/// - Strips all remaining tags and unescapes the common entities
/// - Collapses runs of spaces and of three or more newlines
pub fn strip_html(html: &str) -> String {
    let text = html.replace("\r\n", "\n");
    let mut text = SCRIPT_OR_STYLE.replace_all(&text, "").into_owned();

    for (pattern, replacement) in BLOCK_RULES.iter() {
        text = pattern.replace_all(&text, *replacement).into_owned();
    }
    let text = ANY_TAG.replace_all(&text, "");

    let text = unescape_entities(&text);
    let text = INLINE_SPACE.replace_all(&text, " ");
    let text = SPACE_AROUND_NEWLINE.replace_all(&text, "\n");
    let text = EXCESS_NEWLINES.replace_all(&text, "\n\n");

    text.trim().to_string()
}

/// Unescape the handful of entities mail clients actually emit.
fn unescape_entities(text: &str) -> String {
    // `&amp;` goes last so that `&amp;lt;` stays literal `&lt;`.
    text.replace("&nbsp;", " ")
        .replace("&#160;", " ")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&apos;", "'")
        .replace("&amp;", "&")
}
