//! Header extraction: the four top-level fields of a message and the
//! per-part header blocks used to classify MIME parts.

use crate::model::attachment::TransferEncoding;

/// Top-level fields recognised by exact, case-sensitive line prefix.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TopHeaders {
    pub from: Option<String>,
    pub to: Option<String>,
    pub subject: Option<String>,
    pub date: Option<String>,
    /// The whole header block, for content-type lookups on single-part messages.
    pub block: HeaderBlock,
    /// Index of the first line after the blank separator line
    /// (0 when the message has no blank line at all).
    pub body_start: usize,
}

#[derive(Clone, Copy)]
enum Field {
    From,
    To,
    Subject,
    Date,
}

const PREFIXES: [(&str, Field); 4] = [
    ("From:", Field::From),
    ("To:", Field::To),
    ("Subject:", Field::Subject),
    ("Date:", Field::Date),
];

/// Scan `lines` from the top until the first blank line.
///
/// Unrecognised headers are ignored. Continuation lines (leading space or
/// tab) extend the value of the recognised header they follow.
pub fn parse_top_headers(lines: &[&str]) -> TopHeaders {
    let mut headers = TopHeaders::default();
    let mut header_lines = Vec::new();
    let mut current: Option<Field> = None;

    for (i, line) in lines.iter().enumerate() {
        if line.trim().is_empty() {
            headers.body_start = i + 1;
            break;
        }
        header_lines.push(*line);

        if line.starts_with(' ') || line.starts_with('\t') {
            if let Some(field) = current {
                let slot = headers.slot(field);
                if let Some(value) = slot.as_mut() {
                    value.push(' ');
                    value.push_str(line.trim());
                }
            }
            continue;
        }

        current = None;
        for (prefix, field) in PREFIXES {
            if let Some(rest) = line.strip_prefix(prefix) {
                *headers.slot(field) = Some(rest.trim().to_string());
                current = Some(field);
                break;
            }
        }
    }

    headers.block = HeaderBlock::parse(&header_lines.join("\n"));
    headers
}

impl TopHeaders {
    fn slot(&mut self, field: Field) -> &mut Option<String> {
        match field {
            Field::From => &mut self.from,
            Field::To => &mut self.to,
            Field::Subject => &mut self.subject,
            Field::Date => &mut self.date,
        }
    }
}

/// Unfolded header fields of one message or MIME part.
///
/// Names are stored lowercased; lookups are case-insensitive.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct HeaderBlock {
    fields: Vec<(String, String)>,
}

impl HeaderBlock {
    pub fn parse(block: &str) -> Self {
        let mut fields: Vec<(String, String)> = Vec::new();

        for line in block.lines() {
            if line.trim().is_empty() {
                continue;
            }
            if line.starts_with(' ') || line.starts_with('\t') {
                if let Some((_, value)) = fields.last_mut() {
                    value.push(' ');
                    value.push_str(line.trim());
                }
                continue;
            }
            if let Some((name, value)) = line.split_once(':') {
                fields.push((name.trim().to_ascii_lowercase(), value.trim().to_string()));
            }
        }

        Self { fields }
    }

    /// First value of `name`, if present.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    pub fn has(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /// Declared MIME type (`type/subtype`, lowercased, parameters removed).
    pub fn content_type(&self) -> Option<String> {
        self.get("content-type")
            .map(|v| v.split(';').next().unwrap_or("").trim().to_ascii_lowercase())
            .filter(|v| !v.is_empty())
    }

    /// Declared MIME type with its original casing, parameters removed.
    pub fn raw_content_type(&self) -> Option<String> {
        self.get("content-type")
            .map(|v| v.split(';').next().unwrap_or("").trim().to_string())
            .filter(|v| !v.is_empty())
    }

    /// A parameter of the `Content-Type` header (e.g. `charset`, `boundary`).
    pub fn content_type_param(&self, param: &str) -> Option<String> {
        self.get("content-type").and_then(|v| find_param(v, param))
    }

    /// Transfer encoding, `7bit` when the header is absent.
    pub fn transfer_encoding(&self) -> TransferEncoding {
        TransferEncoding::parse(self.get("content-transfer-encoding").unwrap_or(""))
    }

    /// `Content-Disposition: attachment`.
    pub fn is_attachment(&self) -> bool {
        self.get("content-disposition")
            .map(|v| v.trim_start().to_ascii_lowercase().starts_with("attachment"))
            .unwrap_or(false)
    }

    /// The verbatim `filename=` parameter from any header of the block.
    ///
    /// Encoded-word and RFC 2231 forms are not decoded.
    pub fn filename(&self) -> Option<String> {
        self.fields.iter().find_map(|(_, v)| find_param(v, "filename"))
    }
}

/// Find `name=value` in a header-ish string (case-insensitive name).
///
/// The value ends at `;`, CR or LF, or at the closing quote when quoted.
/// Quotes are removed and the result trimmed. Empty values yield `None`.
pub fn find_param(text: &str, name: &str) -> Option<String> {
    let lower = text.to_ascii_lowercase();
    let needle = format!("{}=", name.to_ascii_lowercase());

    for (idx, _) in lower.match_indices(&needle) {
        let preceded_by_word = text[..idx]
            .chars()
            .next_back()
            .is_some_and(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_' || c == '*');
        if preceded_by_word {
            continue;
        }

        let rest = text[idx + needle.len()..].trim_start();
        let value = if let Some(quoted) = rest.strip_prefix('"') {
            quoted.split('"').next().unwrap_or("")
        } else {
            rest.split([';', '\r', '\n']).next().unwrap_or("")
        };
        let value = value.replace('"', "").trim().to_string();
        if !value.is_empty() {
            return Some(value);
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_top_headers_basic() {
        let lines = vec![
            "From: Alice <alice@example.com>",
            "To: bob@example.com, carol@example.com",
            "Subject: Quarterly numbers",
            "Date: Mon, 01 Jan 2024 10:00:00 +0000",
            "X-Mailer: something",
            "",
            "Body line",
        ];
        let h = parse_top_headers(&lines);
        assert_eq!(h.from.as_deref(), Some("Alice <alice@example.com>"));
        assert_eq!(h.to.as_deref(), Some("bob@example.com, carol@example.com"));
        assert_eq!(h.subject.as_deref(), Some("Quarterly numbers"));
        assert_eq!(h.date.as_deref(), Some("Mon, 01 Jan 2024 10:00:00 +0000"));
        assert_eq!(h.body_start, 6);
        assert_eq!(h.block.get("x-mailer"), Some("something"));
    }

    #[test]
    fn test_top_headers_prefix_is_case_sensitive() {
        let lines = vec!["subject: lower", "FROM: upper", "", "x"];
        let h = parse_top_headers(&lines);
        assert_eq!(h.subject, None);
        assert_eq!(h.from, None);
    }

    #[test]
    fn test_top_headers_folded_recipients() {
        let lines = vec!["To: a@example.com,\r", "\tb@example.com\r", "\r", "body"];
        let h = parse_top_headers(&lines);
        assert_eq!(h.to.as_deref(), Some("a@example.com, b@example.com"));
        assert_eq!(h.body_start, 3);
    }

    #[test]
    fn test_no_blank_line_means_body_from_top() {
        let lines = vec!["From: a@b.com", "just text"];
        let h = parse_top_headers(&lines);
        assert_eq!(h.body_start, 0);
    }

    #[test]
    fn test_header_block_lookup() {
        let block = HeaderBlock::parse(
            "\r\nContent-Type: text/plain;\r\n charset=\"ISO-8859-1\"\r\nContent-Transfer-Encoding: Quoted-Printable",
        );
        assert_eq!(block.content_type().as_deref(), Some("text/plain"));
        assert_eq!(block.content_type_param("charset").as_deref(), Some("ISO-8859-1"));
        assert_eq!(block.transfer_encoding(), TransferEncoding::QuotedPrintable);
        assert!(!block.is_attachment());
    }

    #[test]
    fn test_header_block_attachment() {
        let block = HeaderBlock::parse(
            "Content-Type: application/pdf; name=\"r.pdf\"\nContent-Disposition: attachment; filename=\"Q1 report.pdf\"",
        );
        assert!(block.is_attachment());
        assert_eq!(block.filename().as_deref(), Some("Q1 report.pdf"));
        assert_eq!(block.raw_content_type().as_deref(), Some("application/pdf"));
    }

    #[test]
    fn test_find_param_variants() {
        assert_eq!(
            find_param("multipart/mixed; boundary=\"abc;def\"", "boundary").as_deref(),
            Some("abc;def")
        );
        assert_eq!(
            find_param("multipart/mixed; BOUNDARY=simple; x=y", "boundary").as_deref(),
            Some("simple")
        );
        // `name=` must not match inside `filename=`
        assert_eq!(find_param("attachment; filename=a.pdf", "name"), None);
        assert_eq!(find_param("attachment", "filename"), None);
    }
}
