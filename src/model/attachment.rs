//! Attachment entity.
//!
//! The payload is kept in its transfer representation (base64 text or raw
//! text) and decoded only when a consumer asks for the bytes.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::parser::codec;

/// Broad file category derived from the filename extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AttachmentKind {
    Image,
    Pdf,
    Document,
    Spreadsheet,
    Archive,
    File,
}

impl AttachmentKind {
    /// Classify a filename by its extension (case-insensitive).
    ///
    /// A name without an extension, or with an unknown one, is a plain `File`.
    pub fn from_filename(name: &str) -> Self {
        let Some((_, ext)) = name.rsplit_once('.') else {
            return Self::File;
        };
        match ext.trim().to_ascii_lowercase().as_str() {
            "jpg" | "jpeg" | "png" | "gif" | "bmp" | "svg" | "webp" => Self::Image,
            "pdf" => Self::Pdf,
            "doc" | "docx" | "txt" | "rtf" => Self::Document,
            "xls" | "xlsx" | "csv" => Self::Spreadsheet,
            "zip" | "rar" | "7z" | "tar" | "gz" => Self::Archive,
            _ => Self::File,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Image => "image",
            Self::Pdf => "pdf",
            Self::Document => "document",
            Self::Spreadsheet => "spreadsheet",
            Self::Archive => "archive",
            Self::File => "file",
        }
    }
}

impl fmt::Display for AttachmentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Declared `Content-Transfer-Encoding` of an attachment part.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TransferEncoding {
    Base64,
    QuotedPrintable,
    #[serde(rename = "7bit")]
    SevenBit,
    Other(String),
}

impl TransferEncoding {
    /// Parse a header value; an empty value means `7bit`.
    pub fn parse(value: &str) -> Self {
        let value = value.trim().to_ascii_lowercase();
        match value.as_str() {
            "base64" => Self::Base64,
            "quoted-printable" => Self::QuotedPrintable,
            "" | "7bit" => Self::SevenBit,
            _ => Self::Other(value),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::Base64 => "base64",
            Self::QuotedPrintable => "quoted-printable",
            Self::SevenBit => "7bit",
            Self::Other(s) => s,
        }
    }
}

/// Size shown for an attachment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "bytes", rename_all = "lowercase")]
pub enum AttachmentSize {
    /// Decoded size approximated from the base64 payload length.
    Estimated(u64),
    /// Exact decoded size (known when raw bytes were available).
    Exact(u64),
    /// Not computed for non-base64 payloads.
    Unknown,
}

impl AttachmentSize {
    pub fn bytes(self) -> Option<u64> {
        match self {
            Self::Estimated(n) | Self::Exact(n) => Some(n),
            Self::Unknown => None,
        }
    }
}

impl fmt::Display for AttachmentSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.bytes() {
            Some(n) => f.write_str(&format_size(n)),
            None => f.write_str("Unknown"),
        }
    }
}

/// Render a byte count as `B`, `KB` or `MB` with 1024 scaling.
///
/// Kilobytes and megabytes carry two decimal places.
pub fn format_size(bytes: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = 1024 * 1024;
    if bytes < KB {
        format!("{bytes} B")
    } else if bytes < MB {
        format!("{:.2} KB", bytes as f64 / KB as f64)
    } else {
        format!("{:.2} MB", bytes as f64 / MB as f64)
    }
}

/// One file attached to a message.
///
/// `name` is the verbatim `filename=` value. It is NOT sanitized and must not
/// be used as a filesystem path as-is.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Attachment {
    pub name: String,
    pub size: AttachmentSize,
    pub kind: AttachmentKind,
    /// Declared content type, `application/octet-stream` when absent.
    pub mime_type: String,
    pub transfer_encoding: TransferEncoding,
    /// Base64 text or raw text, depending on `transfer_encoding`.
    pub payload: String,
}

impl Attachment {
    pub fn is_pdf(&self) -> bool {
        self.kind == AttachmentKind::Pdf
    }

    /// Decode the payload into raw bytes according to its transfer encoding.
    pub fn decode_payload(&self) -> Result<Vec<u8>> {
        match self.transfer_encoding {
            TransferEncoding::Base64 => codec::decode_base64(&self.payload),
            TransferEncoding::QuotedPrintable => {
                Ok(codec::decode_quoted_printable(&self.payload))
            }
            _ => Ok(self.payload.as_bytes().to_vec()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_from_extension() {
        assert_eq!(AttachmentKind::from_filename("report.PDF"), AttachmentKind::Pdf);
        assert_eq!(AttachmentKind::from_filename("photo.jpeg"), AttachmentKind::Image);
        assert_eq!(AttachmentKind::from_filename("notes.txt"), AttachmentKind::Document);
        assert_eq!(AttachmentKind::from_filename("data.csv"), AttachmentKind::Spreadsheet);
        assert_eq!(AttachmentKind::from_filename("bundle.tar.gz"), AttachmentKind::Archive);
        assert_eq!(AttachmentKind::from_filename("binary.exe"), AttachmentKind::File);
        assert_eq!(AttachmentKind::from_filename("pdf"), AttachmentKind::File);
        assert_eq!(AttachmentKind::from_filename(""), AttachmentKind::File);
    }

    #[test]
    fn test_transfer_encoding_parse() {
        assert_eq!(TransferEncoding::parse(" Base64 "), TransferEncoding::Base64);
        assert_eq!(
            TransferEncoding::parse("quoted-printable"),
            TransferEncoding::QuotedPrintable
        );
        assert_eq!(TransferEncoding::parse(""), TransferEncoding::SevenBit);
        assert_eq!(
            TransferEncoding::parse("8bit"),
            TransferEncoding::Other("8bit".to_string())
        );
    }

    #[test]
    fn test_format_size() {
        assert_eq!(format_size(0), "0 B");
        assert_eq!(format_size(1023), "1023 B");
        assert_eq!(format_size(1024), "1.00 KB");
        assert_eq!(format_size(1536), "1.50 KB");
        assert_eq!(format_size(1024 * 1024), "1.00 MB");
        assert_eq!(AttachmentSize::Unknown.to_string(), "Unknown");
    }

    #[test]
    fn test_decode_payload_base64() {
        let att = Attachment {
            name: "a.txt".into(),
            size: AttachmentSize::Estimated(5),
            kind: AttachmentKind::Document,
            mime_type: "text/plain".into(),
            transfer_encoding: TransferEncoding::Base64,
            payload: "aGVs\r\nbG8=".into(),
        };
        assert_eq!(att.decode_payload().unwrap(), b"hello");
    }
}
