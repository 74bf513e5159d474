//! Centralized error types for emlkit.

use std::path::PathBuf;
use thiserror::Error;

/// All errors produced by the emlkit library.
#[derive(Error, Debug)]
pub enum EmlError {
    /// I/O error with the associated file path.
    #[error("I/O error reading '{path}': {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    /// The specified file does not exist.
    #[error("File not found: {0}")]
    FileNotFound(PathBuf),

    /// A base64 or quoted-printable unit could not be decoded.
    ///
    /// Recovered locally: the offending unit is skipped.
    #[error("Decoding error: {0}")]
    Decode(String),

    /// No boundary or no header/body separator was found.
    ///
    /// Never surfaced to callers; it selects a fallback path.
    #[error("Structural parse error: {0}")]
    StructuralParse(String),

    /// The legacy container could not be opened.
    #[error("Unsupported format: {0}")]
    UnsupportedFormat(String),

    /// The file extension is neither `.eml` nor `.msg`.
    #[error("Unsupported file type: {0}")]
    UnsupportedFile(String),

    /// An attachment is not a structurally valid PDF.
    #[error("Cannot load PDF '{name}': {reason}")]
    PdfLoad { name: String, reason: String },

    /// No pages were collected across all merge inputs.
    #[error("Nothing to merge: no valid PDF pages found")]
    MergeEmpty,

    /// The merged document could not be serialized.
    #[error("Failed to write merged PDF: {0}")]
    PdfWrite(String),

    /// The print command could not be run or reported failure.
    #[error("Print error: {0}")]
    Print(String),

    /// Decoding a single `.eml` file failed.
    #[error("Failed to decode '{name}': {reason}")]
    FileDecode { name: String, reason: String },

    /// An export operation failed.
    #[error("Export error: {0}")]
    Export(String),
}

/// Convenience alias for `Result<T, EmlError>`.
pub type Result<T> = std::result::Result<T, EmlError>;

impl EmlError {
    /// Create an `Io` variant from a path and an `io::Error`.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

/// Allow `?` on `std::io::Error` when no path context is available
/// (prefer `EmlError::io`).
impl From<std::io::Error> for EmlError {
    fn from(source: std::io::Error) -> Self {
        Self::Io {
            path: PathBuf::from("<unknown>"),
            source,
        }
    }
}
