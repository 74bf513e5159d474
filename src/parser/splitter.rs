//! Multipart splitting on a boundary token.
//!
//! The splitter does not interpret parts; it only cuts the text and locates
//! the header/body separator on request.

use crate::error::{EmlError, Result};
use crate::parser::header::find_param;

/// Which blank-line conventions count as the header/body separator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Separator {
    /// `\r\n\r\n`, then `\n\n` as a fallback.
    CrlfOrLf,
    /// `\r\n\r\n` only.
    CrlfOnly,
}

/// One raw fragment between two boundary delimiters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MimePart<'a> {
    /// Order of appearance among the returned fragments (0-based).
    pub position: usize,
    /// Text between the delimiters, starting with the rest of the boundary line.
    pub raw: &'a str,
}

impl<'a> MimePart<'a> {
    /// Split the fragment into `(header block, body block)`.
    ///
    /// Fails with `StructuralParse` when no separator of the given kind exists.
    pub fn sections(&self, separator: Separator) -> Result<(&'a str, &'a str)> {
        if let Some(idx) = self.raw.find("\r\n\r\n") {
            return Ok((&self.raw[..idx], &self.raw[idx + 4..]));
        }
        if separator == Separator::CrlfOrLf {
            if let Some(idx) = self.raw.find("\n\n") {
                return Ok((&self.raw[..idx], &self.raw[idx + 2..]));
            }
        }
        Err(EmlError::StructuralParse(format!(
            "part {} has no header/body separator",
            self.position
        )))
    }
}

/// Locate the first `boundary=` parameter in `text` (optionally quoted).
pub fn find_boundary(text: &str) -> Option<String> {
    find_param(text, "boundary")
}

/// Split `text` on `--<boundary>` and return the non-empty fragments in order.
///
/// The closing fragment (the one following `--<boundary>--`) is excluded.
pub fn split_parts<'a>(text: &'a str, boundary: &str) -> Vec<MimePart<'a>> {
    let delimiter = format!("--{boundary}");

    text.split(delimiter.as_str())
        .filter(|raw| !raw.trim().is_empty() && !raw.starts_with("--"))
        .enumerate()
        .map(|(position, raw)| MimePart { position, raw })
        .collect()
}

/// Boundary discovery plus splitting.
///
/// `StructuralParse` signals "not multipart" so the caller can take its
/// fallback path.
pub fn split_multipart(text: &str) -> Result<(String, Vec<MimePart<'_>>)> {
    let boundary = find_boundary(text)
        .ok_or_else(|| EmlError::StructuralParse("no boundary parameter found".into()))?;
    let parts = split_parts(text, &boundary);
    Ok((boundary, parts))
}
