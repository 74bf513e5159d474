//! Handing bytes to a download target.

use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::error::{EmlError, Result};
use crate::model::attachment::Attachment;

/// A place that accepts `(bytes, suggested name, mime type)`.
pub trait DownloadSink {
    /// Store `bytes` and return where they ended up.
    fn emit(&mut self, bytes: &[u8], suggested_name: &str, mime_type: &str) -> Result<PathBuf>;
}

/// Writes each download as a file in one directory, never overwriting.
#[derive(Debug, Clone)]
pub struct DirectorySink {
    dir: PathBuf,
}

impl DirectorySink {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

impl DownloadSink for DirectorySink {
    fn emit(&mut self, bytes: &[u8], suggested_name: &str, mime_type: &str) -> Result<PathBuf> {
        if self.dir.exists() && !self.dir.is_dir() {
            return Err(EmlError::Export(format!(
                "'{}' is not a directory",
                self.dir.display()
            )));
        }
        std::fs::create_dir_all(&self.dir).map_err(|e| EmlError::io(&self.dir, e))?;

        let filename = sanitize_filename_part(suggested_name, 150);
        let path = unique_path(&self.dir.join(filename));
        std::fs::write(&path, bytes).map_err(|e| EmlError::io(&path, e))?;

        debug!(path = %path.display(), mime_type, size = bytes.len(), "Saved download");
        Ok(path)
    }
}

/// Outcome of saving several attachments.
#[derive(Debug, Default)]
pub struct SaveReport {
    pub saved: Vec<PathBuf>,
    pub failed: Vec<(String, EmlError)>,
}

/// Decode an attachment and emit it under its own name.
pub fn save_attachment(sink: &mut dyn DownloadSink, attachment: &Attachment) -> Result<PathBuf> {
    let bytes = attachment.decode_payload()?;
    sink.emit(&bytes, &attachment.name, &attachment.mime_type)
}

/// Save several attachments; one failure does not stop the others.
pub fn save_attachments<'a>(
    sink: &mut dyn DownloadSink,
    attachments: impl IntoIterator<Item = &'a Attachment>,
) -> SaveReport {
    let mut report = SaveReport::default();
    for attachment in attachments {
        match save_attachment(sink, attachment) {
            Ok(path) => report.saved.push(path),
            Err(e) => {
                warn!(filename = %attachment.name, error = %e, "Failed to save attachment");
                report.failed.push((attachment.name.clone(), e));
            }
        }
    }
    report
}

/// Emit a merged PDF as `<prefix>_<unix-millis>.pdf`.
pub fn save_merged(sink: &mut dyn DownloadSink, pdf: &[u8], prefix: &str) -> Result<PathBuf> {
    sink.emit(pdf, &merged_file_name(prefix), "application/pdf")
}

/// Suggested name for a merged document.
pub fn merged_file_name(prefix: &str) -> String {
    format!("{prefix}_{}.pdf", chrono::Utc::now().timestamp_millis())
}

/// Make a string safe for use as a file name.
///
/// Characters outside `[A-Za-z0-9._@-]` become `_`, leading dots are
/// dropped, and the result is cut to `max_len` characters.
pub fn sanitize_filename_part(s: &str, max_len: usize) -> String {
    let sanitized: String = s
        .chars()
        .map(|c| {
            if c.is_alphanumeric() || c == '-' || c == '.' || c == '_' || c == '@' {
                c
            } else {
                '_'
            }
        })
        .skip_while(|&c| c == '.')
        .take(max_len)
        .collect();

    if sanitized.is_empty() {
        "unknown".to_string()
    } else {
        sanitized
    }
}

/// If `path` already exists, append a counter to make it unique.
pub fn unique_path(path: &Path) -> PathBuf {
    if !path.exists() {
        return path.to_path_buf();
    }

    let stem = path.file_stem().and_then(|s| s.to_str()).unwrap_or("file");
    let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("");
    let parent = path.parent().unwrap_or(Path::new("."));

    for i in 1..1000 {
        let candidate = if ext.is_empty() {
            parent.join(format!("{stem}_{i}"))
        } else {
            parent.join(format!("{stem}_{i}.{ext}"))
        };
        if !candidate.exists() {
            return candidate;
        }
    }

    parent.join(format!(
        "{stem}_{}.{ext}",
        chrono::Utc::now().timestamp_millis()
    ))
}
