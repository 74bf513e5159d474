//! Batch import of input files into messages.
//!
//! Duplicate detection lives in an explicit [`ImportSession`] owned by the
//! caller, so several batches can share it without any global state.

use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};

use rayon::prelude::*;
use tracing::{info, warn};

use crate::error::EmlError;
use crate::model::message::Message;
use crate::model::source::{FileKind, InputFile};
use crate::parser::MessageDecoder;

/// Files already imported, keyed on (file name, size), plus the id counter.
#[derive(Debug, Default)]
pub struct ImportSession {
    seen: HashSet<(String, u64)>,
    next_id: u64,
}

impl ImportSession {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_duplicate(&self, name: &str, size: u64) -> bool {
        self.seen.contains(&(name.to_string(), size))
    }

    /// Record a file; returns `false` if it was already known.
    pub fn register(&mut self, name: &str, size: u64) -> bool {
        self.seen.insert((name.to_string(), size))
    }

    /// Drop a file from the session so it can be imported again.
    pub fn forget(&mut self, name: &str, size: u64) {
        self.seen.remove(&(name.to_string(), size));
    }

    pub fn clear(&mut self) {
        self.seen.clear();
    }

    /// Number of files currently registered.
    pub fn len(&self) -> usize {
        self.seen.len()
    }

    pub fn is_empty(&self) -> bool {
        self.seen.is_empty()
    }

    fn assign_id(&mut self) -> u64 {
        self.next_id += 1;
        self.next_id
    }
}

/// Options for one import batch.
#[derive(Debug, Clone, Copy, Default)]
pub struct ImportOptions {
    /// Keep only PDF attachments on the imported messages.
    pub pdf_only: bool,
}

/// A file that could not be decoded.
#[derive(Debug)]
pub struct ImportFailure {
    pub file_name: String,
    pub error: EmlError,
}

/// Outcome of one batch, in input order.
#[derive(Debug, Default)]
pub struct ImportReport {
    pub messages: Vec<Message>,
    pub failures: Vec<ImportFailure>,
    /// Files skipped because the session already held them.
    pub duplicates: Vec<String>,
    /// Files skipped because their extension is not supported.
    pub skipped: Vec<String>,
}

impl ImportReport {
    pub fn attachment_count(&self) -> usize {
        self.messages.iter().map(|m| m.attachments.len()).sum()
    }
}

/// Decode a batch of files.
///
/// Files are decoded in parallel; messages come back in input order. A
/// failing file never aborts the batch and is removed from the session
/// again so a corrected copy can be retried.
///
/// The progress callback receives `(decoded_so_far, total_to_decode)`.
pub fn import_batch(
    session: &mut ImportSession,
    decoder: &MessageDecoder,
    files: Vec<InputFile>,
    options: &ImportOptions,
    progress: Option<&(dyn Fn(usize, usize) + Sync)>,
) -> ImportReport {
    let mut report = ImportReport::default();
    let mut pending = Vec::with_capacity(files.len());

    for file in files {
        if let FileKind::Unsupported(ext) = file.kind() {
            warn!(file = %file.name, ext = %ext, "Skipping unsupported file");
            report.skipped.push(file.name);
            continue;
        }
        if !session.register(&file.name, file.size()) {
            info!(file = %file.name, "Skipping duplicate file");
            report.duplicates.push(file.name);
            continue;
        }
        pending.push(file);
    }

    let total = pending.len();
    let done = AtomicUsize::new(0);

    let results: Vec<_> = pending
        .into_par_iter()
        .map(|file| {
            let result = decoder.decode(&file);
            let current = done.fetch_add(1, Ordering::Relaxed) + 1;
            if let Some(cb) = progress {
                cb(current, total);
            }
            (file.name, file.bytes.len() as u64, result)
        })
        .collect();

    for (name, size, result) in results {
        match result {
            Ok(mut message) => {
                message.id = Some(session.assign_id());
                if options.pdf_only {
                    message.attachments.retain(|a| a.is_pdf());
                }
                report.messages.push(message);
            }
            Err(error) => {
                warn!(file = %name, error = %error, "Failed to decode file");
                session.forget(&name, size);
                report.failures.push(ImportFailure {
                    file_name: name,
                    error,
                });
            }
        }
    }

    info!(
        imported = report.messages.len(),
        failed = report.failures.len(),
        duplicates = report.duplicates.len(),
        skipped = report.skipped.len(),
        "Import batch finished"
    );

    report
}

#[cfg(test)]
mod tests {
    use super::*;

    fn eml(name: &str, subject: &str) -> InputFile {
        InputFile::new(name, format!("Subject: {subject}\r\n\r\nHello\r\n").into_bytes())
    }

    #[test]
    fn test_session_register_and_forget() {
        let mut session = ImportSession::new();
        assert!(session.register("a.eml", 10));
        assert!(!session.register("a.eml", 10));
        assert!(session.register("a.eml", 11));
        assert!(session.is_duplicate("a.eml", 10));
        session.forget("a.eml", 10);
        assert!(!session.is_duplicate("a.eml", 10));
        assert_eq!(session.len(), 1);
        session.clear();
        assert!(session.is_empty());
    }

    #[test]
    fn test_batch_order_and_ids() {
        let mut session = ImportSession::new();
        let files = vec![eml("1.eml", "one"), eml("2.eml", "two"), eml("3.eml", "three")];
        let report = import_batch(
            &mut session,
            &MessageDecoder::default(),
            files,
            &ImportOptions::default(),
            None,
        );
        let subjects: Vec<_> = report.messages.iter().map(|m| m.subject.as_str()).collect();
        assert_eq!(subjects, ["one", "two", "three"]);
        let ids: Vec<_> = report.messages.iter().map(|m| m.id).collect();
        assert_eq!(ids, [Some(1), Some(2), Some(3)]);
    }

    #[test]
    fn test_duplicates_across_batches() {
        let mut session = ImportSession::new();
        let decoder = MessageDecoder::default();
        let options = ImportOptions::default();

        let first = import_batch(&mut session, &decoder, vec![eml("a.eml", "x")], &options, None);
        assert_eq!(first.messages.len(), 1);

        let second = import_batch(
            &mut session,
            &decoder,
            vec![eml("a.eml", "x"), eml("b.eml", "y"), eml("b.eml", "y")],
            &options,
            None,
        );
        assert_eq!(second.messages.len(), 1);
        assert_eq!(second.duplicates, ["a.eml", "b.eml"]);
        assert_eq!(second.messages[0].id, Some(2));
    }

    #[test]
    fn test_unsupported_is_skipped() {
        let mut session = ImportSession::new();
        let report = import_batch(
            &mut session,
            &MessageDecoder::default(),
            vec![InputFile::new("photo.jpg", vec![1, 2, 3]), eml("m.eml", "ok")],
            &ImportOptions::default(),
            None,
        );
        assert_eq!(report.skipped, ["photo.jpg"]);
        assert_eq!(report.messages.len(), 1);
        assert_eq!(session.len(), 1);
    }

    #[test]
    fn test_progress_reaches_total() {
        let mut session = ImportSession::new();
        let seen = AtomicUsize::new(0);
        let cb = |current: usize, total: usize| {
            assert!(current <= total);
            seen.fetch_max(current, Ordering::Relaxed);
        };
        import_batch(
            &mut session,
            &MessageDecoder::default(),
            vec![eml("a.eml", "a"), eml("b.eml", "b")],
            &ImportOptions::default(),
            Some(&cb),
        );
        assert_eq!(seen.load(Ordering::Relaxed), 2);
    }
}
