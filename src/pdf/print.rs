//! Hand a merged PDF to a native print flow.
//!
//! There is no reliable signal for a cancelled print dialog, so the flow is
//! bounded by a ceiling and every ending is reported as a [`PrintOutcome`].

use std::io::Write;
use std::process::Command;
use std::sync::mpsc::{self, RecvTimeoutError};
use std::path::PathBuf;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use tempfile::TempPath;
use tracing::{debug, info, warn};

use crate::config::PrintConfig;
use crate::error::{EmlError, Result};

/// A native print capability. `print` blocks until the flow is over.
pub trait PrintFlow: Send + Sync {
    fn print(&self, pdf: &[u8]) -> Result<()>;
}

/// How a print request ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PrintOutcome {
    Completed,
    Failed(String),
    /// The ceiling elapsed first; the flow may still be running.
    TimedOut,
}

/// Run `flow` on a worker thread and wait at most `ceiling` for it.
pub fn print_pdf(pdf: Vec<u8>, flow: Arc<dyn PrintFlow>, ceiling: Duration) -> PrintOutcome {
    let (tx, rx) = mpsc::channel();
    let size = pdf.len();

    let spawned = std::thread::Builder::new()
        .name("print-flow".into())
        .spawn(move || {
            let _ = tx.send(flow.print(&pdf));
        });
    if let Err(e) = spawned {
        warn!(error = %e, "Could not start print flow");
        return PrintOutcome::Failed(e.to_string());
    }

    let outcome = match rx.recv_timeout(ceiling) {
        Ok(Ok(())) => PrintOutcome::Completed,
        Ok(Err(e)) => PrintOutcome::Failed(e.to_string()),
        Err(RecvTimeoutError::Timeout) => PrintOutcome::TimedOut,
        Err(RecvTimeoutError::Disconnected) => {
            PrintOutcome::Failed("print flow stopped unexpectedly".into())
        }
    };
    info!(size, outcome = ?outcome, "Print flow finished");
    outcome
}

/// Prints by spooling the PDF to a temp file and running a command on it.
///
/// Spool files of commands that are still running when the caller gives up
/// are tracked; [`CommandPrinter::discard_spools`] removes them.
#[derive(Debug)]
pub struct CommandPrinter {
    pub program: String,
    pub args: Vec<String>,
    spool_dir: Option<PathBuf>,
    pending: Mutex<Vec<PathBuf>>,
}

impl CommandPrinter {
    pub fn new(program: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
            spool_dir: None,
            pending: Mutex::new(Vec::new()),
        }
    }

    pub fn from_config(config: &PrintConfig) -> Self {
        Self::new(config.command.clone(), config.args.clone())
    }

    /// Spool into `dir` instead of the system temp directory.
    pub fn with_spool_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.spool_dir = Some(dir.into());
        self
    }

    /// Remove spool files whose print command has not returned yet.
    pub fn discard_spools(&self) {
        let paths = std::mem::take(&mut *self.pending_paths());
        for path in paths {
            match std::fs::remove_file(&path) {
                Ok(()) => debug!(path = %path.display(), "Removed pending spool file"),
                Err(e) => debug!(path = %path.display(), error = %e, "Spool file already gone"),
            }
        }
    }

    fn pending_paths(&self) -> MutexGuard<'_, Vec<PathBuf>> {
        self.pending.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn spool(&self, pdf: &[u8]) -> Result<TempPath> {
        let dir = self.spool_dir.clone().unwrap_or_else(std::env::temp_dir);
        let mut spool = tempfile::Builder::new()
            .prefix("emlkit-print-")
            .suffix(".pdf")
            .tempfile_in(&dir)
            .map_err(|e| EmlError::io(&dir, e))?;
        spool.write_all(pdf).map_err(|e| EmlError::io(spool.path(), e))?;
        spool.flush().map_err(|e| EmlError::io(spool.path(), e))?;
        Ok(spool.into_temp_path())
    }
}

impl PrintFlow for CommandPrinter {
    fn print(&self, pdf: &[u8]) -> Result<()> {
        let spool = self.spool(pdf)?;
        self.pending_paths().push(spool.to_path_buf());

        let status = Command::new(&self.program)
            .args(&self.args)
            .arg(&*spool)
            .status();
        self.pending_paths().retain(|p| p.as_path() != &*spool);

        let status =
            status.map_err(|e| EmlError::Print(format!("cannot run '{}': {e}", self.program)))?;
        if status.success() {
            Ok(())
        } else {
            Err(EmlError::Print(format!("'{}' exited with {status}", self.program)))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingFlow(AtomicUsize);

    impl PrintFlow for CountingFlow {
        fn print(&self, pdf: &[u8]) -> Result<()> {
            self.0.fetch_add(pdf.len(), Ordering::SeqCst);
            Ok(())
        }
    }

    struct FailingFlow;

    impl PrintFlow for FailingFlow {
        fn print(&self, _pdf: &[u8]) -> Result<()> {
            Err(EmlError::Print("printer on fire".into()))
        }
    }

    struct HangingFlow;

    impl PrintFlow for HangingFlow {
        fn print(&self, _pdf: &[u8]) -> Result<()> {
            std::thread::sleep(Duration::from_millis(500));
            Ok(())
        }
    }

    #[test]
    fn test_completed() {
        let flow = Arc::new(CountingFlow(AtomicUsize::new(0)));
        let outcome = print_pdf(vec![0u8; 7], flow.clone(), Duration::from_secs(5));
        assert_eq!(outcome, PrintOutcome::Completed);
        assert_eq!(flow.0.load(Ordering::SeqCst), 7);
    }

    #[test]
    fn test_failure_is_an_outcome() {
        let outcome = print_pdf(vec![1], Arc::new(FailingFlow), Duration::from_secs(5));
        assert!(matches!(outcome, PrintOutcome::Failed(msg) if msg.contains("printer on fire")));
    }

    #[test]
    fn test_timeout() {
        let outcome = print_pdf(vec![1], Arc::new(HangingFlow), Duration::from_millis(20));
        assert_eq!(outcome, PrintOutcome::TimedOut);
    }

    #[cfg(unix)]
    #[test]
    fn test_command_printer_exit_status() {
        assert!(CommandPrinter::new("true", Vec::new()).print(b"%PDF").is_ok());
        let err = CommandPrinter::new("false", Vec::new()).print(b"%PDF").unwrap_err();
        assert!(matches!(err, EmlError::Print(_)));
    }

    #[test]
    fn test_spool_dir_error_names_the_directory() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("absent");
        let printer = CommandPrinter::new("true", Vec::new()).with_spool_dir(&missing);
        match printer.print(b"%PDF") {
            Err(EmlError::Io { path, .. }) => assert_eq!(path, missing),
            other => panic!("expected Io error, got {other:?}"),
        }
    }

    #[cfg(unix)]
    #[test]
    fn test_spool_removed_after_command() {
        let dir = tempfile::tempdir().unwrap();
        let printer = CommandPrinter::new("true", Vec::new()).with_spool_dir(dir.path());
        printer.print(b"%PDF").unwrap();
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
        assert!(printer.pending_paths().is_empty());
    }

    #[cfg(unix)]
    #[test]
    fn test_discard_spools_after_timeout() {
        let dir = tempfile::tempdir().unwrap();
        let printer = Arc::new(
            CommandPrinter::new("sh", vec!["-c".into(), "sleep 2".into()])
                .with_spool_dir(dir.path()),
        );
        let outcome = print_pdf(b"%PDF".to_vec(), printer.clone(), Duration::from_millis(300));
        assert_eq!(outcome, PrintOutcome::TimedOut);
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 1);

        printer.discard_spools();
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
        assert!(printer.pending_paths().is_empty());
    }

    #[test]
    fn test_missing_program() {
        let printer = CommandPrinter::new("emlkit-no-such-printer", Vec::new());
        assert!(matches!(printer.print(b"%PDF"), Err(EmlError::Print(_))));
    }
}
