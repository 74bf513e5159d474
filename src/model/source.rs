//! Input files and their format discriminant.

use std::path::Path;

use crate::error::{EmlError, Result};

/// Container format of an input file, resolved once from its name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FileKind {
    /// RFC 5322 / MIME text message (`.eml`).
    Eml,
    /// Outlook compound-file message (`.msg`).
    Legacy,
    /// Anything else; carries the lowercased extension (may be empty).
    Unsupported(String),
}

impl FileKind {
    pub fn from_name(name: &str) -> Self {
        let ext = name
            .rsplit_once('.')
            .map(|(_, ext)| ext.to_ascii_lowercase())
            .unwrap_or_default();
        match ext.as_str() {
            "eml" => Self::Eml,
            "msg" => Self::Legacy,
            _ => Self::Unsupported(ext),
        }
    }
}

/// Raw bytes of one input file together with its name.
#[derive(Debug, Clone)]
pub struct InputFile {
    pub name: String,
    pub bytes: Vec<u8>,
}

impl InputFile {
    pub fn new(name: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            bytes,
        }
    }

    /// Read a file from disk, keeping only its file name.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let bytes = std::fs::read(path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                EmlError::FileNotFound(path.to_path_buf())
            } else {
                EmlError::io(path, e)
            }
        })?;
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| path.to_string_lossy().to_string());
        Ok(Self { name, bytes })
    }

    pub fn kind(&self) -> FileKind {
        FileKind::from_name(&self.name)
    }

    pub fn size(&self) -> u64 {
        self.bytes.len() as u64
    }
}
