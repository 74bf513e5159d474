//! Message decoding: EML MIME parsing, legacy `.msg` containers, and the
//! text codecs they share.

pub mod attachment;
pub mod body;
pub mod codec;
pub mod eml;
pub mod header;
pub mod legacy;
pub mod splitter;

use std::sync::Arc;
use std::time::Duration;

use crate::config::Config;
use crate::error::{EmlError, Result};
use crate::model::message::Message;
use crate::model::source::{FileKind, InputFile};

use self::legacy::LegacyReader;

/// Default ceiling for opening a legacy container.
pub const DEFAULT_LEGACY_TIMEOUT: Duration = Duration::from_secs(10);

/// Dispatches an input file to the decoder for its [`FileKind`].
#[derive(Clone)]
pub struct MessageDecoder {
    legacy_reader: Arc<dyn LegacyReader>,
    legacy_timeout: Duration,
}

impl MessageDecoder {
    pub fn new(legacy_reader: Arc<dyn LegacyReader>, legacy_timeout: Duration) -> Self {
        Self {
            legacy_reader,
            legacy_timeout,
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(
            legacy::default_reader(),
            Duration::from_secs(config.import.legacy_timeout_secs),
        )
    }

    /// Decode one file.
    ///
    /// EML failures surface as `FileDecode`; legacy files always produce a
    /// message (possibly a placeholder); other extensions are `UnsupportedFile`.
    pub fn decode(&self, file: &InputFile) -> Result<Message> {
        match file.kind() {
            FileKind::Eml => eml::decode_eml(&file.name, &file.bytes),
            FileKind::Legacy => Ok(legacy::decode_legacy(
                &file.name,
                &file.bytes,
                &self.legacy_reader,
                self.legacy_timeout,
            )),
            FileKind::Unsupported(_) => Err(EmlError::UnsupportedFile(file.name.clone())),
        }
    }
}

impl Default for MessageDecoder {
    fn default() -> Self {
        Self::new(legacy::default_reader(), DEFAULT_LEGACY_TIMEOUT)
    }
}

impl std::fmt::Debug for MessageDecoder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MessageDecoder")
            .field("legacy_timeout", &self.legacy_timeout)
            .finish_non_exhaustive()
    }
}

/// Decode one file with the default decoder.
pub fn decode_file(file: &InputFile) -> Result<Message> {
    MessageDecoder::default().decode(file)
}
