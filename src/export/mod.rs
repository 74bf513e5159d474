//! Export functionality: download targets for attachments and merged PDFs,
//! and plain-text renditions of messages.

pub mod download;
pub mod text;
