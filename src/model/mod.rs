//! Core data model types for decoded messages, attachments, and input files.

pub mod attachment;
pub mod message;
pub mod source;
