//! `emlkit`: decode `.eml` / `.msg` email files and merge their PDF
//! attachments.
//!
//! The library turns raw message files into [`model::message::Message`]
//! values (headers, a readable plain-text body, and attachments), and
//! recombines PDF attachments into one document for download or printing.

pub mod config;
pub mod error;
pub mod export;
pub mod import;
pub mod model;
pub mod parser;
pub mod pdf;
