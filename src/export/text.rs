//! Export messages as plain text files.

use std::path::{Path, PathBuf};

use crate::error::{EmlError, Result};
use crate::model::message::Message;

use super::download::{sanitize_filename_part, unique_path};

/// Export a single message as a plain text file with headers and body.
pub fn export_text(message: &Message, output_dir: &Path) -> Result<PathBuf> {
    std::fs::create_dir_all(output_dir).map_err(|e| EmlError::io(output_dir, e))?;
    let path = unique_path(&output_dir.join(text_filename(message)));
    std::fs::write(&path, render_text(message)).map_err(|e| EmlError::io(&path, e))?;
    Ok(path)
}

/// Headers, a rule, the body, and a summary of the attachments.
pub fn render_text(message: &Message) -> String {
    let mut content = String::new();

    content.push_str(&format!("Date:    {}\n", message.sent_at));
    content.push_str(&format!("From:    {}\n", message.sender));
    content.push_str(&format!("To:      {}\n", message.recipients));
    content.push_str(&format!("Subject: {}\n", message.subject));
    content.push_str(&format!("\n{}\n", "-".repeat(72)));

    content.push('\n');
    content.push_str(&message.body);
    content.push('\n');

    if !message.attachments.is_empty() {
        content.push_str(&format!(
            "\n[Attachments: {} file(s)]\n",
            message.attachments.len()
        ));
        for att in &message.attachments {
            content.push_str(&format!(
                "  - {} ({}, {}, {})\n",
                att.name, att.kind, att.mime_type, att.size
            ));
        }
    }

    content
}

/// File name derived from the source file and the subject.
fn text_filename(message: &Message) -> String {
    let stem = message
        .source_file_name
        .rsplit_once('.')
        .map(|(stem, _)| stem)
        .unwrap_or(&message.source_file_name);
    let stem = sanitize_filename_part(stem, 60);
    let subject = sanitize_filename_part(&message.subject, 80);
    format!("{stem}_{subject}.txt")
}
