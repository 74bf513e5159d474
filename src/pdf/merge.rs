//! Merge PDF attachments into one document.
//!
//! Inputs are processed strictly in order. Each input's pages are appended
//! in their own order, so the result is the concatenation of the inputs'
//! page sequences. A bad input is recorded and skipped; only a merge that
//! collects no page at all fails.

use lopdf::{dictionary, Dictionary, Document, Object, ObjectId};
use tracing::{debug, info, warn};

use crate::error::{EmlError, Result};
use crate::model::attachment::Attachment;

/// Page attributes a page may inherit from its ancestors in the page tree.
const INHERITABLE: [&[u8]; 4] = [b"Resources", b"MediaBox", b"CropBox", b"Rotate"];

/// Upper bound on page-tree depth when resolving inherited attributes.
const MAX_TREE_DEPTH: usize = 64;

/// Objects of the source documents that are rebuilt rather than copied.
const SKIPPED_TYPES: [&str; 6] = ["Catalog", "Pages", "Outlines", "Outline", "XRef", "ObjStm"];

/// Destination document under construction.
pub struct MergedDocument {
    document: Document,
    pages_id: ObjectId,
    pages: Vec<ObjectId>,
}

impl MergedDocument {
    pub fn new() -> Self {
        let mut document = Document::with_version("1.5");
        let pages_id = document.new_object_id();
        Self {
            document,
            pages_id,
            pages: Vec::new(),
        }
    }

    /// Number of pages appended so far.
    pub fn page_count(&self) -> usize {
        self.pages.len()
    }

    /// Load `bytes` as a PDF and append all of its pages.
    ///
    /// Returns the number of pages added. Fails with `PdfLoad` when the bytes
    /// are not a readable, unencrypted PDF with at least one page; the
    /// destination is left untouched in that case.
    pub fn append(&mut self, name: &str, bytes: &[u8]) -> Result<usize> {
        let load_error = |reason: String| EmlError::PdfLoad {
            name: name.to_string(),
            reason,
        };

        let mut source = Document::load_mem(bytes).map_err(|e| load_error(e.to_string()))?;
        if source.is_encrypted() {
            return Err(load_error("document is encrypted".into()));
        }
        if source.get_pages().is_empty() {
            return Err(load_error("document has no pages".into()));
        }

        source.renumber_objects_with(self.document.max_id + 1);
        let page_ids: Vec<ObjectId> = source.get_pages().into_values().collect();

        for &page_id in &page_ids {
            let inherited = inherited_attributes(&source, page_id);
            let page = source
                .get_object_mut(page_id)
                .and_then(Object::as_dict_mut)
                .map_err(|e| load_error(format!("page {page_id:?}: {e}")))?;
            for (key, value) in inherited {
                page.set(key, value);
            }
            page.set("Parent", Object::Reference(self.pages_id));
        }

        for (id, object) in source.objects {
            let skip = object
                .type_name()
                .map(|t| SKIPPED_TYPES.iter().any(|skipped| *skipped == t))
                .unwrap_or(false);
            if !skip {
                self.document.objects.insert(id, object);
            }
        }
        if let Some(&(max, _)) = self.document.objects.keys().next_back() {
            self.document.max_id = self.document.max_id.max(max);
        }

        debug!(file = name, pages = page_ids.len(), "Appended PDF");
        self.pages.extend_from_slice(&page_ids);
        Ok(page_ids.len())
    }

    /// Serialize the document. Fails with `MergeEmpty` if no page was added.
    pub fn finish(mut self) -> Result<Vec<u8>> {
        if self.pages.is_empty() {
            return Err(EmlError::MergeEmpty);
        }

        let kids: Vec<Object> = self.pages.iter().map(|&id| Object::Reference(id)).collect();
        let pages = dictionary! {
            "Type" => "Pages",
            "Kids" => kids,
            "Count" => self.pages.len() as i64,
        };
        self.document
            .objects
            .insert(self.pages_id, Object::Dictionary(pages));

        let catalog_id = self.document.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => self.pages_id,
        });
        self.document.trailer.set("Root", catalog_id);
        self.document.compress();

        let mut buffer = Vec::new();
        self.document
            .save_to(&mut buffer)
            .map_err(|e| EmlError::PdfWrite(e.to_string()))?;
        Ok(buffer)
    }
}

impl Default for MergedDocument {
    fn default() -> Self {
        Self::new()
    }
}

/// Attributes missing on the page itself but present on an ancestor.
fn inherited_attributes(doc: &Document, page_id: ObjectId) -> Vec<(&'static [u8], Object)> {
    let mut found = Vec::new();
    let Ok(page) = doc.get_dictionary(page_id) else {
        return found;
    };

    let mut missing: Vec<&'static [u8]> =
        INHERITABLE.iter().copied().filter(|key| !page.has(key)).collect();
    let mut parent = parent_of(page);
    let mut depth = 0;

    while let Some(id) = parent {
        if missing.is_empty() || depth >= MAX_TREE_DEPTH {
            break;
        }
        let Ok(node) = doc.get_dictionary(id) else {
            break;
        };
        missing.retain(|key| match node.get(key) {
            Ok(value) => {
                found.push((*key, value.clone()));
                false
            }
            Err(_) => true,
        });
        parent = parent_of(node);
        depth += 1;
    }

    found
}

fn parent_of(node: &Dictionary) -> Option<ObjectId> {
    node.get(b"Parent").and_then(Object::as_reference).ok()
}

/// Result of a merge that produced a document.
#[derive(Debug)]
pub struct MergeOutcome {
    /// Serialized merged document.
    pub bytes: Vec<u8>,
    /// Number of inputs whose pages were added.
    pub merged: usize,
    pub page_count: usize,
    /// One `PdfLoad` error per skipped input, in input order.
    pub failures: Vec<EmlError>,
}

/// Merge the PDF attachments of `attachments`, in order.
///
/// Non-PDF attachments are ignored. Each payload is decoded, appended, and
/// released before the next one is touched.
pub fn merge_pdfs(attachments: &[Attachment]) -> Result<MergeOutcome> {
    let mut merged_doc = MergedDocument::new();
    let mut merged = 0;
    let mut failures = Vec::new();

    for attachment in attachments {
        if !attachment.is_pdf() {
            debug!(file = %attachment.name, kind = %attachment.kind, "Not a PDF, skipping");
            continue;
        }

        let appended = attachment
            .decode_payload()
            .map_err(|e| EmlError::PdfLoad {
                name: attachment.name.clone(),
                reason: e.to_string(),
            })
            .and_then(|bytes| merged_doc.append(&attachment.name, &bytes));

        match appended {
            Ok(_) => merged += 1,
            Err(e) => {
                warn!(file = %attachment.name, error = %e, "Skipping PDF");
                failures.push(e);
            }
        }
    }

    if merged == 0 {
        warn!(failed = failures.len(), "No PDF could be merged");
        return Err(EmlError::MergeEmpty);
    }

    let page_count = merged_doc.page_count();
    let bytes = merged_doc.finish()?;
    info!(
        merged,
        failed = failures.len(),
        pages = page_count,
        size = bytes.len(),
        "Merged PDFs"
    );

    Ok(MergeOutcome {
        bytes,
        merged,
        page_count,
        failures,
    })
}
