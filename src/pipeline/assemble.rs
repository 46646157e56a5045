//! Page assembly: recognition result → one flat Markdown document.
//!
//! [`rebuild_document`] drives the three per-document transformations in
//! order, page by page:
//!
//! ```text
//! page.images ──extract──▶ files + id→path map ──rewrite──▶ page markdown
//!                                                              │
//! all pages ─────────────────────────────────assemble──────────▶ document
//! ```
//!
//! The [`ImageCounter`] is created once per document and never reset
//! between pages.

use crate::error::DocumentError;
use crate::output::{AssembledDocument, RecognitionResult};
use crate::pipeline::extract::{extract_image, ExtractTarget, ImageCounter};
use crate::pipeline::rewrite::{has_embedded_reference, rewrite_references};
use std::collections::HashMap;
use tracing::debug;

/// Blank line placed between consecutive pages.
pub const PAGE_SEPARATOR: &str = "\n\n";

/// Join page texts in order with a blank line between each pair.
///
/// Empty pages keep their slot, so two pages around an empty one end up
/// separated by two blank-line separators.
pub fn assemble_pages<I, S>(pages: I) -> String
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut out = String::new();
    for (i, page) in pages.into_iter().enumerate() {
        if i > 0 {
            out.push_str(PAGE_SEPARATOR);
        }
        out.push_str(page.as_ref());
    }
    out
}

/// Extract every image, rewrite every page and assemble the document.
///
/// Images are written to `target.images_dir`, which must already exist.
pub fn rebuild_document(
    result: &RecognitionResult,
    target: &ExtractTarget<'_>,
) -> Result<AssembledDocument, DocumentError> {
    let mut counter = ImageCounter::new();
    let mut images = Vec::with_capacity(result.image_count());
    let mut rewritten = Vec::with_capacity(result.pages.len());

    for (page_idx, page) in result.pages.iter().enumerate() {
        let mut paths = HashMap::with_capacity(page.images.len());
        for image in &page.images {
            if !has_embedded_reference(&page.markdown, &image.id) {
                debug!("Page {}: image {} is not referenced in the markup", page_idx + 1, image.id);
            }
            let extracted = extract_image(image, target, &mut counter)?;
            paths.insert(image.id.clone(), extracted.relative_path.clone());
            images.push(extracted);
        }
        debug!(
            "Page {}: {} images, {} chars",
            page_idx + 1,
            page.images.len(),
            page.markdown.len()
        );
        rewritten.push(rewrite_references(&page.markdown, &paths));
    }

    Ok(AssembledDocument {
        text: assemble_pages(&rewritten),
        images,
        page_count: result.pages.len(),
    })
}
