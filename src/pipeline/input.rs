//! Input discovery and loading.
//!
//! Work is whatever `*.pdf` file sits in the input directory. Discovery
//! sorts by file name so a batch always runs in the same order, and each
//! document is checked for the `%PDF` magic bytes before anything is sent
//! to the recognition service.

use crate::error::{DocumentError, Pdf2TexError};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Whether `path` has a `.pdf` extension (any case).
pub fn is_pdf_path(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("pdf"))
}

/// List the PDF files directly inside `dir`, sorted by file name.
pub fn discover_inputs(dir: &Path) -> Result<Vec<PathBuf>, Pdf2TexError> {
    let unreadable = |e| Pdf2TexError::InputDirUnreadable {
        path: dir.to_path_buf(),
        source: e,
    };

    let mut found = Vec::new();
    for entry in std::fs::read_dir(dir).map_err(unreadable)? {
        let path = entry.map_err(unreadable)?.path();
        if path.is_file() && is_pdf_path(&path) {
            found.push(path);
        }
    }
    found.sort_by(|a, b| a.file_name().cmp(&b.file_name()));
    debug!("Discovered {} PDFs in {}", found.len(), dir.display());
    Ok(found)
}

/// File name without extension; namespaces every derived artifact.
pub fn document_base_name(path: &Path) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "document".to_string())
}

/// Read a document, validating the PDF magic bytes.
pub async fn read_document(path: &Path) -> Result<Vec<u8>, DocumentError> {
    let bytes = tokio::fs::read(path)
        .await
        .map_err(|e| DocumentError::ReadFailed {
            path: path.to_path_buf(),
            source: e,
        })?;

    if !bytes.starts_with(b"%PDF") {
        return Err(DocumentError::NotAPdf {
            path: path.to_path_buf(),
            magic: bytes.iter().take(4).copied().collect(),
        });
    }

    debug!("Read {} ({} bytes)", path.display(), bytes.len());
    Ok(bytes)
}
