//! Move a processed input into the archive directory.
//!
//! Archiving is the last action for a document. Until it happens the input
//! stays where it was and the whole document can be re-run.

use crate::error::DocumentError;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Move `source` into `done_dir`, keeping its file name.
///
/// Falls back to copy + remove when a plain rename is not possible
/// (e.g. the directories live on different filesystems).
pub async fn archive_input(source: &Path, done_dir: &Path) -> Result<PathBuf, DocumentError> {
    let archive_failed = |e| DocumentError::ArchiveFailed {
        path: source.to_path_buf(),
        source: e,
    };

    let file_name = source.file_name().ok_or_else(|| {
        archive_failed(std::io::Error::new(
            std::io::ErrorKind::InvalidInput,
            "input path has no file name",
        ))
    })?;
    let dest = done_dir.join(file_name);

    if let Err(e) = tokio::fs::rename(source, &dest).await {
        debug!("rename {} failed ({}); copying instead", source.display(), e);
        tokio::fs::copy(source, &dest).await.map_err(archive_failed)?;
        tokio::fs::remove_file(source).await.map_err(archive_failed)?;
    }

    info!("{} moved to {}", source.display(), done_dir.display());
    Ok(dest)
}
