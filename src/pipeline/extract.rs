//! Image extraction: inline base64 payload → standalone file.
//!
//! Every extracted image is named `{base}_img_{n}{ext}` where `n` comes from
//! an [`ImageCounter`] that the caller threads through the whole document.
//! Ids are only unique within a page (`img-0.jpeg` shows up on most pages),
//! so the counter, not the id, is what keeps file names distinct.

use crate::error::DocumentError;
use crate::output::{EmbeddedImage, ExtractedImage};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use std::path::Path;
use tracing::debug;

/// Document-wide image sequence number. Starts at 1.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImageCounter(u32);

impl Default for ImageCounter {
    fn default() -> Self {
        Self(1)
    }
}

impl ImageCounter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Value the next extracted image will receive.
    pub fn peek(&self) -> u32 {
        self.0
    }

    /// Hand out the current value and advance by exactly one.
    pub fn take(&mut self) -> u32 {
        let n = self.0;
        self.0 += 1;
        n
    }
}

/// Where and how one document's images are written.
#[derive(Debug, Clone, Copy)]
pub struct ExtractTarget<'a> {
    /// Document base name, used as the file-name prefix.
    pub base_name: &'a str,
    /// Absolute or working-dir-relative images directory.
    pub images_dir: &'a Path,
    /// Name of the images directory as it appears in Markdown references.
    pub images_dir_name: &'a str,
    /// Extension used when the id has none.
    pub fallback_extension: &'a str,
}

/// Decode a payload that may carry a `data:<mime>;base64,` prefix.
pub fn decode_payload(payload: &str) -> Result<Vec<u8>, String> {
    let payload = payload.trim();
    let b64 = if payload.starts_with("data:") {
        match payload.split_once(',') {
            Some((_, data)) => data,
            None => return Err("data URI has no ',' separator".to_string()),
        }
    } else {
        payload
    };
    let b64: String = b64.chars().filter(|c| !c.is_ascii_whitespace()).collect();
    STANDARD.decode(b64).map_err(|e| e.to_string())
}

/// `{base}_img_{counter}{ext}`
pub fn assigned_name(base_name: &str, counter: u32, extension: &str) -> String {
    format!("{base_name}_img_{counter}{extension}")
}

/// Decode one embedded image, write it under `target.images_dir` and
/// advance `counter`.
///
/// A missing or undecodable payload is fatal for the document and names the
/// offending image id.
pub fn extract_image(
    image: &EmbeddedImage,
    target: &ExtractTarget<'_>,
    counter: &mut ImageCounter,
) -> Result<ExtractedImage, DocumentError> {
    let malformed = |detail: String| DocumentError::MalformedImage {
        document: target.base_name.to_string(),
        image_id: image.id.clone(),
        detail,
    };

    let payload = image
        .payload
        .as_deref()
        .ok_or_else(|| malformed("payload missing from recognition result".to_string()))?;
    let bytes = decode_payload(payload).map_err(malformed)?;

    let extension = image
        .extension_hint()
        .unwrap_or_else(|| target.fallback_extension.to_string());
    let n = counter.take();
    let name = assigned_name(target.base_name, n, &extension);
    let path = target.images_dir.join(&name);

    std::fs::write(&path, &bytes).map_err(|e| DocumentError::WriteFailed {
        path: path.clone(),
        source: e,
    })?;
    debug!("Extracted {} → {} ({} bytes)", image.id, path.display(), bytes.len());

    Ok(ExtractedImage {
        source_id: image.id.clone(),
        relative_path: format!("{}/{}", target.images_dir_name, name),
        assigned_name: name,
        counter: n,
        path,
        bytes_written: bytes.len(),
    })
}
