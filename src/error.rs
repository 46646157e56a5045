//! Error types for the edgequake-pdf2tex library.
//!
//! Failures are split by how far they reach:
//!
//! * [`Pdf2TexError`] — **Fatal to the process**: nothing can be processed
//!   (credential missing, output directories cannot be created). Returned
//!   before the first document is touched.
//!
//! * [`DocumentError`] — **Fatal to one document**: recognition failed, an
//!   embedded image payload is malformed, a write failed. The batch driver
//!   catches it at the per-document boundary, records it on the
//!   [`crate::output::PipelineRun`], leaves the input in place and moves on.
//!
//! * [`ConverterError`] — **Fatal to one stage**: the LaTeX conversion
//!   failed. The Markdown output is already persisted, so the document still
//!   counts as a success and is archived.
//!
//! [`RecognitionError`] describes what went wrong talking to the OCR
//! service; it is wrapped into [`DocumentError::Recognition`] together with
//! the document name.

use std::path::PathBuf;
use thiserror::Error;

/// Errors that abort the whole run.
#[derive(Debug, Error)]
pub enum Pdf2TexError {
    // ── Startup errors ────────────────────────────────────────────────────
    /// The recognition service credential is not set.
    #[error("{var} environment variable is not set.\n{hint}")]
    MissingCredential { var: String, hint: String },

    /// A working directory could not be created.
    #[error("Failed to create directory '{path}': {source}")]
    DirectoryCreateFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The input directory exists but cannot be listed.
    #[error("Cannot read input directory '{path}': {source}")]
    InputDirUnreadable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// A failure scoped to a single input document.
///
/// The document is reported and left in the input directory so it can be
/// re-run; other documents in the batch are unaffected.
#[derive(Debug, Error)]
pub enum DocumentError {
    /// The input file could not be read.
    #[error("Failed to read '{path}': {source}")]
    ReadFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The file was read but is not a PDF.
    #[error("File is not a valid PDF: '{path}'\nFirst bytes: {magic:?}")]
    NotAPdf { path: PathBuf, magic: Vec<u8> },

    /// The recognition service call failed.
    #[error("Recognition failed for '{document}': {source}")]
    Recognition {
        document: String,
        #[source]
        source: RecognitionError,
    },

    /// An embedded image payload could not be decoded.
    #[error("Malformed image payload '{image_id}' in '{document}': {detail}")]
    MalformedImage {
        document: String,
        image_id: String,
        detail: String,
    },

    /// An output artifact could not be written.
    #[error("Failed to write '{path}': {source}")]
    WriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The recognition snapshot could not be serialised.
    #[error("Failed to serialise recognition snapshot for '{document}': {detail}")]
    SnapshotFailed { document: String, detail: String },

    /// The processed input could not be moved into the archive directory.
    #[error("Failed to archive '{path}': {source}")]
    ArchiveFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A worker task panicked while processing the document.
    #[error("Internal error while processing '{document}': {detail}")]
    Internal { document: String, detail: String },
}

/// Errors returned by a [`crate::pipeline::recognize::RecognitionService`].
#[derive(Debug, Error)]
pub enum RecognitionError {
    /// The request never produced an HTTP response.
    #[error("transport error during {stage}: {detail}")]
    Transport { stage: &'static str, detail: String },

    /// The service rejected the credential (401/403).
    #[error("authentication rejected during {stage} (HTTP {status})")]
    Auth { stage: &'static str, status: u16 },

    /// The service answered with a non-success status.
    #[error("{stage} returned HTTP {status}: {body}")]
    Api {
        stage: &'static str,
        status: u16,
        body: String,
    },

    /// The response body did not have the expected shape.
    #[error("unexpected response during {stage}: {detail}")]
    Decode { stage: &'static str, detail: String },
}

/// A LaTeX conversion failure. Never fails the document.
#[derive(Debug, Clone, Error, serde::Serialize, serde::Deserialize)]
pub enum ConverterError {
    /// The converter process could not be started.
    #[error("Failed to run '{program}': {detail}")]
    Spawn { program: String, detail: String },

    /// The converter exited with a failure status.
    #[error("'{program}' exited with {status}: {stderr}")]
    Failed {
        program: String,
        status: String,
        stderr: String,
    },

    /// The conversion output directory or its image copy could not be prepared.
    #[error("Failed to prepare '{path}': {detail}")]
    PrepareFailed { path: PathBuf, detail: String },
}
