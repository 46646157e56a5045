//! Progress-callback trait for per-document pipeline events.
//!
//! Inject an [`Arc<dyn BatchProgressCallback>`] via
//! [`crate::config::PipelineConfigBuilder::progress_callback`] to receive an
//! event for every document and every state transition.
//!
//! # Example
//!
//! ```rust
//! use edgequake_pdf2tex::{BatchProgressCallback, DocumentState, PipelineConfig};
//! use std::sync::{Arc, atomic::{AtomicUsize, Ordering}};
//!
//! struct Persisted(AtomicUsize);
//!
//! impl BatchProgressCallback for Persisted {
//!     fn on_state_change(&self, _document: &str, state: DocumentState) {
//!         if state == DocumentState::Persisted {
//!             self.0.fetch_add(1, Ordering::SeqCst);
//!         }
//!     }
//! }
//!
//! let config = PipelineConfig::builder()
//!     .progress_callback(Arc::new(Persisted(AtomicUsize::new(0))))
//!     .build()
//!     .unwrap();
//! ```

use crate::output::{BatchReport, DocumentState, PipelineRun};
use std::sync::Arc;

/// Called by the batch driver as it moves documents through the pipeline.
///
/// Documents are processed one at a time, so events for different
/// documents never interleave. All methods default to no-ops.
pub trait BatchProgressCallback: Send + Sync {
    /// Called once after discovery.
    fn on_batch_start(&self, total_documents: usize) {
        let _ = total_documents;
    }

    /// Called before a document is read.
    ///
    /// # Arguments
    /// * `index`    — 1-indexed position in the batch
    /// * `document` — input file name
    fn on_document_start(&self, index: usize, total: usize, document: &str) {
        let _ = (index, total, document);
    }

    /// Called on every state transition, including `Failed`.
    fn on_state_change(&self, document: &str, state: DocumentState) {
        let _ = (document, state);
    }

    /// Called when a document reached `Archived`.
    fn on_document_complete(&self, run: &PipelineRun) {
        let _ = run;
    }

    /// Called when a document ended in `Failed`.
    fn on_document_error(&self, document: &str, error: &str) {
        let _ = (document, error);
    }

    /// Called once after every discovered document was attempted.
    fn on_batch_complete(&self, report: &BatchReport) {
        let _ = report;
    }
}

/// A no-op implementation for callers that don't need progress events.
pub struct NoopProgressCallback;

impl BatchProgressCallback for NoopProgressCallback {}

/// Convenience alias matching the type stored in [`crate::config::PipelineConfig`].
pub type ProgressCallback = Arc<dyn BatchProgressCallback>;
