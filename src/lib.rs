//! # edgequake-pdf2tex
//!
//! Convert PDF documents to portable Markdown with extracted image files,
//! then to LaTeX.
//!
//! Page recognition is delegated to the Mistral OCR API and the final
//! Markdown → LaTeX step to pandoc. What this crate owns is the part in
//! between: rebuilding one flat Markdown document from a page-structured
//! OCR result whose images arrive inline as base64 payloads.
//!
//! ## Pipeline Overview
//!
//! ```text
//! pdfs_to_process/paper.pdf
//!  │
//!  ├─ 1. Submit     upload → signed URL → OCR (model + inline images)
//!  ├─ 2. Snapshot   ocr_output/paper/ocr_response.json
//!  ├─ 3. Extract    images → ocr_output/paper/images/paper_img_{n}.{ext}
//!  ├─ 4. Rewrite    ![img-0.jpeg](img-0.jpeg) → ![img-0.jpeg](images/paper_img_1.jpeg)
//!  ├─ 5. Assemble   pages joined by a blank line → ocr_output/paper/output.md
//!  ├─ 6. LaTeX      pandoc → latex_output/paper/paper.tex   (optional)
//!  └─ 7. Archive    pdfs_to_process/paper.pdf → pdfs-done/paper.pdf
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use edgequake_pdf2tex::{detect_converter, run_batch, MistralOcrClient, PipelineConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = PipelineConfig::default();
//!     let client = MistralOcrClient::from_env(&config.model)?;
//!     let converter = detect_converter(&config.converter_program, config.convert_to_latex).await;
//!
//!     let report = run_batch(&config, &client, &converter).await?;
//!     for run in &report.runs {
//!         println!("{}: {}", run.source.display(), run.state);
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `pdf2tex` binary (clap + anyhow + tracing-subscriber + dotenvy) |

// ── Modules ──────────────────────────────────────────────────────────────

pub mod config;
pub mod error;
pub mod orchestrator;
pub mod output;
pub mod pipeline;
pub mod progress;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use config::{ConverterCapability, PipelineConfig, PipelineConfigBuilder};
pub use error::{ConverterError, DocumentError, Pdf2TexError, RecognitionError};
pub use orchestrator::{process_document, run_batch, run_batch_sync};
pub use output::{
    AssembledDocument, BatchReport, DocumentState, EmbeddedImage, ExtractedImage, Page,
    PipelineRun, RecognitionResult,
};
pub use pipeline::assemble::{assemble_pages, rebuild_document};
pub use pipeline::extract::{extract_image, ExtractTarget, ImageCounter};
pub use pipeline::latex::detect_converter;
pub use pipeline::recognize::{MistralOcrClient, RecognitionService};
pub use pipeline::rewrite::rewrite_references;
pub use progress::{BatchProgressCallback, NoopProgressCallback, ProgressCallback};
