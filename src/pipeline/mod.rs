//! Pipeline stages for PDF → Markdown → LaTeX conversion.
//!
//! Each submodule implements one step; the per-document state machine that
//! strings them together lives in [`crate::orchestrator`].
//!
//! ## Data Flow
//!
//! ```text
//! input ──▶ recognize ──▶ extract + rewrite + assemble ──▶ latex ──▶ archive
//! (*.pdf)   (OCR API)     (images/, output.md)           (pandoc)  (pdfs-done/)
//! ```
//!
//! 1. [`input`]     — discover `*.pdf` files and read them, checking magic bytes
//! 2. [`recognize`] — the OCR service boundary; the only stage with network I/O
//! 3. [`extract`]   — decode inline image payloads into numbered files
//! 4. [`rewrite`]   — point `![id](id)` references at the extracted files
//! 5. [`assemble`]  — join pages in order into one Markdown document
//! 6. [`latex`]     — optional pandoc conversion
//! 7. [`archive`]   — move the input out of the way once everything is written

pub mod archive;
pub mod assemble;
pub mod extract;
pub mod input;
pub mod latex;
pub mod recognize;
pub mod rewrite;
