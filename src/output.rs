//! Data model: recognition results in, rebuilt documents and run records out.

use crate::config::ConverterCapability;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};

// ── Recognition result (service → pipeline) ──────────────────────────────

/// Page-ordered output of the OCR service for one document.
///
/// Pages keep the order the service returned them in. That order is the
/// document order and is never sorted or deduplicated.
///
/// Only the fields the pipeline reads are typed. The complete response, as
/// received, is kept in [`raw`](Self::raw) and is what gets written to the
/// snapshot, so annotations, tables, headers and any future fields survive.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RecognitionResult {
    pub pages: Vec<Page>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    /// Untouched service response; `None` for results built in code.
    #[serde(skip)]
    pub raw: Option<serde_json::Value>,
}

impl RecognitionResult {
    /// Build the typed view from a service response, keeping the response.
    pub fn from_raw(raw: serde_json::Value) -> Result<Self, serde_json::Error> {
        let mut result: Self = serde_json::from_value(raw.clone())?;
        result.raw = Some(raw);
        Ok(result)
    }

    /// Total number of embedded images across all pages.
    pub fn image_count(&self) -> usize {
        self.pages.iter().map(|p| p.images.len()).sum()
    }

    /// JSON for the on-disk snapshot: the raw response when there is one.
    pub fn snapshot_json(&self) -> Result<String, serde_json::Error> {
        match &self.raw {
            Some(raw) => serde_json::to_string_pretty(raw),
            None => serde_json::to_string_pretty(self),
        }
    }
}

/// One recognised page: Markdown plus the images it embeds.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Page {
    #[serde(default)]
    pub index: usize,
    #[serde(default)]
    pub markdown: String,
    #[serde(default)]
    pub images: Vec<EmbeddedImage>,
}

impl Page {
    pub fn new(markdown: impl Into<String>, images: Vec<EmbeddedImage>) -> Self {
        Self {
            markdown: markdown.into(),
            images,
            ..Default::default()
        }
    }
}

/// An image carried inline in the recognition result.
///
/// `id` is unique within its page only; two pages may both contain
/// `img-0.jpeg`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EmbeddedImage {
    pub id: String,
    /// Base64 payload, usually a `data:image/...;base64,` URI.
    #[serde(rename = "image_base64", default)]
    pub payload: Option<String>,
}

impl EmbeddedImage {
    pub fn new(id: impl Into<String>, payload: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            payload: Some(payload.into()),
        }
    }

    /// Extension hint taken from the id's suffix, e.g. `".jpeg"` for `img-0.jpeg`.
    pub fn extension_hint(&self) -> Option<String> {
        Path::new(&self.id)
            .extension()
            .and_then(|e| e.to_str())
            .filter(|e| !e.is_empty())
            .map(|e| format!(".{e}"))
    }
}

// ── Rebuilt document (pipeline → disk) ───────────────────────────────────

/// An embedded image after it was decoded and written to its own file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtractedImage {
    /// Id the image had in the recognition result.
    pub source_id: String,
    /// `{base}_img_{counter}{ext}`.
    pub assigned_name: String,
    /// Counter value the name was built from (1-based, document-wide).
    pub counter: u32,
    /// Where the bytes were written.
    pub path: PathBuf,
    /// Reference target used in the Markdown, e.g. `images/doc_img_1.png`.
    pub relative_path: String,
    pub bytes_written: usize,
}

/// The single flat Markdown document rebuilt from all pages.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssembledDocument {
    pub text: String,
    pub images: Vec<ExtractedImage>,
    pub page_count: usize,
}

// ── Run records ──────────────────────────────────────────────────────────

/// Lifecycle of one input document.
///
/// `Discovered → Submitted → Recognized → Assembled → Persisted →
/// [Converted] → Archived`, with `Failed` reachable from every
/// non-terminal state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentState {
    Discovered,
    Submitted,
    Recognized,
    Assembled,
    Persisted,
    Converted,
    Archived,
    Failed,
}

impl DocumentState {
    pub fn is_terminal(self) -> bool {
        matches!(self, DocumentState::Archived | DocumentState::Failed)
    }
}

impl fmt::Display for DocumentState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            DocumentState::Discovered => "discovered",
            DocumentState::Submitted => "submitted",
            DocumentState::Recognized => "recognized",
            DocumentState::Assembled => "assembled",
            DocumentState::Persisted => "persisted",
            DocumentState::Converted => "converted",
            DocumentState::Archived => "archived",
            DocumentState::Failed => "failed",
        };
        f.write_str(s)
    }
}

/// Bookkeeping for one input document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineRun {
    /// Original input path.
    pub source: PathBuf,
    /// Document base name (file stem).
    pub base_name: String,
    /// `output_dir/<base>`.
    pub output_dir: PathBuf,
    /// Final state reached.
    pub state: DocumentState,
    /// Whether the LaTeX stage produced a file.
    pub converted: bool,
    pub markdown_path: Option<PathBuf>,
    pub latex_path: Option<PathBuf>,
    /// Where the input ended up after archiving.
    pub archived_path: Option<PathBuf>,
    pub page_count: usize,
    pub image_count: usize,
    /// Document-fatal failure, if any.
    pub error: Option<String>,
    /// Non-fatal conversion failure, if any.
    pub conversion_error: Option<String>,
    pub duration_ms: u64,
}

impl PipelineRun {
    pub fn new(source: PathBuf, base_name: String, output_dir: PathBuf) -> Self {
        Self {
            source,
            base_name,
            output_dir,
            state: DocumentState::Discovered,
            converted: false,
            markdown_path: None,
            latex_path: None,
            archived_path: None,
            page_count: 0,
            image_count: 0,
            error: None,
            conversion_error: None,
            duration_ms: 0,
        }
    }

    pub fn is_success(&self) -> bool {
        self.state == DocumentState::Archived
    }
}

/// Result of one batch run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchReport {
    pub converter: ConverterCapability,
    pub runs: Vec<PipelineRun>,
    pub total_duration_ms: u64,
}

impl BatchReport {
    pub fn succeeded(&self) -> impl Iterator<Item = &PipelineRun> {
        self.runs.iter().filter(|r| r.is_success())
    }

    pub fn failed(&self) -> impl Iterator<Item = &PipelineRun> {
        self.runs.iter().filter(|r| !r.is_success())
    }

    pub fn success_count(&self) -> usize {
        self.succeeded().count()
    }

    pub fn failure_count(&self) -> usize {
        self.failed().count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extension_hint_from_id_suffix() {
        assert_eq!(
            EmbeddedImage::new("img-0.jpeg", "").extension_hint().as_deref(),
            Some(".jpeg")
        );
        assert_eq!(EmbeddedImage::new("img-0", "").extension_hint(), None);
        assert_eq!(EmbeddedImage::new(".hidden", "").extension_hint(), None);
        assert_eq!(EmbeddedImage::new("", "").extension_hint(), None);
    }

    const SERVICE_RESPONSE: &str = r##"{
        "pages": [
            {
                "index": 0,
                "markdown": "# Title\n\n![img-0.jpeg](img-0.jpeg)",
                "images": [
                    {
                        "id": "img-0.jpeg",
                        "top_left_x": 10, "top_left_y": 20,
                        "bottom_right_x": 110, "bottom_right_y": 220,
                        "image_base64": "data:image/jpeg;base64,AAAA",
                        "image_annotation": "a chart"
                    }
                ],
                "dimensions": { "dpi": 200.5, "height": 2200, "width": 1700 },
                "header": "H"
            },
            { "index": 1, "markdown": "", "images": [] }
        ],
        "model": "mistral-ocr-2505-completion",
        "usage_info": { "pages_processed": 2, "doc_size_bytes": null },
        "document_annotation": "{\"kind\": \"paper\"}"
    }"##;

    #[test]
    fn typed_view_reads_only_what_the_pipeline_needs() {
        let raw: serde_json::Value = serde_json::from_str(SERVICE_RESPONSE).unwrap();
        let result = RecognitionResult::from_raw(raw).unwrap();
        assert_eq!(result.pages.len(), 2);
        assert_eq!(result.image_count(), 1);
        assert_eq!(result.pages[0].markdown, "# Title\n\n![img-0.jpeg](img-0.jpeg)");
        assert_eq!(result.pages[1].markdown, "");
        assert_eq!(result.model.as_deref(), Some("mistral-ocr-2505-completion"));
    }

    #[test]
    fn snapshot_keeps_fields_the_typed_view_ignores() {
        let raw: serde_json::Value = serde_json::from_str(SERVICE_RESPONSE).unwrap();
        let result = RecognitionResult::from_raw(raw.clone()).unwrap();
        let snapshot: serde_json::Value =
            serde_json::from_str(&result.snapshot_json().unwrap()).unwrap();
        assert_eq!(snapshot, raw);
        assert_eq!(snapshot["pages"][0]["images"][0]["image_annotation"], "a chart");
        assert_eq!(snapshot["pages"][0]["header"], "H");
    }

    #[test]
    fn snapshot_of_built_result_is_typed_view() {
        let result = RecognitionResult {
            pages: vec![Page::new("x", vec![])],
            ..Default::default()
        };
        let back: RecognitionResult = serde_json::from_str(&result.snapshot_json().unwrap()).unwrap();
        assert_eq!(back, result);
    }

    #[test]
    fn state_display_and_terminality() {
        assert_eq!(DocumentState::Recognized.to_string(), "recognized");
        assert!(DocumentState::Archived.is_terminal());
        assert!(DocumentState::Failed.is_terminal());
        assert!(!DocumentState::Persisted.is_terminal());
    }
}
