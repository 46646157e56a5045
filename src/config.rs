//! Configuration types for the PDF → Markdown → LaTeX pipeline.
//!
//! All pipeline behaviour is controlled through [`PipelineConfig`], built via
//! its [`PipelineConfigBuilder`]. The defaults reproduce the classic
//! four-folder layout:
//!
//! ```text
//! pdfs_to_process/   input documents (source of work)
//! pdfs-done/         inputs moved here after a successful run
//! ocr_output/<doc>/  ocr_response.json, output.md, images/
//! latex_output/<doc>/ <doc>.tex, images/
//! ```

use crate::error::Pdf2TexError;
use crate::progress::ProgressCallback;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Default OCR model identifier.
pub const DEFAULT_MODEL: &str = "mistral-ocr-latest";

/// Extension used for extracted images whose id carries no suffix.
pub const DEFAULT_IMAGE_EXTENSION: &str = ".png";

/// Configuration for one batch run.
///
/// Built via [`PipelineConfig::builder()`] or using
/// [`PipelineConfig::default()`].
///
/// # Example
/// ```rust
/// use edgequake_pdf2tex::PipelineConfig;
///
/// let config = PipelineConfig::builder()
///     .input_dir("inbox")
///     .output_dir("out/markdown")
///     .convert_to_latex(false)
///     .build()
///     .unwrap();
/// assert_eq!(config.document_output_dir("paper"), std::path::Path::new("out/markdown/paper"));
/// ```
#[derive(Clone)]
pub struct PipelineConfig {
    /// Directory scanned for `*.pdf` inputs. Default: `pdfs_to_process`.
    pub input_dir: PathBuf,

    /// Directory receiving inputs once they are fully processed. Default: `pdfs-done`.
    pub done_dir: PathBuf,

    /// Root of the per-document Markdown output directories. Default: `ocr_output`.
    pub output_dir: PathBuf,

    /// Root of the per-document LaTeX output directories. Default: `latex_output`.
    pub latex_dir: PathBuf,

    /// OCR model identifier sent with every recognition request.
    pub model: String,

    /// Lifetime of the signed document URL handed to the OCR endpoint, in hours. Default: 1.
    pub signed_url_expiry_hours: u32,

    /// Run the LaTeX conversion stage when the converter is available. Default: true.
    pub convert_to_latex: bool,

    /// Converter executable. Default: `pandoc`.
    pub converter_program: String,

    /// Extension given to images whose id has no suffix. Default: `.png`.
    pub fallback_image_extension: String,

    /// File name of the assembled Markdown inside each output directory.
    pub markdown_file_name: String,

    /// File name of the raw recognition snapshot inside each output directory.
    pub snapshot_file_name: String,

    /// Name of the images subdirectory (also the prefix of rewritten references).
    pub images_dir_name: String,

    /// Optional per-stage event sink.
    pub progress_callback: Option<ProgressCallback>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            input_dir: PathBuf::from("pdfs_to_process"),
            done_dir: PathBuf::from("pdfs-done"),
            output_dir: PathBuf::from("ocr_output"),
            latex_dir: PathBuf::from("latex_output"),
            model: DEFAULT_MODEL.to_string(),
            signed_url_expiry_hours: 1,
            convert_to_latex: true,
            converter_program: "pandoc".to_string(),
            fallback_image_extension: DEFAULT_IMAGE_EXTENSION.to_string(),
            markdown_file_name: "output.md".to_string(),
            snapshot_file_name: "ocr_response.json".to_string(),
            images_dir_name: "images".to_string(),
            progress_callback: None,
        }
    }
}

impl fmt::Debug for PipelineConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PipelineConfig")
            .field("input_dir", &self.input_dir)
            .field("done_dir", &self.done_dir)
            .field("output_dir", &self.output_dir)
            .field("latex_dir", &self.latex_dir)
            .field("model", &self.model)
            .field("signed_url_expiry_hours", &self.signed_url_expiry_hours)
            .field("convert_to_latex", &self.convert_to_latex)
            .field("converter_program", &self.converter_program)
            .field("fallback_image_extension", &self.fallback_image_extension)
            .field(
                "progress_callback",
                &self.progress_callback.as_ref().map(|_| "<dyn BatchProgressCallback>"),
            )
            .finish()
    }
}

impl PipelineConfig {
    /// Create a new builder for `PipelineConfig`.
    pub fn builder() -> PipelineConfigBuilder {
        PipelineConfigBuilder {
            config: Self::default(),
        }
    }

    /// `output_dir/<base>`: everything derived from one document.
    pub fn document_output_dir(&self, base: &str) -> PathBuf {
        self.output_dir.join(base)
    }

    /// `latex_dir/<base>`: the converted document and its image copy.
    pub fn latex_output_dir(&self, base: &str) -> PathBuf {
        self.latex_dir.join(base)
    }

    /// Create the four working directories if they are missing.
    pub fn ensure_directories(&self) -> Result<(), Pdf2TexError> {
        for dir in [
            &self.input_dir,
            &self.done_dir,
            &self.output_dir,
            &self.latex_dir,
        ] {
            ensure_dir(dir)?;
        }
        Ok(())
    }
}

fn ensure_dir(dir: &Path) -> Result<(), Pdf2TexError> {
    std::fs::create_dir_all(dir).map_err(|e| Pdf2TexError::DirectoryCreateFailed {
        path: dir.to_path_buf(),
        source: e,
    })?;
    debug!("Directory ready: {}", dir.display());
    Ok(())
}

/// Builder for [`PipelineConfig`].
#[derive(Debug)]
pub struct PipelineConfigBuilder {
    config: PipelineConfig,
}

impl PipelineConfigBuilder {
    pub fn input_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.input_dir = dir.into();
        self
    }

    pub fn done_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.done_dir = dir.into();
        self
    }

    pub fn output_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.output_dir = dir.into();
        self
    }

    pub fn latex_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.latex_dir = dir.into();
        self
    }

    /// Place all four directories under a common root using the default names.
    pub fn root(self, root: impl AsRef<Path>) -> Self {
        let root = root.as_ref();
        self.input_dir(root.join("pdfs_to_process"))
            .done_dir(root.join("pdfs-done"))
            .output_dir(root.join("ocr_output"))
            .latex_dir(root.join("latex_output"))
    }

    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.config.model = model.into();
        self
    }

    pub fn signed_url_expiry_hours(mut self, hours: u32) -> Self {
        self.config.signed_url_expiry_hours = hours.max(1);
        self
    }

    pub fn convert_to_latex(mut self, v: bool) -> Self {
        self.config.convert_to_latex = v;
        self
    }

    pub fn converter_program(mut self, program: impl Into<String>) -> Self {
        self.config.converter_program = program.into();
        self
    }

    /// Set the fallback extension; a missing leading dot is added.
    pub fn fallback_image_extension(mut self, ext: impl AsRef<str>) -> Self {
        let ext = ext.as_ref().trim();
        self.config.fallback_image_extension = if ext.starts_with('.') {
            ext.to_string()
        } else {
            format!(".{ext}")
        };
        self
    }

    pub fn images_dir_name(mut self, name: impl Into<String>) -> Self {
        self.config.images_dir_name = name.into();
        self
    }

    pub fn progress_callback(mut self, cb: ProgressCallback) -> Self {
        self.config.progress_callback = Some(cb);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<PipelineConfig, Pdf2TexError> {
        let c = &self.config;
        if c.model.trim().is_empty() {
            return Err(Pdf2TexError::InvalidConfig("Model must not be empty".into()));
        }
        if c.fallback_image_extension.len() < 2 {
            return Err(Pdf2TexError::InvalidConfig(format!(
                "Fallback image extension must look like '.png', got '{}'",
                c.fallback_image_extension
            )));
        }
        if c.images_dir_name.is_empty()
            || c.images_dir_name.contains(['/', '\\'])
            || c.images_dir_name == ".."
        {
            return Err(Pdf2TexError::InvalidConfig(format!(
                "Images directory name must be a single path component, got '{}'",
                c.images_dir_name
            )));
        }
        if c.input_dir == c.done_dir {
            return Err(Pdf2TexError::InvalidConfig(
                "Input and archive directories must differ".into(),
            ));
        }
        if c.convert_to_latex && c.converter_program.trim().is_empty() {
            return Err(Pdf2TexError::InvalidConfig(
                "Converter program must not be empty".into(),
            ));
        }
        Ok(self.config)
    }
}

// ── Enums ────────────────────────────────────────────────────────────────

/// Whether the external converter can be used for this batch.
///
/// Resolved once per batch by [`crate::pipeline::latex::detect_converter`]
/// and handed to the orchestrator, which never probes the tool itself.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ConverterCapability {
    /// The converter answered `--version`.
    Available { program: String, version: String },
    /// The converter is missing or broken; conversion is skipped.
    Unavailable { program: String, reason: String },
    /// Conversion was turned off by configuration.
    Disabled,
}

impl ConverterCapability {
    pub fn is_available(&self) -> bool {
        matches!(self, ConverterCapability::Available { .. })
    }
}
