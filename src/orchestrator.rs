//! Batch driver and per-document state machine.
//!
//! ```text
//! Discovered ─▶ Submitted ─▶ Recognized ─▶ Assembled ─▶ Persisted ─▶ [Converted] ─▶ Archived
//!      └────────────┴────────────┴────────────┴────────────┴──────────────▶ Failed
//! ```
//!
//! Documents run strictly one after another. A document-scoped error stops
//! that document at `Failed` and leaves its input in place; the batch moves
//! on to the next one. Archiving is always the last step, so anything that
//! dies before it can simply be re-run.

use crate::config::{ConverterCapability, PipelineConfig};
use crate::error::{DocumentError, Pdf2TexError};
use crate::output::{AssembledDocument, BatchReport, DocumentState, PipelineRun, RecognitionResult};
use crate::pipeline::{archive, assemble, extract::ExtractTarget, input, latex};
use crate::pipeline::recognize::RecognitionService;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{info, warn};

/// Process every PDF in `config.input_dir`.
///
/// `converter` is the capability resolved once for this batch (see
/// [`latex::detect_converter`]).
///
/// # Errors
/// Only fatal-to-process conditions: the working directories cannot be
/// created or the input directory cannot be listed. Individual document
/// failures are recorded in the returned [`BatchReport`].
pub async fn run_batch(
    config: &PipelineConfig,
    service: &dyn RecognitionService,
    converter: &ConverterCapability,
) -> Result<BatchReport, Pdf2TexError> {
    let batch_start = Instant::now();
    config.ensure_directories()?;

    let inputs = input::discover_inputs(&config.input_dir)?;
    if inputs.is_empty() {
        info!("No PDFs to process.");
    } else {
        info!("Found {} PDFs in {}", inputs.len(), config.input_dir.display());
    }

    if let Some(ref cb) = config.progress_callback {
        cb.on_batch_start(inputs.len());
    }

    let total = inputs.len();
    let mut runs = Vec::with_capacity(total);
    for (i, path) in inputs.into_iter().enumerate() {
        if let Some(ref cb) = config.progress_callback {
            cb.on_document_start(i + 1, total, &display_name(&path));
        }
        runs.push(process_document(&path, config, service, converter).await);
    }

    let report = BatchReport {
        converter: converter.clone(),
        runs,
        total_duration_ms: batch_start.elapsed().as_millis() as u64,
    };
    info!(
        "Batch complete: {}/{} documents succeeded in {}ms",
        report.success_count(),
        report.runs.len(),
        report.total_duration_ms
    );

    if let Some(ref cb) = config.progress_callback {
        cb.on_batch_complete(&report);
    }
    Ok(report)
}

/// Synchronous wrapper around [`run_batch`].
///
/// Creates a temporary tokio runtime internally.
pub fn run_batch_sync(
    config: &PipelineConfig,
    service: &dyn RecognitionService,
    converter: &ConverterCapability,
) -> Result<BatchReport, Pdf2TexError> {
    tokio::runtime::Runtime::new()
        .map_err(|e| Pdf2TexError::Internal(format!("Failed to create tokio runtime: {}", e)))?
        .block_on(run_batch(config, service, converter))
}

/// Drive one document through the whole pipeline.
///
/// Never fails: the outcome, including any error, is recorded on the
/// returned [`PipelineRun`].
pub async fn process_document(
    path: &Path,
    config: &PipelineConfig,
    service: &dyn RecognitionService,
    converter: &ConverterCapability,
) -> PipelineRun {
    let start = Instant::now();
    let base = input::document_base_name(path);
    let mut run = PipelineRun::new(
        path.to_path_buf(),
        base.clone(),
        config.document_output_dir(&base),
    );
    let name = display_name(path);
    info!("Processing {} ...", name);

    match drive(&mut run, config, service, converter).await {
        Ok(()) => {
            if let Some(ref cb) = config.progress_callback {
                cb.on_document_complete(&run);
            }
        }
        Err(e) => {
            let msg = e.to_string();
            warn!("Error processing {}: {}", name, msg);
            run.error = Some(msg.clone());
            transition(&mut run, DocumentState::Failed, config);
            if let Some(ref cb) = config.progress_callback {
                cb.on_document_error(&name, &msg);
            }
        }
    }

    run.duration_ms = start.elapsed().as_millis() as u64;
    run
}

async fn drive(
    run: &mut PipelineRun,
    config: &PipelineConfig,
    service: &dyn RecognitionService,
    converter: &ConverterCapability,
) -> Result<(), DocumentError> {
    let name = display_name(&run.source);

    // ── Discovered → Submitted ───────────────────────────────────────────
    let bytes = input::read_document(&run.source).await?;
    transition(run, DocumentState::Submitted, config);

    // ── Submitted → Recognized ───────────────────────────────────────────
    let mut result = service
        .recognize(&name, bytes)
        .await
        .map_err(|e| DocumentError::Recognition {
            document: name.clone(),
            source: e,
        })?;
    run.page_count = result.pages.len();

    let output_dir = run.output_dir.clone();
    create_dir(&output_dir).await?;
    let snapshot_path = output_dir.join(&config.snapshot_file_name);
    write_snapshot(&result, &snapshot_path, &run.base_name).await?;
    info!("OCR response saved in {}", snapshot_path.display());
    transition(run, DocumentState::Recognized, config);

    // The raw response only feeds the snapshot.
    result.raw = None;

    // ── Recognized → Assembled ───────────────────────────────────────────
    let images_dir = output_dir.join(&config.images_dir_name);
    reset_dir(&images_dir).await?;
    let document = rebuild(result, &run.base_name, &images_dir, config).await?;
    run.image_count = document.images.len();
    transition(run, DocumentState::Assembled, config);

    // ── Assembled → Persisted ────────────────────────────────────────────
    let markdown_path = output_dir.join(&config.markdown_file_name);
    write_atomic(&markdown_path, &document.text).await?;
    info!("Markdown generated in {}", markdown_path.display());
    run.markdown_path = Some(markdown_path.clone());
    transition(run, DocumentState::Persisted, config);

    // ── Persisted → Converted (best effort) ──────────────────────────────
    if let ConverterCapability::Available { program, .. } = converter {
        let latex_dir = config.latex_output_dir(&run.base_name);
        match latex::convert_to_latex(program, &markdown_path, &images_dir, &latex_dir, &run.base_name)
            .await
        {
            Ok(tex_path) => {
                run.latex_path = Some(tex_path);
                run.converted = true;
                transition(run, DocumentState::Converted, config);
            }
            Err(e) => {
                warn!("LaTeX conversion failed for {}: {}", name, e);
                run.conversion_error = Some(e.to_string());
            }
        }
    }

    // ── → Archived (always last) ─────────────────────────────────────────
    let archived = archive::archive_input(&run.source, &config.done_dir).await?;
    run.archived_path = Some(archived);
    transition(run, DocumentState::Archived, config);

    if run.converted {
        info!("Complete pipeline successful for {}", name);
    }
    Ok(())
}

/// Run extraction + rewriting + assembly off the async worker threads.
async fn rebuild(
    result: RecognitionResult,
    base_name: &str,
    images_dir: &Path,
    config: &PipelineConfig,
) -> Result<AssembledDocument, DocumentError> {
    let base = base_name.to_string();
    let dir = images_dir.to_path_buf();
    let dir_name = config.images_dir_name.clone();
    let fallback = config.fallback_image_extension.clone();

    tokio::task::spawn_blocking(move || {
        let target = ExtractTarget {
            base_name: &base,
            images_dir: &dir,
            images_dir_name: &dir_name,
            fallback_extension: &fallback,
        };
        assemble::rebuild_document(&result, &target)
    })
    .await
    .map_err(|e| DocumentError::Internal {
        document: base_name.to_string(),
        detail: format!("rebuild task panicked: {e}"),
    })?
}

fn transition(run: &mut PipelineRun, next: DocumentState, config: &PipelineConfig) {
    let name = display_name(&run.source);
    info!("{}: {} → {}", name, run.state, next);
    run.state = next;
    if let Some(ref cb) = config.progress_callback {
        cb.on_state_change(&name, next);
    }
}

fn display_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

async fn create_dir(dir: &Path) -> Result<(), DocumentError> {
    tokio::fs::create_dir_all(dir)
        .await
        .map_err(|e| write_failed(dir, e))
}

/// Recreate `dir` empty so a re-run never leaves stale images behind.
async fn reset_dir(dir: &Path) -> Result<(), DocumentError> {
    if tokio::fs::try_exists(dir).await.unwrap_or(false) {
        tokio::fs::remove_dir_all(dir)
            .await
            .map_err(|e| write_failed(dir, e))?;
    }
    create_dir(dir).await
}

async fn write_snapshot(
    result: &RecognitionResult,
    path: &Path,
    document: &str,
) -> Result<(), DocumentError> {
    let snapshot_failed = |detail: String| DocumentError::SnapshotFailed {
        document: document.to_string(),
        detail,
    };
    let json = result
        .snapshot_json()
        .map_err(|e| snapshot_failed(e.to_string()))?;

    let target = path.to_path_buf();
    tokio::task::spawn_blocking(move || persist_snapshot(&target, json.as_bytes()))
        .await
        .map_err(|e| DocumentError::Internal {
            document: document.to_string(),
            detail: format!("snapshot task panicked: {e}"),
        })?
}

/// Stage next to the target so the final persist is a same-filesystem rename.
fn persist_snapshot(path: &Path, contents: &[u8]) -> Result<(), DocumentError> {
    let dir = path.parent().unwrap_or_else(|| Path::new("."));
    let mut tmp = tempfile::NamedTempFile::new_in(dir).map_err(|e| write_failed(path, e))?;
    tmp.write_all(contents).map_err(|e| write_failed(path, e))?;
    tmp.persist(path).map_err(|e| write_failed(path, e.error))?;
    Ok(())
}

/// Atomic write: write to a sibling temp file, then rename.
async fn write_atomic(path: &Path, contents: &str) -> Result<(), DocumentError> {
    let tmp_path: PathBuf = path.with_extension("md.tmp");
    tokio::fs::write(&tmp_path, contents)
        .await
        .map_err(|e| write_failed(path, e))?;
    tokio::fs::rename(&tmp_path, path)
        .await
        .map_err(|e| write_failed(path, e))
}

fn write_failed(path: &Path, source: std::io::Error) -> DocumentError {
    DocumentError::WriteFailed {
        path: path.to_path_buf(),
        source,
    }
}
