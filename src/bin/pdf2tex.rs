//! CLI binary for edgequake-pdf2tex.
//!
//! A thin shim over the library crate that maps CLI flags to
//! `PipelineConfig`, runs one batch and prints a per-document summary.

use anyhow::{Context, Result};
use clap::Parser;
use edgequake_pdf2tex::pipeline::input::discover_inputs;
use edgequake_pdf2tex::pipeline::recognize::require_api_key;
use edgequake_pdf2tex::{
    detect_converter, run_batch, BatchProgressCallback, BatchReport, ConverterCapability,
    DocumentState, MistralOcrClient, PipelineConfig, PipelineRun, ProgressCallback,
};
use indicatif::{ProgressBar, ProgressStyle};
use std::io;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;
use tracing_subscriber::EnvFilter;

// ── ANSI colour helpers (no extra deps) ──────────────────────────────────────

fn green(s: &str) -> String {
    format!("\x1b[32m{s}\x1b[0m")
}
fn red(s: &str) -> String {
    format!("\x1b[31m{s}\x1b[0m")
}
fn dim(s: &str) -> String {
    format!("\x1b[2m{s}\x1b[0m")
}
fn bold(s: &str) -> String {
    format!("\x1b[1m{s}\x1b[0m")
}
fn cyan(s: &str) -> String {
    format!("\x1b[36m{s}\x1b[0m")
}

// ── CLI progress callback using indicatif ────────────────────────────────────

/// Terminal progress callback: one bar over the documents of the batch, a
/// spinner message tracking the current document's state.
struct CliProgressCallback {
    bar: ProgressBar,
}

impl CliProgressCallback {
    fn new() -> Arc<Self> {
        let bar = ProgressBar::new(0);
        let style = ProgressStyle::with_template(
            "{spinner:.cyan} {prefix:.bold}  \
             [{bar:42.green/238}] {pos:>3}/{len} documents  \
             ⏱ {elapsed_precise}  {msg}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("█▉▊▋▌▍▎▏  ")
        .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"]);

        bar.set_style(style);
        bar.set_prefix("Processing");
        bar.enable_steady_tick(Duration::from_millis(80));
        Arc::new(Self { bar })
    }
}

impl BatchProgressCallback for CliProgressCallback {
    fn on_batch_start(&self, total_documents: usize) {
        self.bar.set_length(total_documents as u64);
        self.bar.println(format!(
            "{} {}",
            cyan("◆"),
            bold(&format!("Processing {total_documents} PDFs…"))
        ));
    }

    fn on_document_start(&self, _index: usize, _total: usize, document: &str) {
        self.bar.set_message(format!("{document}: reading"));
    }

    fn on_state_change(&self, document: &str, state: DocumentState) {
        let label = match state {
            DocumentState::Submitted => "waiting for OCR",
            DocumentState::Recognized => "extracting images",
            DocumentState::Assembled => "writing Markdown",
            DocumentState::Persisted => "converting to LaTeX",
            DocumentState::Converted => "archiving",
            DocumentState::Archived | DocumentState::Failed | DocumentState::Discovered => return,
        };
        self.bar.set_message(format!("{document}: {label}"));
    }

    fn on_document_complete(&self, run: &PipelineRun) {
        let latex = if run.converted { "md + tex" } else { "md" };
        self.bar.println(format!(
            "  {} {:<40}  {}  {}",
            green("✓"),
            run.source
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default(),
            dim(&format!("{:>3} pages  {:>3} images  {latex}", run.page_count, run.image_count)),
            dim(&format!("{:.1}s", run.duration_ms as f64 / 1000.0)),
        ));
        self.bar.inc(1);
    }

    fn on_document_error(&self, document: &str, error: &str) {
        // Truncate very long error messages to keep output tidy.
        let first_line = error.lines().next().unwrap_or(error);
        let msg = if first_line.chars().count() > 80 {
            let cut: String = first_line.chars().take(79).collect();
            format!("{cut}\u{2026}")
        } else {
            first_line.to_string()
        };
        self.bar.println(format!("  {} {:<40}  {}", red("✗"), document, red(&msg)));
        self.bar.inc(1);
    }

    fn on_batch_complete(&self, _report: &BatchReport) {
        self.bar.finish_and_clear();
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Process everything in ./pdfs_to_process
  pdf2tex

  # Custom folders
  pdf2tex --input-dir inbox --output-dir out/md --latex-dir out/tex

  # Markdown only, even when pandoc is installed
  pdf2tex --no-latex

  # List what would be processed (no API key needed)
  pdf2tex --list

  # Machine-readable report
  pdf2tex --json > report.json

LAYOUT:
  pdfs_to_process/          put PDFs here
  pdfs-done/                processed PDFs are moved here
  ocr_output/<name>/        output.md, images/, ocr_response.json
  latex_output/<name>/      <name>.tex, images/

ENVIRONMENT VARIABLES:
  MISTRAL_API_KEY         Mistral API key (required; also read from .env)
  MISTRAL_API_BASE        Override the API base URL
  RUST_LOG                Override the log filter

SETUP:
  1. Get a free API key at https://console.mistral.ai/api-keys
  2. echo MISTRAL_API_KEY=... > .env
  3. Optional: install pandoc for LaTeX output (https://pandoc.org/installing.html)
"#;

/// Convert PDFs to Markdown with extracted images, then to LaTeX.
#[derive(Parser, Debug)]
#[command(
    name = "pdf2tex",
    version,
    about = "Convert PDFs to Markdown (with extracted images) via Mistral OCR, then to LaTeX via pandoc",
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// Directory scanned for PDFs.
    #[arg(long, env = "PDF2TEX_INPUT_DIR", default_value = "pdfs_to_process")]
    input_dir: PathBuf,

    /// Directory processed PDFs are moved to.
    #[arg(long, env = "PDF2TEX_DONE_DIR", default_value = "pdfs-done")]
    done_dir: PathBuf,

    /// Root directory for Markdown output.
    #[arg(long, env = "PDF2TEX_OUTPUT_DIR", default_value = "ocr_output")]
    output_dir: PathBuf,

    /// Root directory for LaTeX output.
    #[arg(long, env = "PDF2TEX_LATEX_DIR", default_value = "latex_output")]
    latex_dir: PathBuf,

    /// OCR model ID.
    #[arg(long, env = "PDF2TEX_MODEL", default_value = edgequake_pdf2tex::config::DEFAULT_MODEL)]
    model: String,

    /// Mistral API key.
    #[arg(long, env = "MISTRAL_API_KEY", hide_env_values = true)]
    api_key: Option<String>,

    /// Converter executable used for Markdown → LaTeX.
    #[arg(long, env = "PDF2TEX_CONVERTER", default_value = "pandoc")]
    converter: String,

    /// Skip the LaTeX stage.
    #[arg(long, env = "PDF2TEX_NO_LATEX")]
    no_latex: bool,

    /// Extension for images whose id carries none.
    #[arg(long, env = "PDF2TEX_FALLBACK_EXT", default_value = ".png")]
    fallback_ext: String,

    /// Lifetime of the signed upload URL, in hours.
    #[arg(long, env = "PDF2TEX_URL_EXPIRY", default_value_t = 1)]
    url_expiry_hours: u32,

    /// List discovered PDFs and exit.
    #[arg(long)]
    list: bool,

    /// Print the batch report as JSON on stdout.
    #[arg(long, env = "PDF2TEX_JSON")]
    json: bool,

    /// Disable progress bar.
    #[arg(long, env = "PDF2TEX_NO_PROGRESS")]
    no_progress: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, env = "PDF2TEX_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, env = "PDF2TEX_QUIET")]
    quiet: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    // `.env` must be loaded before clap reads `env = ...` fallbacks.
    let _ = dotenvy::dotenv();
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // Suppress INFO-level library logs when the progress bar is active;
    // the bar provides all the feedback that matters to the user.
    let show_progress = !cli.quiet && !cli.no_progress && !cli.json && !cli.list;
    let filter = if cli.verbose {
        "debug"
    } else if cli.quiet || show_progress {
        "error"
    } else {
        "info"
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(io::stderr)
        .init();

    // ── List-only mode ───────────────────────────────────────────────────
    if cli.list {
        let inputs = discover_inputs(&cli.input_dir).context("Failed to list input PDFs")?;
        if inputs.is_empty() {
            eprintln!("No PDFs to process.");
        }
        for path in inputs {
            println!("{}", path.display());
        }
        return Ok(());
    }

    // ── Credential ───────────────────────────────────────────────────────
    let api_key = require_api_key(cli.api_key.as_deref())?;

    let progress_cb: Option<ProgressCallback> = if show_progress {
        Some(CliProgressCallback::new() as Arc<dyn BatchProgressCallback>)
    } else {
        None
    };
    let config = build_config(&cli, progress_cb)?;

    let client = MistralOcrClient::new(api_key, &config.model)
        .with_expiry_hours(config.signed_url_expiry_hours)
        .with_base_url_from_env();
    info!("Loaded API Key: {}", client.masked_key());

    // ── Converter capability (resolved once) ─────────────────────────────
    let converter = detect_converter(&config.converter_program, config.convert_to_latex).await;
    if !cli.quiet && !cli.json {
        if let ConverterCapability::Unavailable { reason, .. } = &converter {
            eprintln!("{} {}", cyan("⚠"), reason);
            eprintln!("   Continuing with PDF to Markdown conversion only.");
            eprintln!("   {}", dim(edgequake_pdf2tex::pipeline::latex::INSTALL_HINT));
        }
    }

    // ── Run batch ────────────────────────────────────────────────────────
    let report = run_batch(&config, &client, &converter)
        .await
        .context("Batch failed")?;

    if cli.json {
        let json = serde_json::to_string_pretty(&report).context("Failed to serialise report")?;
        println!("{json}");
    } else if !cli.quiet {
        print_summary(&report);
    }

    Ok(())
}

/// Map CLI args to `PipelineConfig`.
fn build_config(cli: &Cli, progress: Option<ProgressCallback>) -> Result<PipelineConfig> {
    let mut builder = PipelineConfig::builder()
        .input_dir(&cli.input_dir)
        .done_dir(&cli.done_dir)
        .output_dir(&cli.output_dir)
        .latex_dir(&cli.latex_dir)
        .model(&cli.model)
        .converter_program(&cli.converter)
        .convert_to_latex(!cli.no_latex)
        .fallback_image_extension(&cli.fallback_ext)
        .signed_url_expiry_hours(cli.url_expiry_hours);

    if let Some(cb) = progress {
        builder = builder.progress_callback(cb);
    }

    builder.build().context("Invalid configuration")
}

/// Final per-document summary: output locations or failure reason.
fn print_summary(report: &BatchReport) {
    if report.runs.is_empty() {
        eprintln!("No PDFs to process.");
        return;
    }

    for run in &report.runs {
        let name = run
            .source
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        if run.is_success() {
            eprintln!("{} {}", green("✔"), bold(&name));
            if let Some(ref md) = run.markdown_path {
                eprintln!("   Markdown: {}", md.display());
            }
            if let Some(ref tex) = run.latex_path {
                eprintln!("   LaTeX:    {}", tex.display());
            }
            if let Some(ref err) = run.conversion_error {
                eprintln!("   {} {}", cyan("LaTeX skipped:"), err);
            }
        } else {
            eprintln!("{} {}", red("✘"), bold(&name));
            eprintln!(
                "   {}",
                red(run.error.as_deref().unwrap_or("unknown error"))
            );
        }
    }

    let failed = report.failure_count();
    eprintln!(
        "{}  {}/{} documents  {}ms",
        if failed == 0 { green("✔") } else { cyan("⚠") },
        report.success_count(),
        report.runs.len(),
        report.total_duration_ms,
    );
}
