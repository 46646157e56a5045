//! Batch-level integration tests.
//!
//! The recognition service is replaced by a scripted in-memory
//! implementation, so these tests exercise the whole pipeline (discovery,
//! extraction, rewriting, assembly, persistence, conversion, archiving)
//! without any network access.

use async_trait::async_trait;
use edgequake_pdf2tex::{
    run_batch, BatchProgressCallback, ConverterCapability, DocumentState, EmbeddedImage, Page,
    PipelineConfig, RecognitionError, RecognitionResult, RecognitionService,
};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

// ── Test helpers ─────────────────────────────────────────────────────────────

const JPEG_B64: &str = "data:image/jpeg;base64,/9j/4AAQSkZJRg==";
const PNG_B64: &str = "data:image/png;base64,iVBORw0KGgo=";

/// Returns a canned result (or error) per input file name.
#[derive(Default)]
struct ScriptedService {
    responses: HashMap<String, Result<RecognitionResult, u16>>,
    calls: Mutex<Vec<String>>,
}

impl ScriptedService {
    fn with(mut self, file: &str, result: RecognitionResult) -> Self {
        self.responses.insert(file.to_string(), Ok(result));
        self
    }

    fn failing(mut self, file: &str, status: u16) -> Self {
        self.responses.insert(file.to_string(), Err(status));
        self
    }

    fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl RecognitionService for ScriptedService {
    async fn recognize(
        &self,
        file_name: &str,
        bytes: Vec<u8>,
    ) -> Result<RecognitionResult, RecognitionError> {
        assert!(bytes.starts_with(b"%PDF"), "service must receive raw PDF bytes");
        self.calls.lock().unwrap().push(file_name.to_string());
        match self.responses.get(file_name) {
            Some(Ok(result)) => Ok(result.clone()),
            Some(Err(status)) => Err(RecognitionError::Api {
                stage: "ocr",
                status: *status,
                body: "scripted failure".into(),
            }),
            None => Err(RecognitionError::Transport {
                stage: "ocr",
                detail: format!("no script for {file_name}"),
            }),
        }
    }
}

fn setup() -> (tempfile::TempDir, PipelineConfig) {
    let tmp = tempfile::tempdir().unwrap();
    let config = PipelineConfig::builder().root(tmp.path()).build().unwrap();
    config.ensure_directories().unwrap();
    (tmp, config)
}

fn add_pdf(config: &PipelineConfig, name: &str) -> PathBuf {
    let path = config.input_dir.join(name);
    std::fs::write(&path, b"%PDF-1.7\n%%EOF\n").unwrap();
    path
}

fn files_in(dir: &Path) -> Vec<String> {
    let mut names: Vec<String> = std::fs::read_dir(dir)
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
        .collect();
    names.sort();
    names
}

/// A page with `n` images named `img-0.png`, `img-1.png`, … referenced inline.
fn page_with_images(n: usize) -> Page {
    let images: Vec<EmbeddedImage> = (0..n)
        .map(|i| EmbeddedImage::new(format!("img-{i}.png"), PNG_B64))
        .collect();
    let markdown = images
        .iter()
        .map(|img| format!("![{0}]({0})", img.id))
        .collect::<Vec<_>>()
        .join("\n\n");
    Page::new(markdown, images)
}

fn two_page_document() -> RecognitionResult {
    RecognitionResult {
        pages: vec![
            Page::new(
                "# Title\n\nSee img-0.jpeg below.\n\n![img-0.jpeg](img-0.jpeg)",
                vec![EmbeddedImage::new("img-0.jpeg", JPEG_B64)],
            ),
            Page::new("Second page.", vec![]),
        ],
        ..Default::default()
    }
}

// ── Scenarios ────────────────────────────────────────────────────────────────

#[tokio::test]
async fn end_to_end_two_page_document() {
    let (_tmp, config) = setup();
    let src = add_pdf(&config, "report.pdf");
    let service = ScriptedService::default().with("report.pdf", two_page_document());

    let report = run_batch(&config, &service, &ConverterCapability::Disabled)
        .await
        .unwrap();

    assert_eq!(report.runs.len(), 1);
    let run = &report.runs[0];
    assert_eq!(run.state, DocumentState::Archived, "error: {:?}", run.error);
    assert_eq!(run.page_count, 2);
    assert_eq!(run.image_count, 1);

    let out = config.output_dir.join("report");
    assert_eq!(files_in(&out.join("images")), vec!["report_img_1.jpeg"]);

    let md = std::fs::read_to_string(out.join("output.md")).unwrap();
    assert_eq!(
        md,
        "# Title\n\nSee img-0.jpeg below.\n\n![img-0.jpeg](images/report_img_1.jpeg)\n\nSecond page."
    );
    assert_eq!(md.matches("](images/").count(), 1);

    let snapshot: RecognitionResult =
        serde_json::from_str(&std::fs::read_to_string(out.join("ocr_response.json")).unwrap())
            .unwrap();
    assert_eq!(snapshot, two_page_document());

    assert!(!src.exists());
    assert!(config.done_dir.join("report.pdf").exists());
}

#[tokio::test]
async fn failure_is_isolated_to_one_document() {
    let (_tmp, config) = setup();
    add_pdf(&config, "doc1.pdf");
    let doc2 = add_pdf(&config, "doc2.pdf");
    add_pdf(&config, "doc3.pdf");

    let service = ScriptedService::default()
        .with("doc1.pdf", two_page_document())
        .failing("doc2.pdf", 500)
        .with("doc3.pdf", two_page_document());

    let report = run_batch(&config, &service, &ConverterCapability::Disabled)
        .await
        .unwrap();

    assert_eq!(service.calls(), vec!["doc1.pdf", "doc2.pdf", "doc3.pdf"]);
    let states: Vec<DocumentState> = report.runs.iter().map(|r| r.state).collect();
    assert_eq!(
        states,
        vec![
            DocumentState::Archived,
            DocumentState::Failed,
            DocumentState::Archived
        ]
    );
    assert_eq!(report.success_count(), 2);
    assert_eq!(report.failure_count(), 1);

    let failed = &report.runs[1];
    assert!(failed.error.as_deref().unwrap().contains("doc2.pdf"));
    assert!(doc2.exists(), "failed input must stay in the input directory");
    assert_eq!(files_in(&config.input_dir), vec!["doc2.pdf"]);
    assert_eq!(files_in(&config.done_dir), vec!["doc1.pdf", "doc3.pdf"]);
}

#[tokio::test]
async fn counter_continues_across_pages() {
    let (_tmp, config) = setup();
    add_pdf(&config, "book.pdf");
    let result = RecognitionResult {
        pages: vec![page_with_images(2), page_with_images(0), page_with_images(3)],
        ..Default::default()
    };
    let service = ScriptedService::default().with("book.pdf", result);

    let report = run_batch(&config, &service, &ConverterCapability::Disabled)
        .await
        .unwrap();
    assert_eq!(report.runs[0].image_count, 5);

    let images = config.output_dir.join("book/images");
    assert_eq!(
        files_in(&images),
        vec![
            "book_img_1.png",
            "book_img_2.png",
            "book_img_3.png",
            "book_img_4.png",
            "book_img_5.png",
        ]
    );

    let md = std::fs::read_to_string(config.output_dir.join("book/output.md")).unwrap();
    assert_eq!(
        md,
        "![img-0.png](images/book_img_1.png)\n\n![img-1.png](images/book_img_2.png)\
         \n\n\n\n\
         ![img-0.png](images/book_img_3.png)\n\n![img-1.png](images/book_img_4.png)\n\n![img-2.png](images/book_img_5.png)"
    );
}

#[tokio::test]
async fn malformed_image_fails_only_that_document() {
    let (_tmp, config) = setup();
    let bad = add_pdf(&config, "a_bad.pdf");
    add_pdf(&config, "b_good.pdf");
    let broken = RecognitionResult {
        pages: vec![Page::new(
            "![img-0.png](img-0.png)",
            vec![EmbeddedImage::new("img-0.png", "data:image/png;base64,***")],
        )],
        ..Default::default()
    };
    let service = ScriptedService::default()
        .with("a_bad.pdf", broken)
        .with("b_good.pdf", two_page_document());

    let report = run_batch(&config, &service, &ConverterCapability::Disabled)
        .await
        .unwrap();

    assert_eq!(report.runs[0].state, DocumentState::Failed);
    assert!(report.runs[0].error.as_deref().unwrap().contains("img-0.png"));
    assert!(bad.exists());
    assert_eq!(report.runs[1].state, DocumentState::Archived);
}

#[tokio::test]
async fn empty_input_directory_yields_empty_report() {
    let (_tmp, config) = setup();
    let service = ScriptedService::default();
    let report = run_batch(&config, &service, &ConverterCapability::Disabled)
        .await
        .unwrap();
    assert!(report.runs.is_empty());
    assert!(service.calls().is_empty());
}

/// Records whether the input was still in place and the Markdown already
/// written at each state transition.
struct ArchiveOrderProbe {
    input: PathBuf,
    markdown: PathBuf,
    seen: Mutex<Vec<(DocumentState, bool, bool)>>,
}

impl BatchProgressCallback for ArchiveOrderProbe {
    fn on_state_change(&self, _document: &str, state: DocumentState) {
        self.seen
            .lock()
            .unwrap()
            .push((state, self.input.exists(), self.markdown.exists()));
    }
}

#[tokio::test]
async fn input_is_archived_only_after_outputs_exist() {
    let tmp = tempfile::tempdir().unwrap();
    let root = tmp.path();
    let probe = Arc::new(ArchiveOrderProbe {
        input: root.join("pdfs_to_process/doc.pdf"),
        markdown: root.join("ocr_output/doc/output.md"),
        seen: Mutex::new(Vec::new()),
    });
    let config = PipelineConfig::builder()
        .root(root)
        .progress_callback(probe.clone())
        .build()
        .unwrap();
    config.ensure_directories().unwrap();
    add_pdf(&config, "doc.pdf");
    let service = ScriptedService::default().with("doc.pdf", two_page_document());

    run_batch(&config, &service, &ConverterCapability::Disabled)
        .await
        .unwrap();

    let seen = probe.seen.lock().unwrap().clone();
    assert_eq!(
        seen,
        vec![
            (DocumentState::Submitted, true, false),
            (DocumentState::Recognized, true, false),
            (DocumentState::Assembled, true, false),
            (DocumentState::Persisted, true, true),
            (DocumentState::Archived, false, true),
        ]
    );
}

#[cfg(unix)]
fn write_script(dir: &Path, name: &str, body: &str) -> String {
    use std::os::unix::fs::PermissionsExt;
    let path = dir.join(name);
    std::fs::write(&path, format!("#!/bin/sh\n{body}\n")).unwrap();
    std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
    path.display().to_string()
}

#[cfg(unix)]
#[tokio::test]
async fn converter_failure_keeps_document_successful() {
    let (tmp, config) = setup();
    add_pdf(&config, "doc.pdf");
    let program = write_script(tmp.path(), "broken-pandoc", "echo boom >&2\nexit 3");
    let converter = ConverterCapability::Available {
        program,
        version: "broken 0.0".into(),
    };
    let service = ScriptedService::default().with("doc.pdf", two_page_document());

    let report = run_batch(&config, &service, &converter).await.unwrap();
    let run = &report.runs[0];

    assert_eq!(run.state, DocumentState::Archived);
    assert!(!run.converted);
    assert!(run.latex_path.is_none());
    assert!(run.conversion_error.as_deref().unwrap().contains("boom"));
    assert!(config.done_dir.join("doc.pdf").exists());
}

#[cfg(unix)]
#[tokio::test]
async fn converter_success_writes_tex_and_copies_images() {
    let (tmp, config) = setup();
    add_pdf(&config, "doc.pdf");
    let program = write_script(
        tmp.path(),
        "fake-pandoc",
        r#"for a in "$@"; do case "$a" in --output=*) echo '\documentclass{article}' > "${a#--output=}";; esac; done"#,
    );
    let converter = ConverterCapability::Available {
        program,
        version: "fake 1.0".into(),
    };
    let service = ScriptedService::default().with("doc.pdf", two_page_document());

    let report = run_batch(&config, &service, &converter).await.unwrap();
    let run = &report.runs[0];

    assert_eq!(run.state, DocumentState::Archived, "error: {:?}", run.error);
    assert!(run.converted);
    let tex = config.latex_dir.join("doc/doc.tex");
    assert_eq!(run.latex_path.as_deref(), Some(tex.as_path()));
    assert!(std::fs::read_to_string(&tex).unwrap().contains("documentclass"));
    assert_eq!(
        files_in(&config.latex_dir.join("doc/images")),
        vec!["doc_img_1.jpeg"]
    );
}

#[cfg(unix)]
#[tokio::test]
async fn rerun_refreshes_latex_image_copy() {
    let (tmp, config) = setup();
    let program = write_script(tmp.path(), "fake-pandoc", "exit 0");
    let converter = ConverterCapability::Available {
        program,
        version: "fake 1.0".into(),
    };
    let single_image = |payload: &str| RecognitionResult {
        pages: vec![Page::new(
            "![img-0.png](img-0.png)",
            vec![EmbeddedImage::new("img-0.png", payload)],
        )],
        ..Default::default()
    };

    // "OLD" and "NEW" in base64.
    add_pdf(&config, "doc.pdf");
    let first = ScriptedService::default().with("doc.pdf", single_image("T0xE"));
    run_batch(&config, &first, &converter).await.unwrap();

    add_pdf(&config, "doc.pdf");
    let second = ScriptedService::default().with("doc.pdf", single_image("TkVX"));
    let report = run_batch(&config, &second, &converter).await.unwrap();
    assert_eq!(report.runs[0].state, DocumentState::Archived, "error: {:?}", report.runs[0].error);

    let md_copy = config.output_dir.join("doc/images/doc_img_1.png");
    let tex_copy = config.latex_dir.join("doc/images/doc_img_1.png");
    assert_eq!(std::fs::read(md_copy).unwrap(), b"NEW");
    assert_eq!(std::fs::read(tex_copy).unwrap(), b"NEW");
}
