//! Markdown → LaTeX through an external converter (pandoc).
//!
//! The converter is optional. [`detect_converter`] probes it once per batch
//! and the resulting [`ConverterCapability`] is passed to the orchestrator;
//! a missing tool only disables this stage.
//!
//! Output layout for a document `paper`:
//!
//! ```text
//! latex_output/paper/paper.tex
//! latex_output/paper/images/   copy of ocr_output/paper/images
//! ```

use crate::config::ConverterCapability;
use crate::error::ConverterError;
use std::path::{Path, PathBuf};
use tokio::process::Command;
use tracing::{debug, info, warn};

pub const INSTALL_HINT: &str = "Install instructions: https://pandoc.org/installing.html";

/// Probe `program --version`.
pub async fn detect_converter(program: &str, enabled: bool) -> ConverterCapability {
    if !enabled {
        info!("LaTeX conversion disabled; producing Markdown only");
        return ConverterCapability::Disabled;
    }

    match Command::new(program).arg("--version").output().await {
        Ok(output) if output.status.success() => {
            let version = String::from_utf8_lossy(&output.stdout)
                .lines()
                .next()
                .unwrap_or_default()
                .trim()
                .to_string();
            info!("{} is installed ({}). Will convert Markdown to LaTeX.", program, version);
            ConverterCapability::Available {
                program: program.to_string(),
                version,
            }
        }
        Ok(output) => {
            let reason = format!("'{program} --version' exited with {}", output.status);
            warn!("{}. Continuing with PDF to Markdown conversion only. {}", reason, INSTALL_HINT);
            ConverterCapability::Unavailable {
                program: program.to_string(),
                reason,
            }
        }
        Err(e) => {
            let reason = format!("'{program}' not found in PATH: {e}");
            warn!("{}. Continuing with PDF to Markdown conversion only. {}", reason, INSTALL_HINT);
            ConverterCapability::Unavailable {
                program: program.to_string(),
                reason,
            }
        }
    }
}

/// Arguments passed to the converter for one document.
pub fn converter_args(markdown_path: &Path, tex_path: &Path) -> Vec<String> {
    vec![
        markdown_path.display().to_string(),
        "--standalone".to_string(),
        "--from=markdown".to_string(),
        "--to=latex".to_string(),
        format!("--output={}", tex_path.display()),
    ]
}

/// Convert a persisted Markdown document into `latex_dir/<base>.tex`.
///
/// The images directory is copied next to the `.tex` file first, replacing
/// any copy a previous run left there.
pub async fn convert_to_latex(
    program: &str,
    markdown_path: &Path,
    images_dir: &Path,
    latex_dir: &Path,
    base_name: &str,
) -> Result<PathBuf, ConverterError> {
    let prepare_failed = |path: &Path, e: std::io::Error| ConverterError::PrepareFailed {
        path: path.to_path_buf(),
        detail: e.to_string(),
    };

    tokio::fs::create_dir_all(latex_dir)
        .await
        .map_err(|e| prepare_failed(latex_dir, e))?;

    let images_name = images_dir.file_name().unwrap_or_default();
    let latex_images = latex_dir.join(images_name);
    if tokio::fs::try_exists(&latex_images).await.unwrap_or(false) {
        debug!("Replacing previous image copy in {}", latex_images.display());
        tokio::fs::remove_dir_all(&latex_images)
            .await
            .map_err(|e| prepare_failed(&latex_images, e))?;
    }
    copy_dir(images_dir, &latex_images)
        .await
        .map_err(|e| prepare_failed(&latex_images, e))?;

    let tex_path = latex_dir.join(format!("{base_name}.tex"));
    info!("Converting {} to LaTeX...", markdown_path.display());

    let output = Command::new(program)
        .args(converter_args(markdown_path, &tex_path))
        .output()
        .await
        .map_err(|e| ConverterError::Spawn {
            program: program.to_string(),
            detail: e.to_string(),
        })?;

    if !output.status.success() {
        return Err(ConverterError::Failed {
            program: program.to_string(),
            status: output.status.to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        });
    }

    info!("LaTeX file successfully generated: {}", tex_path.display());
    Ok(tex_path)
}

/// Copy the regular files of `from` into a new directory `to`.
async fn copy_dir(from: &Path, to: &Path) -> std::io::Result<()> {
    tokio::fs::create_dir_all(to).await?;
    let mut entries = tokio::fs::read_dir(from).await?;
    while let Some(entry) = entries.next_entry().await? {
        if entry.file_type().await?.is_file() {
            tokio::fs::copy(entry.path(), to.join(entry.file_name())).await?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn args_follow_pandoc_convention() {
        let args = converter_args(Path::new("out/doc/output.md"), Path::new("tex/doc/doc.tex"));
        assert_eq!(
            args,
            vec![
                "out/doc/output.md",
                "--standalone",
                "--from=markdown",
                "--to=latex",
                "--output=tex/doc/doc.tex",
            ]
        );
    }

    #[tokio::test]
    async fn disabled_skips_probe() {
        let cap = detect_converter("definitely-not-a-real-binary", false).await;
        assert_eq!(cap, ConverterCapability::Disabled);
    }

    #[tokio::test]
    async fn missing_program_is_unavailable() {
        let cap = detect_converter("definitely-not-a-real-binary-3f9a", true).await;
        assert!(matches!(cap, ConverterCapability::Unavailable { .. }));
    }

    #[tokio::test]
    async fn copy_dir_copies_files() {
        let tmp = tempfile::tempdir().unwrap();
        let src = tmp.path().join("src");
        std::fs::create_dir(&src).unwrap();
        std::fs::write(src.join("a.png"), b"a").unwrap();
        std::fs::write(src.join("b.jpeg"), b"b").unwrap();

        let dst = tmp.path().join("dst");
        copy_dir(&src, &dst).await.unwrap();
        assert_eq!(std::fs::read(dst.join("a.png")).unwrap(), b"a");
        assert_eq!(std::fs::read(dst.join("b.jpeg")).unwrap(), b"b");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn failing_converter_reports_status() {
        let tmp = tempfile::tempdir().unwrap();
        let md = tmp.path().join("output.md");
        std::fs::write(&md, "# hi").unwrap();
        let images = tmp.path().join("images");
        std::fs::create_dir(&images).unwrap();

        let err = convert_to_latex("false", &md, &images, &tmp.path().join("tex"), "doc")
            .await
            .unwrap_err();
        assert!(matches!(err, ConverterError::Failed { .. }), "got: {err}");
        // Images are prepared before the converter runs.
        assert!(tmp.path().join("tex/images").is_dir());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn rerun_replaces_previous_image_copy() {
        let tmp = tempfile::tempdir().unwrap();
        let md = tmp.path().join("output.md");
        std::fs::write(&md, "![a](images/doc_img_1.png)").unwrap();
        let images = tmp.path().join("images");
        let tex_dir = tmp.path().join("tex");

        std::fs::create_dir(&images).unwrap();
        std::fs::write(images.join("doc_img_1.png"), b"OLD").unwrap();
        std::fs::write(images.join("doc_img_2.png"), b"OLD").unwrap();
        let _ = convert_to_latex("true", &md, &images, &tex_dir, "doc").await;

        std::fs::remove_dir_all(&images).unwrap();
        std::fs::create_dir(&images).unwrap();
        std::fs::write(images.join("doc_img_1.png"), b"NEW").unwrap();
        let _ = convert_to_latex("true", &md, &images, &tex_dir, "doc").await;

        assert_eq!(std::fs::read(tex_dir.join("images/doc_img_1.png")).unwrap(), b"NEW");
        assert!(!tex_dir.join("images/doc_img_2.png").exists());
    }
}
