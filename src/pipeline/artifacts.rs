//! Artifact naming and atomic file writes.
//!
//! Every file of a run lands in one directory and is named after the PDF
//! stem and the 1-indexed page number:
//!
//! ```text
//! {stem}_page_{n}.png
//! {stem}_page_{n}_text.txt
//! {stem}_page_{n}_score_and_comment.md
//! {stem}_page_{n}_score_and_comment.docx
//! ```
//!
//! Writes go to a sibling `.tmp` file first and are renamed into place, so an
//! interrupted run never leaves a truncated report behind.

use crate::error::GradeError;
use std::path::{Path, PathBuf};
use tracing::debug;

const TEXT_SUFFIX: &str = "_text";
const REPORT_SUFFIX: &str = "_score_and_comment";

/// Where the files of one document go.
#[derive(Debug, Clone)]
pub struct ArtifactLayout {
    dir: PathBuf,
    stem: String,
}

impl ArtifactLayout {
    pub fn new(dir: impl Into<PathBuf>, stem: impl Into<String>) -> Self {
        Self {
            dir: dir.into(),
            stem: stem.into(),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn page_base(&self, page_num: usize) -> String {
        format!("{}_page_{}", self.stem, page_num)
    }

    pub fn page_image(&self, page_num: usize) -> PathBuf {
        self.dir.join(format!("{}.png", self.page_base(page_num)))
    }

    pub fn page_transcript(&self, page_num: usize) -> PathBuf {
        self.dir
            .join(format!("{}{}.txt", self.page_base(page_num), TEXT_SUFFIX))
    }

    pub fn report_markdown(&self, page_num: usize) -> PathBuf {
        self.dir
            .join(format!("{}{}.md", self.page_base(page_num), REPORT_SUFFIX))
    }

    pub fn report_docx(&self, page_num: usize) -> PathBuf {
        self.dir
            .join(format!("{}{}.docx", self.page_base(page_num), REPORT_SUFFIX))
    }
}

/// Report paths (`.md`, `.docx`) for a standalone text file.
///
/// A transcript named `hw_page_2_text.txt` maps to
/// `hw_page_2_score_and_comment.{md,docx}` in `out_dir`, matching what a
/// full run would have produced for that page.
pub fn report_paths_for_text(text_path: &Path, out_dir: &Path) -> (PathBuf, PathBuf) {
    let stem = text_path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "text".to_string());
    let base = stem.strip_suffix(TEXT_SUFFIX).unwrap_or(&stem);
    (
        out_dir.join(format!("{base}{REPORT_SUFFIX}.md")),
        out_dir.join(format!("{base}{REPORT_SUFFIX}.docx")),
    )
}

fn write_failed(path: &Path, source: std::io::Error) -> GradeError {
    GradeError::OutputWriteFailed {
        path: path.to_path_buf(),
        source,
    }
}

/// Write `bytes` to `path` via a temp file and rename.
pub async fn write_atomic(path: &Path, bytes: &[u8]) -> Result<(), GradeError> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(|e| write_failed(path, e))?;
    }

    let tmp_path = tmp_sibling(path);
    tokio::fs::write(&tmp_path, bytes)
        .await
        .map_err(|e| write_failed(path, e))?;
    if let Err(e) = tokio::fs::rename(&tmp_path, path).await {
        let _ = tokio::fs::remove_file(&tmp_path).await;
        return Err(write_failed(path, e));
    }

    debug!("Wrote {} ({} bytes)", path.display(), bytes.len());
    Ok(())
}

fn tmp_sibling(path: &Path) -> PathBuf {
    let ext = path
        .extension()
        .map(|e| format!("{}.tmp", e.to_string_lossy()))
        .unwrap_or_else(|| "tmp".to_string());
    path.with_extension(ext)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn page_artifact_names() {
        let layout = ArtifactLayout::new("output", "homework");
        assert_eq!(layout.page_image(1), PathBuf::from("output/homework_page_1.png"));
        assert_eq!(
            layout.page_transcript(1),
            PathBuf::from("output/homework_page_1_text.txt")
        );
        assert_eq!(
            layout.report_markdown(12),
            PathBuf::from("output/homework_page_12_score_and_comment.md")
        );
        assert_eq!(
            layout.report_docx(12),
            PathBuf::from("output/homework_page_12_score_and_comment.docx")
        );
    }

    #[test]
    fn text_file_maps_to_page_report() {
        let (md, docx) = report_paths_for_text(Path::new("output/hw_page_2_text.txt"), Path::new("out"));
        assert_eq!(md, PathBuf::from("out/hw_page_2_score_and_comment.md"));
        assert_eq!(docx, PathBuf::from("out/hw_page_2_score_and_comment.docx"));

        let (md, _) = report_paths_for_text(Path::new("essay.txt"), Path::new("."));
        assert_eq!(md, PathBuf::from("./essay_score_and_comment.md"));
    }

    #[test]
    fn tmp_sibling_keeps_extension() {
        assert_eq!(
            tmp_sibling(Path::new("out/a.docx")),
            PathBuf::from("out/a.docx.tmp")
        );
    }

    #[tokio::test]
    async fn write_atomic_creates_parents() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("nested/deeper/report.md");

        write_atomic(&path, "### 原文\n".as_bytes())
            .await
            .expect("write");

        assert_eq!(std::fs::read_to_string(&path).expect("read"), "### 原文\n");
        assert!(!tmp_sibling(&path).exists());
    }

    #[tokio::test]
    async fn failed_rename_removes_temp_file() {
        let dir = tempfile::tempdir().expect("tempdir");
        // A non-empty directory cannot be replaced by a file.
        let target = dir.path().join("report.docx");
        std::fs::create_dir(&target).expect("mkdir");
        std::fs::write(target.join("keep"), b"x").expect("write");

        let err = write_atomic(&target, b"PK").await.expect_err("target is a directory");
        assert!(matches!(err, GradeError::OutputWriteFailed { .. }));
        assert!(!tmp_sibling(&target).exists());
        assert!(target.join("keep").exists());
    }
}
