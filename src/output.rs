//! Result types returned by the grading entry points.
//!
//! All of them derive `Serialize` so the CLI can dump a run as JSON.

use crate::error::PageError;
use serde::Serialize;
use std::path::PathBuf;

/// Metadata read from the PDF's info dictionary.
#[derive(Debug, Clone, Default, Serialize)]
pub struct DocumentMetadata {
    pub title: Option<String>,
    pub author: Option<String>,
    pub subject: Option<String>,
    pub creator: Option<String>,
    pub producer: Option<String>,
    pub creation_date: Option<String>,
    pub modification_date: Option<String>,
    pub page_count: usize,
    pub pdf_version: String,
}

/// The handwriting transcript of one page.
#[derive(Debug, Clone, Default, Serialize)]
pub struct PageTranscript {
    /// 1-indexed page number.
    pub page_num: usize,
    /// Cleaned transcript. Empty when `error` is set.
    pub text: String,
    pub input_tokens: usize,
    pub output_tokens: usize,
    pub duration_ms: u64,
    pub retries: u8,
    pub error: Option<PageError>,
}

/// A scored report for one piece of text.
#[derive(Debug, Clone, Default, Serialize)]
pub struct Assessment {
    /// The model's commentary, after cleanup.
    pub commentary: String,
    /// Commentary plus the optional source-text appendix; what the `.md` and
    /// `.docx` artifacts contain.
    pub report: String,
    pub input_tokens: usize,
    pub output_tokens: usize,
    pub retries: u8,
}

/// Files written for one page. `None` means the file was not produced.
#[derive(Debug, Clone, Default, Serialize)]
pub struct PageArtifacts {
    pub image: Option<PathBuf>,
    pub transcript: Option<PathBuf>,
    pub report_markdown: Option<PathBuf>,
    pub report_docx: Option<PathBuf>,
}

/// Everything produced for one page of a grading run.
#[derive(Debug, Clone, Default, Serialize)]
pub struct PageReport {
    pub page_num: usize,
    pub transcript: String,
    /// Empty when the page failed before scoring finished.
    pub report: String,
    pub artifacts: PageArtifacts,
    /// Tokens across both LLM calls.
    pub input_tokens: usize,
    pub output_tokens: usize,
    pub duration_ms: u64,
    /// Retries across both LLM calls.
    pub retries: u8,
    pub error: Option<PageError>,
}

impl PageReport {
    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }
}

/// Aggregate numbers for a run.
#[derive(Debug, Clone, Default, Serialize)]
pub struct GradingStats {
    /// Pages in the document.
    pub total_pages: usize,
    pub processed_pages: usize,
    pub failed_pages: usize,
    /// Selected pages that were never attempted because pdfium did not
    /// return them.
    pub skipped_pages: usize,
    pub total_input_tokens: u64,
    pub total_output_tokens: u64,
    pub total_duration_ms: u64,
    pub render_duration_ms: u64,
    /// Wall time of the per-page stage: model calls plus artifact writes.
    pub llm_duration_ms: u64,
}

/// Result of [`crate::grade`].
#[derive(Debug, Clone, Serialize)]
pub struct GradingOutput {
    /// One entry per selected page, in page order.
    pub pages: Vec<PageReport>,
    pub metadata: DocumentMetadata,
    pub stats: GradingStats,
}

impl GradingOutput {
    /// Pages that produced a report.
    pub fn graded(&self) -> impl Iterator<Item = &PageReport> {
        self.pages.iter().filter(|p| p.is_success())
    }
}

/// Result of [`crate::transcribe`].
#[derive(Debug, Clone, Serialize)]
pub struct TranscriptionOutput {
    /// Successful page transcripts joined with the configured separator.
    pub text: String,
    pub pages: Vec<PageTranscript>,
    pub metadata: DocumentMetadata,
    pub stats: GradingStats,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn graded_skips_failed_pages() {
        let ok = PageReport {
            page_num: 1,
            report: "### 一：评分环节".into(),
            ..Default::default()
        };
        let failed = PageReport {
            page_num: 2,
            error: Some(PageError::RenderFailed {
                page: 2,
                detail: "blank bitmap".into(),
            }),
            ..Default::default()
        };
        let out = GradingOutput {
            pages: vec![ok, failed],
            metadata: DocumentMetadata::default(),
            stats: GradingStats::default(),
        };
        let graded: Vec<usize> = out.graded().map(|p| p.page_num).collect();
        assert_eq!(graded, vec![1]);
    }

    #[test]
    fn page_report_serialises_paths() {
        let report = PageReport {
            page_num: 1,
            artifacts: PageArtifacts {
                report_docx: Some(PathBuf::from("output/hw_page_1_score_and_comment.docx")),
                ..Default::default()
            },
            ..Default::default()
        };
        let json = serde_json::to_string(&report).expect("serialise");
        assert!(json.contains("hw_page_1_score_and_comment.docx"));
        assert!(json.contains("\"error\":null"));
    }
}
