//! # pdf2grade
//!
//! Grade scanned, handwritten homework: transcribe each PDF page with a
//! vision model, score the essay against a rubric with a language model, and
//! hand back the commentary as a Word document.
//!
//! ## Pipeline Overview
//!
//! ```text
//! PDF
//!  │
//!  ├─ 1. Input       resolve local file or download from URL
//!  ├─ 2. Render      rasterise pages via pdfium at 300 DPI (spawn_blocking)
//!  ├─ 3. Transcribe  vision model reads the handwriting → _text.txt
//!  ├─ 4. Score       rubric (3 × 0–5 points) + commentary → _score_and_comment.md
//!  └─ 5. Report      Markdown classifier + docx writer → _score_and_comment.docx
//! ```
//!
//! The report step is pure and usable on its own: [`parse`] turns the
//! model's Markdown into [`Block`]s and [`markdown_to_docx_bytes`] lays them
//! out with a fixed 宋体 12 pt body style.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use pdf2grade::{grade, GradingConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // Provider auto-detected from OPENAI_API_KEY / ANTHROPIC_API_KEY / GEMINI_API_KEY
//!     let config = GradingConfig::default();
//!     let output = grade("homework.pdf", &config).await?;
//!     eprintln!("graded {} of {} pages",
//!         output.stats.processed_pages,
//!         output.pages.len());
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `pdf2grade` binary (clap + anyhow + tracing-subscriber + indicatif) |
//!
//! Disable `cli` when using only the library:
//! ```toml
//! pdf2grade = { version = "0.1", default-features = false }
//! ```

// ── Modules ──────────────────────────────────────────────────────────────

pub mod config;
pub mod docx;
pub mod error;
pub mod grade;
pub mod markdown;
pub mod output;
pub mod pipeline;
pub mod progress;
pub mod prompts;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use config::{GradingConfig, GradingConfigBuilder, PageSelection, PageSeparator};
pub use docx::{markdown_to_docx_bytes, render_blocks, DocumentSink, DocxWriter};
pub use error::{GradeError, PageError};
pub use grade::{grade, grade_sync, inspect, score_text, transcribe};
pub use markdown::{parse, Block, Run};
pub use output::{
    Assessment, DocumentMetadata, GradingOutput, GradingStats, PageArtifacts, PageReport,
    PageTranscript, TranscriptionOutput,
};
pub use pipeline::report::markdown_to_docx;
pub use progress::{GradingProgressCallback, NoopProgressCallback, ProgressCallback, Stage};
