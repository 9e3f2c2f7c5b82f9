//! Progress-callback trait for per-page grading events.
//!
//! Inject an [`Arc<dyn GradingProgressCallback>`] via
//! [`crate::config::GradingConfigBuilder::progress_callback`] to follow a run
//! page by page. The CLI uses it to drive its progress bar; library callers
//! can forward events anywhere.
//!
//! ```rust
//! use pdf2grade::{GradingConfig, GradingProgressCallback, Stage};
//! use std::sync::Arc;
//!
//! struct Log;
//!
//! impl GradingProgressCallback for Log {
//!     fn on_stage(&self, page_num: usize, stage: Stage) {
//!         eprintln!("page {page_num}: {stage}");
//!     }
//! }
//!
//! let config = GradingConfig::builder()
//!     .progress_callback(Arc::new(Log))
//!     .build()
//!     .unwrap();
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// The step a page is currently in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Stage {
    /// Vision model is reading the handwriting.
    Transcribing,
    /// Language model is scoring the transcript.
    Scoring,
    /// Report Markdown and `.docx` are being written.
    Writing,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Stage::Transcribing => "transcribing",
            Stage::Scoring => "scoring",
            Stage::Writing => "writing report",
        };
        f.write_str(s)
    }
}

/// Called by the grading pipeline as it works through the pages.
///
/// All methods default to no-ops. With `concurrency > 1` the per-page
/// methods may be called from several tasks at once.
pub trait GradingProgressCallback: Send + Sync {
    /// Called once, after page selection, before any LLM call.
    fn on_run_start(&self, total_pages: usize) {
        let _ = total_pages;
    }

    fn on_page_start(&self, page_num: usize, total_pages: usize) {
        let _ = (page_num, total_pages);
    }

    /// Called when a page enters a new stage.
    fn on_stage(&self, page_num: usize, stage: Stage) {
        let _ = (page_num, stage);
    }

    fn on_page_complete(&self, page_num: usize, total_pages: usize) {
        let _ = (page_num, total_pages);
    }

    fn on_page_error(&self, page_num: usize, total_pages: usize, error: &str) {
        let _ = (page_num, total_pages, error);
    }

    /// Called once after every page has been attempted.
    fn on_run_complete(&self, total_pages: usize, success_count: usize) {
        let _ = (total_pages, success_count);
    }
}

/// A callback that ignores every event.
pub struct NoopProgressCallback;

impl GradingProgressCallback for NoopProgressCallback {}

/// The type stored in [`crate::config::GradingConfig`].
pub type ProgressCallback = Arc<dyn GradingProgressCallback>;
