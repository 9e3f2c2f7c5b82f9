//! Configuration types for a grading run.
//!
//! Every knob lives in [`GradingConfig`], built through
//! [`GradingConfigBuilder`]. The config is created once per run and passed
//! down explicitly; the LLM provider it names is resolved per run as well, so
//! there is no process-wide client.

use crate::error::GradeError;
use crate::progress::ProgressCallback;
use edgequake_llm::LLMProvider;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

/// Upper bound for [`GradingConfigBuilder::max_retries`].
pub const MAX_RETRIES: u32 = 10;

/// Configuration for transcribing, scoring and reporting on PDF pages.
///
/// # Example
/// ```rust
/// use pdf2grade::GradingConfig;
///
/// let config = GradingConfig::builder()
///     .dpi(200)
///     .output_dir("graded")
///     .model("gpt-4.1-mini")
///     .build()
///     .unwrap();
/// assert_eq!(config.dpi, 200);
/// ```
#[derive(Clone)]
pub struct GradingConfig {
    /// Rendering DPI for each page. Range: 72–600. Default: 300.
    ///
    /// Handwriting needs more pixels than print; 300 DPI keeps pencil strokes
    /// legible to the vision model.
    pub dpi: u32,

    /// Cap on the longest rendered edge in pixels. Default: 3000.
    pub max_rendered_pixels: u32,

    /// Pages processed at once. Default: 1 (one page at a time, in order).
    pub concurrency: usize,

    /// LLM model identifier. If None, uses the provider default.
    pub model: Option<String>,

    /// LLM provider name (e.g. "openai", "anthropic", "gemini").
    pub provider_name: Option<String>,

    /// Pre-constructed LLM provider. Takes precedence over `provider_name`.
    pub provider: Option<Arc<dyn LLMProvider>>,

    /// Sampling temperature for both LLM calls. Default: 0.1.
    pub temperature: f32,

    /// Maximum tokens per LLM response. Default: 4096.
    pub max_tokens: usize,

    /// Retry attempts on a failed LLM call. Default: 3, at most
    /// [`MAX_RETRIES`].
    pub max_retries: u32,

    /// Initial retry delay in milliseconds, doubled per attempt. Default: 500.
    pub retry_backoff_ms: u64,

    /// Per-LLM-call timeout in seconds. Default: 120.
    pub api_timeout_secs: u64,

    /// Download timeout for URL inputs in seconds. Default: 120.
    pub download_timeout_secs: u64,

    /// PDF user password for encrypted documents.
    pub password: Option<String>,

    /// Override for the handwriting transcription prompt.
    pub transcription_prompt: Option<String>,

    /// Override for the scoring rubric prompt.
    pub scoring_prompt: Option<String>,

    /// Page selection. Default: all pages.
    pub pages: PageSelection,

    /// Separator between pages in a combined transcript. Default: horizontal rule.
    pub page_separator: PageSeparator,

    /// Directory receiving every artifact. Default: `output`.
    pub output_dir: PathBuf,

    /// Keep the rendered page PNGs next to the text artifacts. Default: true.
    pub save_images: bool,

    /// Append the transcribed essay under its own heading at the end of the
    /// report. Default: true.
    pub append_source_text: bool,

    /// Heading text for the appended essay. Default: `原文`.
    pub source_heading: String,

    /// Receives per-page progress events.
    pub progress_callback: Option<ProgressCallback>,
}

impl Default for GradingConfig {
    fn default() -> Self {
        Self {
            dpi: 300,
            max_rendered_pixels: 3000,
            concurrency: 1,
            model: None,
            provider_name: None,
            provider: None,
            temperature: 0.1,
            max_tokens: 4096,
            max_retries: 3,
            retry_backoff_ms: 500,
            api_timeout_secs: 120,
            download_timeout_secs: 120,
            password: None,
            transcription_prompt: None,
            scoring_prompt: None,
            pages: PageSelection::default(),
            page_separator: PageSeparator::default(),
            output_dir: PathBuf::from("output"),
            save_images: true,
            append_source_text: true,
            source_heading: "原文".to_string(),
            progress_callback: None,
        }
    }
}

impl fmt::Debug for GradingConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GradingConfig")
            .field("dpi", &self.dpi)
            .field("max_rendered_pixels", &self.max_rendered_pixels)
            .field("concurrency", &self.concurrency)
            .field("model", &self.model)
            .field("provider_name", &self.provider_name)
            .field("provider", &self.provider.as_ref().map(|_| "<dyn LLMProvider>"))
            .field("temperature", &self.temperature)
            .field("max_tokens", &self.max_tokens)
            .field("max_retries", &self.max_retries)
            .field("pages", &self.pages)
            .field("output_dir", &self.output_dir)
            .field("save_images", &self.save_images)
            .field("append_source_text", &self.append_source_text)
            .finish()
    }
}

impl GradingConfig {
    /// Create a new builder for `GradingConfig`.
    pub fn builder() -> GradingConfigBuilder {
        GradingConfigBuilder {
            config: Self::default(),
        }
    }
}

/// Builder for [`GradingConfig`].
pub struct GradingConfigBuilder {
    config: GradingConfig,
}

impl GradingConfigBuilder {
    pub fn dpi(mut self, dpi: u32) -> Self {
        self.config.dpi = dpi.clamp(72, 600);
        self
    }

    pub fn max_rendered_pixels(mut self, px: u32) -> Self {
        self.config.max_rendered_pixels = px.max(100);
        self
    }

    pub fn concurrency(mut self, n: usize) -> Self {
        self.config.concurrency = n.max(1);
        self
    }

    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.config.model = Some(model.into());
        self
    }

    pub fn provider_name(mut self, name: impl Into<String>) -> Self {
        self.config.provider_name = Some(name.into());
        self
    }

    pub fn provider(mut self, provider: Arc<dyn LLMProvider>) -> Self {
        self.config.provider = Some(provider);
        self
    }

    pub fn temperature(mut self, t: f32) -> Self {
        self.config.temperature = t.clamp(0.0, 2.0);
        self
    }

    pub fn max_tokens(mut self, n: usize) -> Self {
        self.config.max_tokens = n;
        self
    }

    pub fn max_retries(mut self, n: u32) -> Self {
        self.config.max_retries = n.min(MAX_RETRIES);
        self
    }

    pub fn retry_backoff_ms(mut self, ms: u64) -> Self {
        self.config.retry_backoff_ms = ms;
        self
    }

    pub fn api_timeout_secs(mut self, secs: u64) -> Self {
        self.config.api_timeout_secs = secs;
        self
    }

    pub fn download_timeout_secs(mut self, secs: u64) -> Self {
        self.config.download_timeout_secs = secs;
        self
    }

    pub fn password(mut self, pwd: impl Into<String>) -> Self {
        self.config.password = Some(pwd.into());
        self
    }

    pub fn transcription_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.config.transcription_prompt = Some(prompt.into());
        self
    }

    pub fn scoring_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.config.scoring_prompt = Some(prompt.into());
        self
    }

    pub fn pages(mut self, selection: PageSelection) -> Self {
        self.config.pages = selection;
        self
    }

    pub fn page_separator(mut self, sep: PageSeparator) -> Self {
        self.config.page_separator = sep;
        self
    }

    pub fn output_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.output_dir = dir.into();
        self
    }

    pub fn save_images(mut self, v: bool) -> Self {
        self.config.save_images = v;
        self
    }

    pub fn append_source_text(mut self, v: bool) -> Self {
        self.config.append_source_text = v;
        self
    }

    pub fn source_heading(mut self, heading: impl Into<String>) -> Self {
        self.config.source_heading = heading.into();
        self
    }

    pub fn progress_callback(mut self, cb: ProgressCallback) -> Self {
        self.config.progress_callback = Some(cb);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<GradingConfig, GradeError> {
        let c = &self.config;
        if c.dpi < 72 || c.dpi > 600 {
            return Err(GradeError::InvalidConfig(format!(
                "DPI must be 72–600, got {}",
                c.dpi
            )));
        }
        if c.concurrency == 0 {
            return Err(GradeError::InvalidConfig("Concurrency must be ≥ 1".into()));
        }
        if c.api_timeout_secs == 0 {
            return Err(GradeError::InvalidConfig(
                "API timeout must be at least 1 second".into(),
            ));
        }
        if c.append_source_text && c.source_heading.trim().is_empty() {
            return Err(GradeError::InvalidConfig(
                "Source heading must not be empty when the essay is appended".into(),
            ));
        }
        Ok(self.config)
    }
}

// ── Enums ────────────────────────────────────────────────────────────────

/// Specifies which pages of the PDF to process.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum PageSelection {
    /// Every page (default).
    #[default]
    All,
    /// A single page (1-indexed).
    Single(usize),
    /// A contiguous range (1-indexed, inclusive).
    Range(usize, usize),
    /// Specific pages (1-indexed, deduplicated).
    Set(Vec<usize>),
}

impl PageSelection {
    /// Expand the selection into a sorted, deduplicated list of 0-indexed pages.
    pub fn to_indices(&self, total_pages: usize) -> Vec<usize> {
        let mut indices: Vec<usize> = match self {
            PageSelection::All => (0..total_pages).collect(),
            PageSelection::Single(p) => {
                if *p >= 1 && *p <= total_pages {
                    vec![p - 1]
                } else {
                    vec![]
                }
            }
            PageSelection::Range(start, end) => {
                let s = (*start).max(1) - 1;
                let e = (*end).min(total_pages);
                (s..e).collect()
            }
            PageSelection::Set(pages) => pages
                .iter()
                .filter(|&&p| p >= 1 && p <= total_pages)
                .map(|p| p - 1)
                .collect(),
        };
        indices.sort_unstable();
        indices.dedup();
        indices
    }
}

/// How pages are separated in a combined transcript.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum PageSeparator {
    /// Blank line only.
    None,
    /// `---` between pages (default).
    #[default]
    HorizontalRule,
    /// Custom string on its own paragraph.
    Custom(String),
}

impl PageSeparator {
    pub fn render(&self) -> String {
        match self {
            PageSeparator::None => "\n\n".to_string(),
            PageSeparator::HorizontalRule => "\n\n---\n\n".to_string(),
            PageSeparator::Custom(s) => format!("\n\n{}\n\n", s),
        }
    }
}
