//! Top-level entry points: grade, transcribe, score, inspect.
//!
//! A grading run resolves the input, binds a provider, rasterises the
//! selected pages once, then walks them in page order with at most
//! `concurrency` pages in flight. Each page is transcribed, scored and
//! written independently; a page that fails is recorded in its
//! [`PageReport`] and the run carries on.

use crate::config::GradingConfig;
use crate::docx::markdown_to_docx_bytes;
use crate::error::{GradeError, PageError};
use crate::output::{
    Assessment, DocumentMetadata, GradingOutput, GradingStats, PageReport, PageTranscript,
    TranscriptionOutput,
};
use crate::pipeline::artifacts::{write_atomic, ArtifactLayout};
use crate::pipeline::input::{self, ResolvedInput};
use crate::pipeline::render::{self, RenderedPage};
use crate::pipeline::{encode, llm, postprocess, report};
use crate::progress::Stage;
use edgequake_llm::{ImageData, LLMProvider, ProviderFactory};
use futures::stream::{self, StreamExt};
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

/// Model used when a provider is named without one.
pub const DEFAULT_MODEL: &str = "gpt-4.1-mini";

/// Transcribe, score and report on every selected page of a PDF.
///
/// Artifacts land in `config.output_dir`. Returns `Ok` as long as at least
/// one page was graded; check `output.stats.failed_pages`.
///
/// # Errors
/// Fatal problems only: unreadable input, no provider, no pdfium, an
/// unwritable output directory, or every page failing.
///
/// # Example
/// ```rust,no_run
/// use pdf2grade::{grade, GradingConfig};
///
/// # #[tokio::main]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let config = GradingConfig::builder().output_dir("graded").build()?;
/// let output = grade("homework.pdf", &config).await?;
/// for page in output.graded() {
///     println!("{:?}", page.artifacts.report_docx);
/// }
/// # Ok(())
/// # }
/// ```
pub async fn grade(
    input_str: impl AsRef<str>,
    config: &GradingConfig,
) -> Result<GradingOutput, GradeError> {
    let total_start = Instant::now();
    let run = prepare(input_str.as_ref(), config).await?;
    let total = run.rendered.len();

    let llm_start = Instant::now();
    let pages: Vec<PageReport> = stream::iter(run.rendered.into_iter().map(|(idx, image)| {
        grade_page(&run.provider, idx + 1, image, &run.layout, config, total)
    }))
    .buffered(config.concurrency)
    .collect()
    .await;
    let llm_duration_ms = llm_start.elapsed().as_millis() as u64;

    let processed = pages.iter().filter(|p| p.is_success()).count();
    let errors: Vec<&PageError> = pages.iter().filter_map(|p| p.error.as_ref()).collect();
    fail_if_nothing_succeeded(processed, &errors, config)?;

    let stats = GradingStats {
        total_pages: run.metadata.page_count,
        processed_pages: processed,
        failed_pages: errors.len(),
        skipped_pages: run.selected.saturating_sub(pages.len()),
        total_input_tokens: pages.iter().map(|p| p.input_tokens as u64).sum(),
        total_output_tokens: pages.iter().map(|p| p.output_tokens as u64).sum(),
        total_duration_ms: total_start.elapsed().as_millis() as u64,
        render_duration_ms: run.render_duration_ms,
        llm_duration_ms,
    };

    info!(
        "Grading complete: {}/{} pages, {}ms total",
        processed, run.selected, stats.total_duration_ms
    );
    if let Some(ref cb) = config.progress_callback {
        cb.on_run_complete(run.selected, processed);
    }

    Ok(GradingOutput {
        pages,
        metadata: run.metadata,
        stats,
    })
}

/// Synchronous wrapper around [`grade`].
///
/// Creates a temporary tokio runtime internally.
pub fn grade_sync(
    input_str: impl AsRef<str>,
    config: &GradingConfig,
) -> Result<GradingOutput, GradeError> {
    tokio::runtime::Runtime::new()
        .map_err(|e| GradeError::Internal(format!("Failed to create tokio runtime: {}", e)))?
        .block_on(grade(input_str, config))
}

/// Transcribe the selected pages without scoring them.
///
/// Writes `{stem}_page_{n}_text.txt` (and the page PNGs when
/// `save_images` is on) and returns the transcripts joined with the
/// configured page separator.
pub async fn transcribe(
    input_str: impl AsRef<str>,
    config: &GradingConfig,
) -> Result<TranscriptionOutput, GradeError> {
    let total_start = Instant::now();
    let run = prepare(input_str.as_ref(), config).await?;
    let total = run.rendered.len();

    let llm_start = Instant::now();
    let pages: Vec<PageTranscript> = stream::iter(run.rendered.into_iter().map(|(idx, image)| {
        transcribe_only(&run.provider, idx + 1, image, &run.layout, config, total)
    }))
    .buffered(config.concurrency)
    .collect()
    .await;
    let llm_duration_ms = llm_start.elapsed().as_millis() as u64;

    let processed = pages.iter().filter(|p| p.error.is_none()).count();
    let errors: Vec<&PageError> = pages.iter().filter_map(|p| p.error.as_ref()).collect();
    fail_if_nothing_succeeded(processed, &errors, config)?;

    let separator = config.page_separator.render();
    let text = pages
        .iter()
        .filter(|p| p.error.is_none())
        .map(|p| p.text.trim_end())
        .collect::<Vec<_>>()
        .join(&separator);

    let stats = GradingStats {
        total_pages: run.metadata.page_count,
        processed_pages: processed,
        failed_pages: errors.len(),
        skipped_pages: run.selected.saturating_sub(pages.len()),
        total_input_tokens: pages.iter().map(|p| p.input_tokens as u64).sum(),
        total_output_tokens: pages.iter().map(|p| p.output_tokens as u64).sum(),
        total_duration_ms: total_start.elapsed().as_millis() as u64,
        render_duration_ms: run.render_duration_ms,
        llm_duration_ms,
    };

    if let Some(ref cb) = config.progress_callback {
        cb.on_run_complete(run.selected, processed);
    }

    Ok(TranscriptionOutput {
        text: format!("{}\n", text),
        pages,
        metadata: run.metadata,
        stats,
    })
}

/// Score one essay and build its report. Writes nothing.
///
/// The returned [`Assessment::report`] includes the essay under
/// `config.source_heading` when `config.append_source_text` is on.
pub async fn score_text(text: &str, config: &GradingConfig) -> Result<Assessment, GradeError> {
    if text.trim().is_empty() {
        return Err(GradeError::InvalidInput {
            input: "empty essay text".to_string(),
        });
    }
    let provider = resolve_provider(config).await?;
    let completion = llm::score(&provider, text, config, "Scoring").await?;
    Ok(assessment_from(completion, text, config))
}

/// Read PDF metadata. Needs no LLM provider or API key.
pub async fn inspect(input_str: impl AsRef<str>) -> Result<DocumentMetadata, GradeError> {
    let resolved = input::resolve_input(input_str.as_ref(), 120).await?;
    render::extract_metadata(resolved.path(), None).await
}

// ── Internal helpers ─────────────────────────────────────────────────────

/// Everything a run needs before the first page reaches the model.
struct PreparedRun {
    // Keeps a downloaded PDF's temp dir alive for the whole run.
    _input: ResolvedInput,
    provider: Arc<dyn LLMProvider>,
    metadata: DocumentMetadata,
    selected: usize,
    rendered: Vec<RenderedPage>,
    layout: ArtifactLayout,
    render_duration_ms: u64,
}

async fn prepare(input_str: &str, config: &GradingConfig) -> Result<PreparedRun, GradeError> {
    info!("Starting grading run: {}", input_str);

    let resolved = input::resolve_input(input_str, config.download_timeout_secs).await?;
    let provider = resolve_provider(config).await?;

    let metadata = render::extract_metadata(resolved.path(), config.password.as_deref()).await?;
    let total_pages = metadata.page_count;
    info!("PDF has {} pages", total_pages);

    let page_indices = config.pages.to_indices(total_pages);
    if page_indices.is_empty() {
        return Err(GradeError::PageOutOfRange {
            page: first_requested_page(config),
            total: total_pages,
        });
    }
    debug!("Selected {} pages", page_indices.len());

    if let Some(ref cb) = config.progress_callback {
        cb.on_run_start(page_indices.len());
    }

    tokio::fs::create_dir_all(&config.output_dir)
        .await
        .map_err(|e| GradeError::OutputWriteFailed {
            path: config.output_dir.clone(),
            source: e,
        })?;

    let render_start = Instant::now();
    let rendered = render::render_pages(resolved.path(), config, &page_indices).await?;
    let render_duration_ms = render_start.elapsed().as_millis() as u64;
    info!(
        "Rendered {} pages in {}ms",
        rendered.len(),
        render_duration_ms
    );

    let layout = ArtifactLayout::new(&config.output_dir, resolved.stem());

    Ok(PreparedRun {
        _input: resolved,
        provider,
        metadata,
        selected: page_indices.len(),
        rendered,
        layout,
        render_duration_ms,
    })
}

fn first_requested_page(config: &GradingConfig) -> usize {
    use crate::config::PageSelection;
    match &config.pages {
        PageSelection::All => 0,
        PageSelection::Single(p) => *p,
        PageSelection::Range(start, _) => *start,
        PageSelection::Set(pages) => pages.iter().copied().min().unwrap_or(0),
    }
}

fn fail_if_nothing_succeeded(
    processed: usize,
    errors: &[&PageError],
    config: &GradingConfig,
) -> Result<(), GradeError> {
    if processed > 0 {
        return Ok(());
    }
    let first_error = errors
        .first()
        .map(|e| e.to_string())
        .unwrap_or_else(|| "No page could be rendered".to_string());
    Err(GradeError::AllPagesFailed {
        total: errors.len(),
        retries: config.max_retries,
        first_error,
    })
}

/// Run one page end to end; never fails, errors land in the report.
async fn grade_page(
    provider: &Arc<dyn LLMProvider>,
    page_num: usize,
    image: Result<image::DynamicImage, PageError>,
    layout: &ArtifactLayout,
    config: &GradingConfig,
    total: usize,
) -> PageReport {
    let start = Instant::now();
    if let Some(ref cb) = config.progress_callback {
        cb.on_page_start(page_num, total);
    }

    let mut report = PageReport {
        page_num,
        ..Default::default()
    };
    if let Err(e) = run_page(provider, page_num, image, layout, config, &mut report).await {
        warn!("{}", e);
        report.error = Some(e);
    }
    report.duration_ms = start.elapsed().as_millis() as u64;

    if let Some(ref cb) = config.progress_callback {
        match &report.error {
            None => cb.on_page_complete(page_num, total),
            Some(e) => cb.on_page_error(page_num, total, &e.to_string()),
        }
    }
    report
}

async fn run_page(
    provider: &Arc<dyn LLMProvider>,
    page_num: usize,
    image: Result<image::DynamicImage, PageError>,
    layout: &ArtifactLayout,
    config: &GradingConfig,
    report: &mut PageReport,
) -> Result<(), PageError> {
    let cb = config.progress_callback.as_ref();

    let image_data = store_page_image(page_num, image, layout, config).await?;
    report.artifacts.image = config.save_images.then(|| layout.page_image(page_num));

    if let Some(cb) = cb {
        cb.on_stage(page_num, Stage::Transcribing);
    }
    let transcription = llm::transcribe_page(provider, page_num, image_data, config).await?;
    report.input_tokens += transcription.prompt_tokens;
    report.output_tokens += transcription.completion_tokens;
    report.retries = report.retries.saturating_add(transcription.retries);
    report.transcript = checked_transcript(page_num, &transcription.content)?;

    let transcript_path = layout.page_transcript(page_num);
    write_page_file(page_num, &transcript_path, report.transcript.as_bytes()).await?;
    report.artifacts.transcript = Some(transcript_path);

    if let Some(cb) = cb {
        cb.on_stage(page_num, Stage::Scoring);
    }
    let scored = llm::score_page(provider, page_num, &report.transcript, config).await?;
    report.input_tokens += scored.prompt_tokens;
    report.output_tokens += scored.completion_tokens;
    report.retries = report.retries.saturating_add(scored.retries);
    let assessment = assessment_from(scored, &report.transcript, config);

    if let Some(cb) = cb {
        cb.on_stage(page_num, Stage::Writing);
    }
    let md_path = layout.report_markdown(page_num);
    write_page_file(page_num, &md_path, assessment.report.as_bytes()).await?;
    report.artifacts.report_markdown = Some(md_path);

    let docx_path = layout.report_docx(page_num);
    let docx = markdown_to_docx_bytes(&assessment.report).map_err(|e| PageError::WriteFailed {
        page: page_num,
        path: docx_path.clone(),
        detail: e.to_string(),
    })?;
    write_page_file(page_num, &docx_path, &docx).await?;
    report.artifacts.report_docx = Some(docx_path);

    report.report = assessment.report;
    Ok(())
}

async fn transcribe_only(
    provider: &Arc<dyn LLMProvider>,
    page_num: usize,
    image: Result<image::DynamicImage, PageError>,
    layout: &ArtifactLayout,
    config: &GradingConfig,
    total: usize,
) -> PageTranscript {
    let start = Instant::now();
    let cb = config.progress_callback.as_ref();
    if let Some(cb) = cb {
        cb.on_page_start(page_num, total);
    }

    let mut page = PageTranscript {
        page_num,
        ..Default::default()
    };
    let outcome = async {
        let image_data = store_page_image(page_num, image, layout, config).await?;
        if let Some(cb) = cb {
            cb.on_stage(page_num, Stage::Transcribing);
        }
        let completion = llm::transcribe_page(provider, page_num, image_data, config).await?;
        page.input_tokens = completion.prompt_tokens;
        page.output_tokens = completion.completion_tokens;
        page.retries = completion.retries;
        let text = checked_transcript(page_num, &completion.content)?;

        if let Some(cb) = cb {
            cb.on_stage(page_num, Stage::Writing);
        }
        write_page_file(page_num, &layout.page_transcript(page_num), text.as_bytes()).await?;
        page.text = text;
        Ok::<(), PageError>(())
    }
    .await;

    if let Err(e) = outcome {
        warn!("{}", e);
        page.error = Some(e);
    }
    page.duration_ms = start.elapsed().as_millis() as u64;

    if let Some(cb) = cb {
        match &page.error {
            None => cb.on_page_complete(page_num, total),
            Some(e) => cb.on_page_error(page_num, total, &e.to_string()),
        }
    }
    page
}

/// Encode the rendered page and save its PNG when configured.
async fn store_page_image(
    page_num: usize,
    image: Result<image::DynamicImage, PageError>,
    layout: &ArtifactLayout,
    config: &GradingConfig,
) -> Result<ImageData, PageError> {
    let image = image?;
    let encoded = encode::encode_page(&image).map_err(|e| PageError::RenderFailed {
        page: page_num,
        detail: format!("Image encoding failed: {}", e),
    })?;
    if config.save_images {
        write_page_file(page_num, &layout.page_image(page_num), &encoded.png).await?;
    }
    Ok(encoded.image)
}

fn checked_transcript(page_num: usize, raw: &str) -> Result<String, PageError> {
    let text = postprocess::clean_transcript(raw);
    if text.trim().is_empty() {
        return Err(PageError::LlmFailed {
            page: page_num,
            stage: "transcription".to_string(),
            retries: 0,
            detail: "model returned no text (blank page?)".to_string(),
        });
    }
    Ok(text)
}

fn assessment_from(completion: llm::Completion, essay: &str, config: &GradingConfig) -> Assessment {
    let commentary = postprocess::clean_report(&completion.content);
    let source = config
        .append_source_text
        .then(|| (config.source_heading.as_str(), essay));
    let report = report::compose_report(&commentary, source);
    Assessment {
        commentary,
        report,
        input_tokens: completion.prompt_tokens,
        output_tokens: completion.completion_tokens,
        retries: completion.retries,
    }
}

async fn write_page_file(page_num: usize, path: &Path, bytes: &[u8]) -> Result<(), PageError> {
    write_atomic(path, bytes)
        .await
        .map_err(|e| PageError::WriteFailed {
            page: page_num,
            path: path.to_path_buf(),
            detail: e.to_string(),
        })
}

fn create_provider(provider_name: &str, model: &str) -> Result<Arc<dyn LLMProvider>, GradeError> {
    ProviderFactory::create_llm_provider(provider_name, model).map_err(|e| {
        GradeError::ProviderNotConfigured {
            provider: provider_name.to_string(),
            hint: format!("{e}"),
        }
    })
}

/// Resolve the LLM provider, most specific first.
///
/// 1. **Pre-built provider** (`config.provider`), used as-is.
/// 2. **Named provider** (`config.provider_name` + `config.model`); the
///    factory reads the matching API key from the environment.
/// 3. **Environment pair** (`EDGEQUAKE_LLM_PROVIDER` + `EDGEQUAKE_MODEL`),
///    both non-empty.
/// 4. **`OPENAI_API_KEY`** present: OpenAI with the configured or default
///    model.
/// 5. **Auto-detection** via `ProviderFactory::from_env`.
pub async fn resolve_provider(config: &GradingConfig) -> Result<Arc<dyn LLMProvider>, GradeError> {
    if let Some(ref provider) = config.provider {
        return Ok(Arc::clone(provider));
    }

    let model = config.model.as_deref().unwrap_or(DEFAULT_MODEL);

    if let Some(ref name) = config.provider_name {
        return create_provider(name, model);
    }

    if let (Ok(prov), Ok(env_model)) = (
        std::env::var("EDGEQUAKE_LLM_PROVIDER"),
        std::env::var("EDGEQUAKE_MODEL"),
    ) {
        if !prov.is_empty() && !env_model.is_empty() {
            return create_provider(&prov, &env_model);
        }
    }

    if std::env::var("OPENAI_API_KEY").is_ok_and(|k| !k.is_empty()) {
        return create_provider("openai", model);
    }

    let (llm_provider, _embedding) =
        ProviderFactory::from_env().map_err(|e| GradeError::ProviderNotConfigured {
            provider: "auto".to_string(),
            hint: format!(
                "No LLM provider could be auto-detected from environment.\n\
                Set OPENAI_API_KEY, ANTHROPIC_API_KEY, or configure a provider.\n\
                Error: {}",
                e
            ),
        })?;

    Ok(llm_provider)
}
