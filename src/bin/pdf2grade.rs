//! CLI binary for pdf2grade.
//!
//! A thin shim over the library crate that maps CLI flags to
//! `GradingConfig` and prints results.

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use pdf2grade::pipeline::artifacts::{report_paths_for_text, write_atomic};
use pdf2grade::{
    grade, inspect, markdown_to_docx, score_text, transcribe, GradingConfig, GradingConfigBuilder,
    GradingProgressCallback, PageSelection, PageSeparator, ProgressCallback, Stage,
};
use std::collections::HashMap;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tracing_subscriber::EnvFilter;

// ── ANSI colour helpers ──────────────────────────────────────────────────────

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

const SPINNER_TICKS: &[&str] = &["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"];

// ── CLI progress callback using indicatif ────────────────────────────────────

/// Live progress bar plus one log line per finished page. Pages may finish
/// out of order when `--concurrency` is above 1.
struct CliProgressCallback {
    bar: ProgressBar,
    start_times: Mutex<HashMap<usize, Instant>>,
}

impl CliProgressCallback {
    /// Starts as a spinner; `on_run_start` switches to a bar once the page
    /// count is known.
    fn new_dynamic() -> Arc<Self> {
        let bar = ProgressBar::new(0);
        let spinner_style = ProgressStyle::with_template("{spinner:.cyan} {prefix:.bold}  {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(SPINNER_TICKS);

        bar.set_style(spinner_style);
        bar.set_prefix("Preparing");
        bar.set_message("Opening PDF…");
        bar.enable_steady_tick(Duration::from_millis(80));

        Arc::new(Self {
            bar,
            start_times: Mutex::new(HashMap::new()),
        })
    }

    fn activate_bar(&self, total: usize) {
        let progress_style = ProgressStyle::with_template(
            "{spinner:.cyan} {prefix:.bold}  \
             [{bar:42.green/238}] {pos:>3}/{len} pages  {msg}  \
             ⏱ {elapsed_precise}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("█▉▊▋▌▍▎▏  ")
        .tick_strings(SPINNER_TICKS);

        self.bar.set_length(total as u64);
        self.bar.set_style(progress_style);
        self.bar.set_prefix("Grading");
        self.bar.reset_eta();
    }

    fn elapsed_secs(&self, page_num: usize) -> f64 {
        self.start_times
            .lock()
            .map(|mut m| m.remove(&page_num))
            .ok()
            .flatten()
            .map(|t| t.elapsed().as_secs_f64())
            .unwrap_or(0.0)
    }
}

impl GradingProgressCallback for CliProgressCallback {
    fn on_run_start(&self, total_pages: usize) {
        self.activate_bar(total_pages);
        self.bar.println(format!(
            "{} {}",
            cyan("◆"),
            bold(&format!("Starting on {total_pages} pages…"))
        ));
    }

    fn on_page_start(&self, page_num: usize, _total: usize) {
        if let Ok(mut m) = self.start_times.lock() {
            m.insert(page_num, Instant::now());
        }
        self.bar.set_message(format!("page {page_num}"));
    }

    fn on_stage(&self, page_num: usize, stage: Stage) {
        self.bar.set_message(format!("page {page_num}: {stage}"));
    }

    fn on_page_complete(&self, page_num: usize, total: usize) {
        let secs = self.elapsed_secs(page_num);
        self.bar.println(format!(
            "  {} Page {:>3}/{:<3}  {}",
            green("✓"),
            page_num,
            total,
            dim(&format!("{secs:.1}s")),
        ));
        self.bar.inc(1);
    }

    fn on_page_error(&self, page_num: usize, total: usize, error: &str) {
        let secs = self.elapsed_secs(page_num);

        let msg = if error.chars().count() > 80 {
            format!("{}\u{2026}", error.chars().take(79).collect::<String>())
        } else {
            error.to_string()
        };

        self.bar.println(format!(
            "  {} Page {:>3}/{:<3}  {}  {}",
            red("✗"),
            page_num,
            total,
            red(&msg),
            dim(&format!("{secs:.1}s")),
        ));
        self.bar.inc(1);
    }

    fn on_run_complete(&self, total_pages: usize, success_count: usize) {
        let failed = total_pages.saturating_sub(success_count);
        self.bar.finish_and_clear();

        if failed == 0 {
            eprintln!(
                "{} {} pages done",
                green("✔"),
                bold(&success_count.to_string())
            );
        } else {
            eprintln!(
                "{} {}/{} pages done  ({} failed)",
                if failed == total_pages {
                    red("✘")
                } else {
                    cyan("⚠")
                },
                bold(&success_count.to_string()),
                total_pages,
                red(&failed.to_string()),
            );
        }
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Grade every page: PNG, transcript, Markdown report and .docx per page
  pdf2grade grade homework.pdf

  # Only pages 2-4, into a custom directory
  pdf2grade grade --pages 2-4 --output-dir graded homework.pdf

  # Transcribe only and print the combined text
  pdf2grade ocr homework.pdf > essays.txt

  # Score transcripts that already exist
  pdf2grade score output/homework_page_1_text.txt output/homework_page_2_text.txt

  # Turn any report Markdown into a Word document
  pdf2grade docx report.md -o report.docx

  # Inspect PDF metadata (no API key needed)
  pdf2grade inspect homework.pdf

ENVIRONMENT VARIABLES:
  OPENAI_API_KEY          OpenAI API key
  ANTHROPIC_API_KEY       Anthropic API key
  GEMINI_API_KEY          Google Gemini API key
  EDGEQUAKE_LLM_PROVIDER  Override provider (openai, anthropic, gemini, ollama)
  EDGEQUAKE_MODEL         Override model ID
  PDFIUM_LIB_PATH         Path to libpdfium (file or directory)
  RUST_LOG                Log filter, e.g. pdf2grade=debug

SETUP:
  1. Set API key:     export OPENAI_API_KEY=sk-...
  2. Provide pdfium:  PDFIUM_LIB_PATH, ./libpdfium, or a system install
  3. Grade:           pdf2grade grade homework.pdf
"#;

/// Grade handwritten homework PDFs with vision and language models.
#[derive(Parser, Debug)]
#[command(
    name = "pdf2grade",
    version,
    about = "Grade handwritten homework PDFs and write the commentary as Word documents",
    long_about = "Transcribe scanned handwritten homework with a vision model, score each \
essay against a 15-point rubric with a language model, and write the commentary as Markdown \
and .docx. Supports OpenAI, Anthropic, Google Gemini, Azure OpenAI and OpenAI-compatible \
endpoints.",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, global = true, env = "PDF2GRADE_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, global = true, env = "PDF2GRADE_QUIET")]
    quiet: bool,

    /// Disable progress bar.
    #[arg(long, global = true, env = "PDF2GRADE_NO_PROGRESS")]
    no_progress: bool,

    /// Print structured JSON results on stdout.
    #[arg(long, global = true, env = "PDF2GRADE_JSON")]
    json: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Transcribe, score and write reports for each page of a PDF.
    Grade(PdfArgs),
    /// Transcribe each page of a PDF and print the combined text.
    Ocr(PdfArgs),
    /// Score existing transcript files and write their reports.
    Score(ScoreArgs),
    /// Convert a Markdown report into a Word document.
    Docx(DocxArgs),
    /// Print PDF metadata only.
    Inspect {
        /// Local PDF file path or HTTP/HTTPS URL.
        input: String,
    },
}

#[derive(Args, Debug)]
struct LlmArgs {
    /// LLM model ID (e.g. gpt-4.1-mini, gpt-4.1, claude-sonnet-4-20250514).
    #[arg(long, env = "EDGEQUAKE_MODEL")]
    model: Option<String>,

    /// LLM provider: openai, anthropic, gemini, ollama, azure.
    #[arg(long, env = "EDGEQUAKE_PROVIDER")]
    provider: Option<String>,

    /// Max LLM output tokens per call.
    #[arg(long, env = "PDF2GRADE_MAX_TOKENS", default_value_t = 4096)]
    max_tokens: usize,

    /// LLM temperature (0.0–2.0).
    #[arg(long, env = "PDF2GRADE_TEMPERATURE", default_value_t = 0.1)]
    temperature: f32,

    /// Retries per LLM call on failure.
    #[arg(long, env = "PDF2GRADE_MAX_RETRIES", default_value_t = 3)]
    max_retries: u32,

    /// Per-call LLM timeout in seconds.
    #[arg(long, env = "PDF2GRADE_API_TIMEOUT", default_value_t = 120)]
    api_timeout: u64,

    /// Text file with a custom scoring rubric; `{essay}` marks where the
    /// transcript goes.
    #[arg(long, env = "PDF2GRADE_SCORING_PROMPT")]
    scoring_prompt: Option<PathBuf>,

    /// Do not append the essay to the end of each report.
    #[arg(long, env = "PDF2GRADE_NO_SOURCE_TEXT")]
    no_source_text: bool,

    /// Heading for the appended essay.
    #[arg(long, env = "PDF2GRADE_SOURCE_HEADING", default_value = "原文")]
    source_heading: String,
}

#[derive(Args, Debug)]
struct PdfArgs {
    /// Local PDF file path or HTTP/HTTPS URL.
    input: String,

    #[command(flatten)]
    llm: LlmArgs,

    /// Directory receiving every artifact.
    #[arg(short, long, env = "PDF2GRADE_OUTPUT_DIR", default_value = "output")]
    output_dir: PathBuf,

    /// Rendering DPI (72–600).
    #[arg(long, env = "PDF2GRADE_DPI", default_value_t = 300,
          value_parser = clap::value_parser!(u32).range(72..=600))]
    dpi: u32,

    /// Pages processed at once.
    #[arg(short, long, env = "PDF2GRADE_CONCURRENCY", default_value_t = 1)]
    concurrency: usize,

    /// Page selection: all, 5, 3-15, or 1,3,5,7.
    #[arg(long, env = "PDF2GRADE_PAGES", default_value = "all")]
    pages: String,

    /// Page separator in combined transcripts: none, hr, or custom string.
    #[arg(long, env = "PDF2GRADE_SEPARATOR", default_value = "hr")]
    separator: String,

    /// PDF user password for encrypted documents.
    #[arg(long, env = "PDF2GRADE_PASSWORD")]
    password: Option<String>,

    /// Text file with a custom handwriting transcription prompt.
    #[arg(long, env = "PDF2GRADE_TRANSCRIPTION_PROMPT")]
    transcription_prompt: Option<PathBuf>,

    /// Do not keep the rendered page PNGs.
    #[arg(long, env = "PDF2GRADE_NO_IMAGES")]
    no_images: bool,

    /// HTTP download timeout in seconds.
    #[arg(long, env = "PDF2GRADE_DOWNLOAD_TIMEOUT", default_value_t = 120)]
    download_timeout: u64,
}

#[derive(Args, Debug)]
struct ScoreArgs {
    /// Transcript text files to score.
    #[arg(required = true)]
    files: Vec<PathBuf>,

    #[command(flatten)]
    llm: LlmArgs,

    /// Directory for the reports. Default: next to each input file.
    #[arg(short, long, env = "PDF2GRADE_OUTPUT_DIR")]
    output_dir: Option<PathBuf>,
}

#[derive(Args, Debug)]
struct DocxArgs {
    /// Markdown file to convert.
    input: PathBuf,

    /// Output path. Default: the input path with a `.docx` extension.
    #[arg(short, long)]
    output: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // The progress bar replaces INFO logs on the pdf subcommands.
    let has_bar = matches!(cli.command, Command::Grade(_) | Command::Ocr(_));
    let show_progress = has_bar && !cli.quiet && !cli.no_progress && !cli.json;
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

    let progress_cb: Option<ProgressCallback> = if show_progress {
        let cb = CliProgressCallback::new_dynamic();
        Some(cb as Arc<dyn GradingProgressCallback>)
    } else {
        None
    };

    match &cli.command {
        Command::Grade(args) => run_grade(&cli, args, progress_cb).await,
        Command::Ocr(args) => run_ocr(&cli, args, progress_cb).await,
        Command::Score(args) => run_score(&cli, args).await,
        Command::Docx(args) => run_docx(&cli, args).await,
        Command::Inspect { input } => run_inspect(&cli, input).await,
    }
}

async fn run_grade(cli: &Cli, args: &PdfArgs, progress: Option<ProgressCallback>) -> Result<()> {
    let config = pdf_config(args, progress).await?;
    let output = grade(&args.input, &config)
        .await
        .context("Grading failed")?;

    if cli.json {
        let json = serde_json::to_string_pretty(&output).context("Failed to serialise output")?;
        println!("{json}");
        return Ok(());
    }

    if !cli.quiet {
        for page in output.graded() {
            if let Some(ref docx) = page.artifacts.report_docx {
                eprintln!("   {}", docx.display());
            }
        }
        let stats = &output.stats;
        let selected = stats.processed_pages + stats.failed_pages + stats.skipped_pages;
        eprintln!(
            "{}  {}/{} pages graded  {}ms  →  {}",
            if stats.failed_pages == 0 {
                green("✔")
            } else {
                cyan("⚠")
            },
            stats.processed_pages,
            selected,
            stats.total_duration_ms,
            bold(&config.output_dir.display().to_string()),
        );
        eprintln!(
            "   {} tokens in  /  {} tokens out",
            dim(&stats.total_input_tokens.to_string()),
            dim(&stats.total_output_tokens.to_string()),
        );
    }
    Ok(())
}

async fn run_ocr(cli: &Cli, args: &PdfArgs, progress: Option<ProgressCallback>) -> Result<()> {
    let config = pdf_config(args, progress).await?;
    let output = transcribe(&args.input, &config)
        .await
        .context("Transcription failed")?;

    if cli.json {
        let json = serde_json::to_string_pretty(&output).context("Failed to serialise output")?;
        println!("{json}");
    } else {
        let stdout = io::stdout();
        let mut handle = stdout.lock();
        handle
            .write_all(output.text.as_bytes())
            .context("Failed to write to stdout")?;
    }

    if !cli.quiet && !cli.json {
        eprintln!(
            "Transcribed {}/{} pages in {}ms",
            output.stats.processed_pages,
            output.pages.len(),
            output.stats.total_duration_ms
        );
    }
    Ok(())
}

async fn run_score(cli: &Cli, args: &ScoreArgs) -> Result<()> {
    let config = llm_builder(&args.llm)
        .await?
        .build()
        .context("Invalid configuration")?;

    let mut reports = Vec::with_capacity(args.files.len());
    for file in &args.files {
        let essay = tokio::fs::read_to_string(file)
            .await
            .with_context(|| format!("Failed to read {}", file.display()))?;

        let out_dir = match &args.output_dir {
            Some(dir) => dir.clone(),
            None => file.parent().map(Path::to_path_buf).unwrap_or_default(),
        };
        let (md_path, docx_path) = report_paths_for_text(file, &out_dir);

        let assessment = score_text(&essay, &config)
            .await
            .with_context(|| format!("Scoring {} failed", file.display()))?;

        write_atomic(&md_path, assessment.report.as_bytes())
            .await
            .context("Failed to write report Markdown")?;
        markdown_to_docx(&assessment.report, &docx_path)
            .await
            .context("Failed to write report document")?;

        if !cli.quiet && !cli.json {
            eprintln!("{} {}", green("✓"), docx_path.display());
        }
        reports.push(assessment);
    }

    if cli.json {
        let json = serde_json::to_string_pretty(&reports).context("Failed to serialise output")?;
        println!("{json}");
    }
    Ok(())
}

async fn run_docx(cli: &Cli, args: &DocxArgs) -> Result<()> {
    let markdown = tokio::fs::read_to_string(&args.input)
        .await
        .with_context(|| format!("Failed to read {}", args.input.display()))?;
    let output = args
        .output
        .clone()
        .unwrap_or_else(|| args.input.with_extension("docx"));

    markdown_to_docx(&markdown, &output)
        .await
        .context("Failed to write document")?;

    if !cli.quiet {
        eprintln!("{} {}", green("✓"), output.display());
    }
    Ok(())
}

async fn run_inspect(cli: &Cli, input: &str) -> Result<()> {
    let meta = inspect(input).await.context("Failed to inspect PDF")?;

    if cli.json {
        println!(
            "{}",
            serde_json::to_string_pretty(&meta).context("Failed to serialize metadata")?
        );
        return Ok(());
    }

    println!("File:         {}", input);
    if let Some(ref t) = meta.title {
        println!("Title:        {}", t);
    }
    if let Some(ref a) = meta.author {
        println!("Author:       {}", a);
    }
    println!("Pages:        {}", meta.page_count);
    println!("PDF Version:  {}", meta.pdf_version);
    if let Some(ref p) = meta.producer {
        println!("Producer:     {}", p);
    }
    if let Some(ref c) = meta.creator {
        println!("Creator:      {}", c);
    }
    Ok(())
}

async fn read_prompt(path: Option<&PathBuf>) -> Result<Option<String>> {
    match path {
        Some(path) => Ok(Some(tokio::fs::read_to_string(path).await.with_context(
            || format!("Failed to read prompt from {}", path.display()),
        )?)),
        None => Ok(None),
    }
}

/// Builder with the LLM and report settings shared by every subcommand.
async fn llm_builder(llm: &LlmArgs) -> Result<GradingConfigBuilder> {
    let mut builder = GradingConfig::builder()
        .max_tokens(llm.max_tokens)
        .temperature(llm.temperature)
        .max_retries(llm.max_retries)
        .api_timeout_secs(llm.api_timeout)
        .append_source_text(!llm.no_source_text)
        .source_heading(llm.source_heading.clone());

    if let Some(ref model) = llm.model {
        builder = builder.model(model.clone());
    }
    if let Some(ref provider) = llm.provider {
        builder = builder.provider_name(provider.clone());
    }
    if let Some(prompt) = read_prompt(llm.scoring_prompt.as_ref()).await? {
        builder = builder.scoring_prompt(prompt);
    }
    Ok(builder)
}

/// Map PDF subcommand args to `GradingConfig`.
async fn pdf_config(args: &PdfArgs, progress: Option<ProgressCallback>) -> Result<GradingConfig> {
    let mut builder = llm_builder(&args.llm)
        .await?
        .dpi(args.dpi)
        .concurrency(args.concurrency)
        .pages(parse_pages(&args.pages)?)
        .page_separator(parse_separator(&args.separator))
        .output_dir(args.output_dir.clone())
        .save_images(!args.no_images)
        .download_timeout_secs(args.download_timeout);

    if let Some(ref password) = args.password {
        builder = builder.password(password.clone());
    }
    if let Some(prompt) = read_prompt(args.transcription_prompt.as_ref()).await? {
        builder = builder.transcription_prompt(prompt);
    }
    if let Some(cb) = progress {
        builder = builder.progress_callback(cb);
    }

    builder.build().context("Invalid configuration")
}

/// Parse `--pages` string into `PageSelection`.
fn parse_pages(s: &str) -> Result<PageSelection> {
    let s = s.trim().to_lowercase();

    if s == "all" {
        return Ok(PageSelection::All);
    }

    // Range: "3-15"
    if let Some((start, end)) = s.split_once('-') {
        let start: usize = start
            .trim()
            .parse()
            .context("Invalid start page in range")?;
        let end: usize = end.trim().parse().context("Invalid end page in range")?;

        if start < 1 {
            anyhow::bail!("Pages are 1-indexed, minimum is 1 (got {})", start);
        }
        if start > end {
            anyhow::bail!(
                "Invalid page range '{}-{}': start must be <= end",
                start,
                end
            );
        }
        return Ok(PageSelection::Range(start, end));
    }

    // Set: "1,3,5,7"
    if s.contains(',') {
        let pages: Vec<usize> = s
            .split(',')
            .map(|p| {
                p.trim()
                    .parse::<usize>()
                    .with_context(|| format!("Invalid page number: '{}'", p.trim()))
            })
            .collect::<Result<Vec<_>>>()?;

        if pages.contains(&0) {
            anyhow::bail!("Pages are 1-indexed, minimum is 1 (got 0)");
        }
        return Ok(PageSelection::Set(pages));
    }

    // Single page: "5"
    let page: usize = s.parse().context("Invalid page number")?;
    if page < 1 {
        anyhow::bail!("Pages are 1-indexed, minimum is 1 (got {})", page);
    }
    Ok(PageSelection::Single(page))
}

/// Parse `--separator` string into `PageSeparator`.
fn parse_separator(s: &str) -> PageSeparator {
    match s.to_lowercase().as_str() {
        "none" => PageSeparator::None,
        "hr" | "---" => PageSeparator::HorizontalRule,
        _ => PageSeparator::Custom(s.to_string()),
    }
}
