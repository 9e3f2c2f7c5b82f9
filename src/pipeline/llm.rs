//! Model calls: handwriting transcription and rubric scoring.
//!
//! Both calls share [`chat_with_retry`]: every attempt is bounded by
//! `api_timeout_secs`, and failures back off exponentially
//! (`retry_backoff_ms * 2^attempt`). With a 500 ms base and 3 retries that
//! is 500 ms → 1 s → 2 s between attempts.
//!
//! Prompt text lives in [`crate::prompts`]; this module only builds
//! messages and handles retries.

use crate::config::GradingConfig;
use crate::error::{GradeError, PageError};
use crate::prompts::{scoring_request, DEFAULT_SCORING_PROMPT, DEFAULT_TRANSCRIPTION_PROMPT};
use edgequake_llm::{ChatMessage, CompletionOptions, ImageData, LLMProvider};
use std::sync::Arc;
use tokio::time::{sleep, timeout, Duration};
use tracing::{debug, warn};

/// A successful model response.
#[derive(Debug, Clone)]
pub struct Completion {
    pub content: String,
    pub prompt_tokens: usize,
    pub completion_tokens: usize,
    /// Attempts beyond the first.
    pub retries: u8,
}

/// Why a call gave up.
#[derive(Debug, Clone)]
pub enum CallFailure {
    /// Every attempt returned an error; `detail` is the last one.
    Failed { retries: u8, detail: String },
    /// The last attempt hit the per-call timeout.
    TimedOut { secs: u64 },
}

impl CallFailure {
    fn into_page_error(self, page: usize, stage: &str) -> PageError {
        match self {
            CallFailure::Failed { retries, detail } => PageError::LlmFailed {
                page,
                stage: stage.to_string(),
                retries,
                detail,
            },
            CallFailure::TimedOut { secs } => PageError::Timeout {
                page,
                stage: stage.to_string(),
                secs,
            },
        }
    }
}

impl From<CallFailure> for GradeError {
    fn from(failure: CallFailure) -> Self {
        let message = match failure {
            CallFailure::Failed { retries, detail } => {
                format!("failed after {} retries: {}", retries, detail)
            }
            CallFailure::TimedOut { secs } => format!("timed out after {}s", secs),
        };
        GradeError::LlmApiError { message }
    }
}

/// Send `messages`, retrying with exponential backoff.
pub async fn chat_with_retry(
    provider: &Arc<dyn LLMProvider>,
    messages: &[ChatMessage],
    config: &GradingConfig,
    label: &str,
) -> Result<Completion, CallFailure> {
    let options = build_options(config);
    let call_timeout = Duration::from_secs(config.api_timeout_secs);
    let mut last_failure = CallFailure::Failed {
        retries: 0,
        detail: "no attempt made".to_string(),
    };

    for attempt in 0..=config.max_retries {
        if attempt > 0 {
            let backoff = backoff_ms(config.retry_backoff_ms, attempt);
            warn!(
                "{}: retry {}/{} after {}ms",
                label, attempt, config.max_retries, backoff
            );
            sleep(Duration::from_millis(backoff)).await;
        }

        match timeout(call_timeout, provider.chat(messages, Some(&options))).await {
            Ok(Ok(response)) => {
                debug!(
                    "{}: {} input tokens, {} output tokens",
                    label, response.prompt_tokens, response.completion_tokens
                );
                return Ok(Completion {
                    content: response.content,
                    prompt_tokens: response.prompt_tokens,
                    completion_tokens: response.completion_tokens,
                    retries: retry_count(attempt),
                });
            }
            Ok(Err(e)) => {
                let detail = e.to_string();
                warn!("{}: attempt {} failed: {}", label, attempt + 1, detail);
                last_failure = CallFailure::Failed {
                    retries: retry_count(attempt),
                    detail,
                };
            }
            Err(_) => {
                warn!(
                    "{}: attempt {} timed out after {}s",
                    label,
                    attempt + 1,
                    config.api_timeout_secs
                );
                last_failure = CallFailure::TimedOut {
                    secs: config.api_timeout_secs,
                };
            }
        }
    }

    Err(last_failure)
}

/// Delay before retry `attempt` (1-based): `base * 2^(attempt - 1)`,
/// saturating instead of overflowing.
fn backoff_ms(base: u64, attempt: u32) -> u64 {
    base.saturating_mul(2u64.saturating_pow(attempt.saturating_sub(1)))
}

fn retry_count(attempt: u32) -> u8 {
    u8::try_from(attempt).unwrap_or(u8::MAX)
}

/// Transcribe one page image. The image is the only user content; the
/// handwriting rules travel in the system message.
pub async fn transcribe_page(
    provider: &Arc<dyn LLMProvider>,
    page_num: usize,
    image: ImageData,
    config: &GradingConfig,
) -> Result<Completion, PageError> {
    let messages = vec![
        ChatMessage::system(transcription_prompt(config)),
        ChatMessage::user_with_images("", vec![image]),
    ];
    chat_with_retry(provider, &messages, config, &format!("Page {page_num} transcription"))
        .await
        .map_err(|f| f.into_page_error(page_num, "transcription"))
}

/// Score `text` against the rubric.
pub async fn score(
    provider: &Arc<dyn LLMProvider>,
    text: &str,
    config: &GradingConfig,
    label: &str,
) -> Result<Completion, CallFailure> {
    let messages = vec![ChatMessage::user(scoring_request(scoring_prompt(config), text))];
    chat_with_retry(provider, &messages, config, label).await
}

/// [`score`] for one page of a run.
pub async fn score_page(
    provider: &Arc<dyn LLMProvider>,
    page_num: usize,
    text: &str,
    config: &GradingConfig,
) -> Result<Completion, PageError> {
    score(provider, text, config, &format!("Page {page_num} scoring"))
        .await
        .map_err(|f| f.into_page_error(page_num, "scoring"))
}

fn transcription_prompt(config: &GradingConfig) -> &str {
    config
        .transcription_prompt
        .as_deref()
        .unwrap_or(DEFAULT_TRANSCRIPTION_PROMPT)
}

fn scoring_prompt(config: &GradingConfig) -> &str {
    config
        .scoring_prompt
        .as_deref()
        .unwrap_or(DEFAULT_SCORING_PROMPT)
}

fn build_options(config: &GradingConfig) -> CompletionOptions {
    CompletionOptions {
        temperature: Some(config.temperature),
        max_tokens: Some(config.max_tokens),
        ..Default::default()
    }
}
