//! The generation capability: send the four segments, get completion text back.
//!
//! [`CompletionBackend`] is the seam between the orchestrator and the model.
//! The orchestrator only ever calls [`CompletionBackend::generate`] and
//! propagates its [`GenerationError`] unchanged; tests substitute scripted
//! backends here.
//!
//! [`LlmBackend`] is the production implementation on top of an
//! `edgequake-llm` provider. Prompt text comes from
//! the [`PromptAssembler`], sizing from the orchestrator.
//!
//! ## Retry Strategy
//!
//! Retries are off by default (`max_retries = 0`); callers that want them opt
//! in via [`LlmBackend::with_retries`]. Only retryable kinds (rate limit,
//! connection, 5xx) are retried, with exponential backoff
//! `retry_backoff_ms * 2^(attempt-1)`. Authentication and bad-request errors
//! are returned on the first failure.

use crate::config::GenerationConfig;
use crate::error::GenerationError;
use crate::pipeline::messages::PromptAssembler;
use edgequake_llm::{CompletionOptions, LLMProvider, LlmError};
use once_cell::sync::Lazy;
use regex::Regex;
use std::future::Future;
use std::sync::Arc;
use std::time::Instant;
use tokio::time::{sleep, Duration};
use tracing::{debug, info, warn};

/// Anything that can turn an assembled prompt into completion text.
pub trait CompletionBackend: Send + Sync {
    /// Run one completion with at most `completion_token_budget` output tokens.
    fn generate(
        &self,
        model_id: &str,
        assembler: &PromptAssembler,
        completion_token_budget: usize,
    ) -> impl Future<Output = Result<String, GenerationError>> + Send;
}

impl<B: CompletionBackend> CompletionBackend for &B {
    fn generate(
        &self,
        model_id: &str,
        assembler: &PromptAssembler,
        completion_token_budget: usize,
    ) -> impl Future<Output = Result<String, GenerationError>> + Send {
        (**self).generate(model_id, assembler, completion_token_budget)
    }
}

impl<B: CompletionBackend> CompletionBackend for Arc<B> {
    fn generate(
        &self,
        model_id: &str,
        assembler: &PromptAssembler,
        completion_token_budget: usize,
    ) -> impl Future<Output = Result<String, GenerationError>> + Send {
        (**self).generate(model_id, assembler, completion_token_budget)
    }
}

/// [`CompletionBackend`] over an `edgequake-llm` chat provider.
///
/// The provider is already bound to a model; `model_id` is used for logging.
#[derive(Clone)]
pub struct LlmBackend {
    provider: Arc<dyn LLMProvider>,
    temperature: f32,
    max_retries: u32,
    retry_backoff_ms: u64,
}

impl std::fmt::Debug for LlmBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LlmBackend")
            .field("provider", &"<dyn LLMProvider>")
            .field("temperature", &self.temperature)
            .field("max_retries", &self.max_retries)
            .field("retry_backoff_ms", &self.retry_backoff_ms)
            .finish()
    }
}

impl LlmBackend {
    pub fn new(provider: Arc<dyn LLMProvider>) -> Self {
        Self {
            provider,
            temperature: 0.7,
            max_retries: 0,
            retry_backoff_ms: 500,
        }
    }

    /// Backend with the sampling and retry settings of `config`.
    pub fn from_config(provider: Arc<dyn LLMProvider>, config: &GenerationConfig) -> Self {
        Self::new(provider)
            .with_temperature(config.temperature)
            .with_retries(config.max_retries, config.retry_backoff_ms)
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature.clamp(0.0, 2.0);
        self
    }

    pub fn with_retries(mut self, max_retries: u32, retry_backoff_ms: u64) -> Self {
        self.max_retries = max_retries;
        self.retry_backoff_ms = retry_backoff_ms;
        self
    }

    fn options(&self, completion_token_budget: usize) -> CompletionOptions {
        CompletionOptions {
            temperature: Some(self.temperature),
            max_tokens: Some(completion_token_budget),
            ..Default::default()
        }
    }
}

impl CompletionBackend for LlmBackend {
    async fn generate(
        &self,
        model_id: &str,
        assembler: &PromptAssembler,
        completion_token_budget: usize,
    ) -> Result<String, GenerationError> {
        let messages = assembler.to_chat_messages();
        let options = self.options(completion_token_budget);
        let start = Instant::now();

        let mut attempt: u32 = 0;
        loop {
            if attempt > 0 {
                let backoff = self
                    .retry_backoff_ms
                    .saturating_mul(2u64.saturating_pow(attempt - 1));
                warn!(
                    "{}: retry {}/{} after {}ms",
                    model_id, attempt, self.max_retries, backoff
                );
                sleep(Duration::from_millis(backoff)).await;
            }

            match self.provider.chat(&messages, Some(&options)).await {
                Ok(response) => {
                    let duration = start.elapsed();
                    info!(
                        "{}: completion used {} prompt + {} completion tokens in {:?}",
                        model_id, response.prompt_tokens, response.completion_tokens, duration
                    );
                    debug!("{}: {} bytes of completion text", model_id, response.content.len());
                    return Ok(response.content);
                }
                Err(e) => {
                    let err = classify_error(e);
                    warn!("{}: attempt {} failed: {}", model_id, attempt + 1, err);
                    if !err.is_retryable() || attempt >= self.max_retries {
                        return Err(err);
                    }
                    attempt += 1;
                }
            }
        }
    }
}

/// Map a provider error onto the [`GenerationError`] taxonomy.
///
/// Typed variants map directly. Only the opaque `ApiError` / `ProviderError`
/// messages go through [`classify_message`].
pub fn classify_error(err: LlmError) -> GenerationError {
    match err {
        LlmError::RateLimited(m) => GenerationError::RateLimited(m),
        LlmError::AuthError(m) => GenerationError::Authentication(m),
        LlmError::InvalidRequest(m) | LlmError::ModelNotFound(m) => GenerationError::BadRequest(m),
        e @ LlmError::TokenLimitExceeded { .. } => GenerationError::BadRequest(e.to_string()),
        LlmError::NetworkError(m) => GenerationError::Connection(m),
        e @ LlmError::Timeout => GenerationError::Connection(e.to_string()),
        LlmError::ApiError(m) | LlmError::ProviderError(m) => classify_message(&m),
        other => GenerationError::Other(other.to_string()),
    }
}

// An HTTP status only counts when it leads the message or follows a
// status/HTTP/code marker, so ports, timings and token counts never match.
static RE_STATUS: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)(?:^|status(?:\s+code)?|http(?:/[\d.]+)?|code)\W{0,3}([45]\d\d)\b").unwrap()
});

/// Classify an untyped provider message: HTTP status first, keywords second.
pub fn classify_message(message: &str) -> GenerationError {
    let msg = message.to_string();
    if let Some(status) = RE_STATUS
        .captures(message)
        .and_then(|c| c[1].parse::<u16>().ok())
    {
        return match status {
            429 => GenerationError::RateLimited(msg),
            401 | 403 => GenerationError::Authentication(msg),
            408 => GenerationError::Connection(msg),
            400..=499 => GenerationError::BadRequest(msg),
            _ => GenerationError::Server(msg),
        };
    }

    let lower = message.to_lowercase();
    let has = |needles: &[&str]| needles.iter().any(|n| lower.contains(n));
    if has(&["rate limit", "rate_limit", "too many requests", "quota"]) {
        GenerationError::RateLimited(msg)
    } else if has(&["unauthorized", "forbidden", "authentication", "invalid api key", "api_key"]) {
        GenerationError::Authentication(msg)
    } else if has(&["overloaded", "service unavailable", "internal server error", "bad gateway"]) {
        GenerationError::Server(msg)
    } else if has(&["timeout", "timed out", "connection", "network", "dns"]) {
        GenerationError::Connection(msg)
    } else if has(&["bad request", "invalid request", "not found", "context length"]) {
        GenerationError::BadRequest(msg)
    } else {
        GenerationError::Other(msg)
    }
}
