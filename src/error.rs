//! Error types for the edgequake-flashcards library.
//!
//! Three error types reflect three distinct failure modes:
//!
//! * [`FlashcardError`] — **Fatal**: the run cannot proceed or was aborted
//!   (bad token budget, unknown tokenizer, upstream outage). Returned as
//!   `Err(FlashcardError)` from the top-level `generate*` functions and from
//!   [`crate::generate::Generator::run`]. Partial decks are never returned
//!   alongside it.
//!
//! * [`GenerationError`] — the taxonomy of failures raised by the injected
//!   completion capability. The orchestrator never retries and never
//!   rewrites these; they surface wrapped in [`FlashcardError::Generation`]
//!   so the caller can apply its own retry policy.
//!
//! * [`LineIssue`] — **Non-fatal**: one line of model output was dropped or
//!   degraded. Stored in [`crate::deck::GenerationOutput::issues`] so callers
//!   can audit data quality without losing the rest of a multi-minute batch.

use thiserror::Error;

/// All fatal errors returned by the edgequake-flashcards library.
///
/// Line-level parse problems use [`LineIssue`] and are collected in the run
/// output rather than propagated here.
#[derive(Debug, Error)]
pub enum FlashcardError {
    // ── Configuration errors ──────────────────────────────────────────────
    /// No tokenizer is known for the requested model.
    #[error("No tokenizer available for model '{model}'\nToken accounting requires an exact tokenizer; pick a supported OpenAI model id.")]
    UnsupportedModel { model: String },

    /// Fragment budget and overlap would never advance the sliding window.
    #[error("Invalid fragment budget: {budget} tokens with {overlap} tokens of overlap (budget must be > 0 and > overlap)")]
    InvalidBudget { budget: usize, overlap: usize },

    /// The fixed prompt segments leave no room for input text.
    #[error("Prompt uses {prompt_tokens} tokens, which exceeds the {limit}-token allowance.\nShorten the system prompt or the example exchange.")]
    PromptTooLarge { prompt_tokens: usize, limit: usize },

    /// The token counter is bound to a different model than the run requested.
    #[error("Token counter is bound to '{counter}' but the run requested '{requested}'")]
    ModelMismatch { counter: String, requested: String },

    /// Builder or budget validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// The input text was empty or whitespace only.
    #[error("Input text is empty")]
    EmptyInput,

    /// Encoding or decoding through the tokenizer failed.
    #[error("Tokenizer error: {0}")]
    Tokenizer(String),

    // ── LLM errors ────────────────────────────────────────────────────────
    /// The configured provider is not initialised (missing API key etc.).
    #[error("LLM provider '{provider}' is not configured.\n{hint}")]
    ProviderNotConfigured { provider: String, hint: String },

    /// The completion capability failed; the run was aborted.
    #[error(transparent)]
    Generation(#[from] GenerationError),

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Failures raised by a [`crate::pipeline::llm::CompletionBackend`].
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum GenerationError {
    /// HTTP 429 — the provider asked us to slow down.
    #[error("Rate limit exceeded: {0}")]
    RateLimited(String),

    /// HTTP 401/403 — retry unlikely to help.
    #[error("Authentication error: {0}")]
    Authentication(String),

    /// HTTP 400/404/422 — the request itself was rejected.
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// Network failure or timeout before a response arrived.
    #[error("Connection error: {0}")]
    Connection(String),

    /// HTTP 5xx from the provider.
    #[error("Server error: {0}")]
    Server(String),

    /// The embedding system cancelled the run.
    #[error("Generation cancelled: {0}")]
    Cancelled(String),

    /// Anything the adapter could not classify.
    #[error("LLM API error: {0}")]
    Other(String),
}

impl GenerationError {
    /// Whether a caller-side retry has a reasonable chance of succeeding.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            GenerationError::RateLimited(_)
                | GenerationError::Connection(_)
                | GenerationError::Server(_)
        )
    }
}

/// A non-fatal problem with a single line of model output.
///
/// `batch` is 1-indexed (absent for direct parser calls), `line` is the
/// 1-indexed position among the non-empty lines of that completion.
#[derive(Debug, Clone, PartialEq, Eq, Error, serde::Serialize, serde::Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum LineIssue {
    /// The line could not be turned into a card and was dropped.
    #[error("line {line}: malformed flashcard ({reason})")]
    Malformed {
        batch: Option<usize>,
        line: usize,
        reason: String,
    },

    /// The tag was not recognised; a placeholder `Unknown` card was kept.
    #[error("line {line}: unrecognised prefix '{tag}'")]
    UnrecognizedPrefix {
        batch: Option<usize>,
        line: usize,
        tag: String,
    },
}

impl LineIssue {
    /// True when the offending line produced no card at all.
    pub fn is_dropped(&self) -> bool {
        matches!(self, LineIssue::Malformed { .. })
    }

    /// Attach the batch number once the parser output is aggregated.
    pub fn in_batch(self, batch_num: usize) -> Self {
        match self {
            LineIssue::Malformed { line, reason, .. } => LineIssue::Malformed {
                batch: Some(batch_num),
                line,
                reason,
            },
            LineIssue::UnrecognizedPrefix { line, tag, .. } => LineIssue::UnrecognizedPrefix {
                batch: Some(batch_num),
                line,
                tag,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invalid_budget_display() {
        let e = FlashcardError::InvalidBudget {
            budget: 10,
            overlap: 10,
        };
        let msg = e.to_string();
        assert!(msg.contains("10 tokens"), "got: {msg}");
    }

    #[test]
    fn generation_error_is_transparent() {
        let e: FlashcardError = GenerationError::RateLimited("slow down".into()).into();
        assert_eq!(e.to_string(), "Rate limit exceeded: slow down");
        assert!(matches!(
            e,
            FlashcardError::Generation(GenerationError::RateLimited(_))
        ));
    }

    #[test]
    fn retryable_kinds() {
        assert!(GenerationError::Server("502".into()).is_retryable());
        assert!(GenerationError::Connection("reset".into()).is_retryable());
        assert!(!GenerationError::Authentication("bad key".into()).is_retryable());
        assert!(!GenerationError::BadRequest("too long".into()).is_retryable());
    }

    #[test]
    fn line_issue_batch_tagging() {
        let issue = LineIssue::Malformed {
            batch: None,
            line: 2,
            reason: "missing ';'".into(),
        }
        .in_batch(3);
        assert!(issue.is_dropped());
        assert_eq!(
            issue,
            LineIssue::Malformed {
                batch: Some(3),
                line: 2,
                reason: "missing ';'".into()
            }
        );
    }

    #[test]
    fn line_issue_serialises_with_kind_tag() {
        let issue = LineIssue::UnrecognizedPrefix {
            batch: Some(1),
            line: 4,
            tag: "mystery".into(),
        };
        let json = serde_json::to_string(&issue).unwrap();
        assert!(json.contains("\"kind\":\"unrecognizedPrefix\""), "got: {json}");
    }
}
