//! Configuration types for flashcard generation.
//!
//! All generation behaviour is controlled through [`GenerationConfig`], built
//! via its [`GenerationConfigBuilder`]. Token limits live in a separate
//! [`PromptBudget`] whose constructor enforces the budget invariant, so an
//! impossible budget is rejected when the config is built, never halfway
//! through a run.
//!
//! There is no process-wide configuration: callers construct one config and
//! pass it by reference into each run.

use crate::deck::Category;
use crate::error::FlashcardError;
use crate::pipeline::messages::DEFAULT_MESSAGE_OVERHEAD_TOKENS;
use crate::pipeline::parse::ParseMode;
use crate::progress::ProgressCallback;
use edgequake_llm::LLMProvider;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// Default model used when none is configured.
pub const DEFAULT_MODEL: &str = "gpt-4o-mini";

/// Token limits for one completion call.
///
/// Invariant: `app_token_limit > prompt_token_limit + completion_token_limit`.
/// The difference is what remains for input text in the worst case.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PromptBudget {
    app_token_limit: usize,
    prompt_token_limit: usize,
    completion_token_limit: usize,
}

impl PromptBudget {
    /// Validate and build a budget.
    ///
    /// # Errors
    /// [`FlashcardError::InvalidConfig`] if any limit is zero or the prompt
    /// and completion allowances do not leave room for input.
    pub fn new(
        app_token_limit: usize,
        prompt_token_limit: usize,
        completion_token_limit: usize,
    ) -> Result<Self, FlashcardError> {
        if app_token_limit == 0 || prompt_token_limit == 0 || completion_token_limit == 0 {
            return Err(FlashcardError::InvalidConfig(format!(
                "token limits must be > 0 (app {app_token_limit}, prompt {prompt_token_limit}, completion {completion_token_limit})"
            )));
        }
        let reserved = prompt_token_limit.saturating_add(completion_token_limit);
        if reserved >= app_token_limit {
            return Err(FlashcardError::InvalidConfig(format!(
                "prompt limit ({prompt_token_limit}) + completion limit ({completion_token_limit}) \
                 must be below the app token limit ({app_token_limit})"
            )));
        }
        Ok(Self {
            app_token_limit,
            prompt_token_limit,
            completion_token_limit,
        })
    }

    /// Total tokens a single call may consume (prompt + input + completion).
    pub fn app_token_limit(&self) -> usize {
        self.app_token_limit
    }

    /// Upper bound for the fixed prompt segments.
    pub fn prompt_token_limit(&self) -> usize {
        self.prompt_token_limit
    }

    /// Tokens reserved for the model's reply.
    pub fn completion_token_limit(&self) -> usize {
        self.completion_token_limit
    }
}

impl Default for PromptBudget {
    fn default() -> Self {
        Self {
            app_token_limit: 16_000,
            prompt_token_limit: 4_000,
            completion_token_limit: 4_000,
        }
    }
}

/// How much adjacent fragments share, so a fact that straddles a fragment
/// boundary appears whole in at least one of them.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Overlap {
    /// A fixed number of tokens.
    Absolute { tokens: usize },
    /// A fraction of the fragment budget, `0.0 <= fraction < 1.0`.
    Relative { fraction: f64 },
}

impl Overlap {
    /// Overlap in tokens for a given fragment budget (relative overlap is floored).
    pub fn resolve(&self, fragment_budget: usize) -> usize {
        match *self {
            Overlap::Absolute { tokens } => tokens,
            Overlap::Relative { fraction } => (fragment_budget as f64 * fraction).floor() as usize,
        }
    }

    fn validate(&self) -> Result<(), FlashcardError> {
        match *self {
            Overlap::Absolute { .. } => Ok(()),
            Overlap::Relative { fraction } if (0.0..1.0).contains(&fraction) => Ok(()),
            Overlap::Relative { fraction } => Err(FlashcardError::InvalidConfig(format!(
                "relative overlap must be in [0, 1), got {fraction}"
            ))),
        }
    }
}

impl Default for Overlap {
    fn default() -> Self {
        Overlap::Relative { fraction: 0.1 }
    }
}

/// What kind of cards the model is asked to write.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GenerationMode {
    /// Mixed practice deck; the model tags each card and the tag picks the
    /// category. (default)
    #[default]
    Practice,
    /// Term → definition cards only.
    Definitions,
    /// Open questions only.
    OpenEnded,
    /// Multiple-choice questions only.
    MultipleChoice,
    /// Fill-in-the-blank cards only.
    Cloze,
}

impl GenerationMode {
    /// The parser mode matching this generation mode.
    pub fn parse_mode(&self) -> ParseMode {
        match self {
            GenerationMode::Practice => ParseMode::Structured,
            GenerationMode::Definitions => ParseMode::Fixed(Category::Definition),
            GenerationMode::OpenEnded => ParseMode::Fixed(Category::OpenEnded),
            GenerationMode::MultipleChoice => ParseMode::Fixed(Category::MultipleChoice),
            GenerationMode::Cloze => ParseMode::Fixed(Category::Cloze),
        }
    }
}

/// Language of the built-in prompts (and therefore of the generated cards).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    #[default]
    En,
    De,
}

/// Configuration for a flashcard generation run.
///
/// Built via [`GenerationConfig::builder()`] or using
/// [`GenerationConfig::default()`].
///
/// # Example
/// ```rust
/// use edgequake_flashcards::{GenerationConfig, GenerationMode, Overlap, PromptBudget};
///
/// let config = GenerationConfig::builder()
///     .model("gpt-4o-mini")
///     .mode(GenerationMode::Definitions)
///     .budget(PromptBudget::new(8_000, 2_000, 2_000).unwrap())
///     .overlap(Overlap::Absolute { tokens: 100 })
///     .build()
///     .unwrap();
/// assert_eq!(config.budget.app_token_limit(), 8_000);
/// ```
#[derive(Clone)]
pub struct GenerationConfig {
    /// LLM model identifier; also selects the tokenizer. Default: `gpt-4o-mini`.
    pub model: String,

    /// LLM provider name (e.g. "openai", "anthropic", "ollama").
    /// If None along with `provider`, the provider is auto-detected.
    pub provider_name: Option<String>,

    /// Pre-constructed LLM provider. Takes precedence over `provider_name`.
    pub provider: Option<Arc<dyn LLMProvider>>,

    /// Sampling temperature. Default: 0.7.
    ///
    /// Flashcard writing benefits from some variety in phrasing; parsing
    /// relies on the line format, not on deterministic output.
    pub temperature: f32,

    /// Token limits per completion call.
    pub budget: PromptBudget,

    /// Overlap between adjacent fragments in batched runs.
    pub overlap: Overlap,

    /// Fixed per-call overhead of the chat wire format, in tokens. Default: 18.
    pub message_overhead_tokens: usize,

    /// Card style requested from the model. Default: [`GenerationMode::Practice`].
    pub mode: GenerationMode,

    /// Prompt language. Default: English.
    pub language: Language,

    /// Custom system prompt. If None, uses the built-in prompt for `mode`/`language`.
    pub system_prompt: Option<String>,

    /// Extra instruction appended to the system prompt (built-in or custom),
    /// e.g. "Focus on dates and names."
    pub additional_instruction: Option<String>,

    /// Custom example input text shown to the model before the real input.
    pub example_input: Option<String>,

    /// Custom example reply matching `example_input`.
    pub example_output: Option<String>,

    /// Retries the LLM adapter may spend on a retryable provider failure. Default: 0.
    ///
    /// The orchestrator itself never retries; a non-zero value here opts the
    /// bundled [`crate::pipeline::llm::LlmBackend`] into exponential backoff.
    pub max_retries: u32,

    /// Initial retry delay in milliseconds (doubles per attempt). Default: 500.
    pub retry_backoff_ms: u64,

    /// Receives batch-level progress events.
    pub progress_callback: Option<ProgressCallback>,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            model: DEFAULT_MODEL.to_string(),
            provider_name: None,
            provider: None,
            temperature: 0.7,
            budget: PromptBudget::default(),
            overlap: Overlap::default(),
            message_overhead_tokens: DEFAULT_MESSAGE_OVERHEAD_TOKENS,
            mode: GenerationMode::default(),
            language: Language::default(),
            system_prompt: None,
            additional_instruction: None,
            example_input: None,
            example_output: None,
            max_retries: 0,
            retry_backoff_ms: 500,
            progress_callback: None,
        }
    }
}

impl fmt::Debug for GenerationConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GenerationConfig")
            .field("model", &self.model)
            .field("provider_name", &self.provider_name)
            .field("provider", &self.provider.as_ref().map(|_| "<dyn LLMProvider>"))
            .field("temperature", &self.temperature)
            .field("budget", &self.budget)
            .field("overlap", &self.overlap)
            .field("message_overhead_tokens", &self.message_overhead_tokens)
            .field("mode", &self.mode)
            .field("language", &self.language)
            .field("system_prompt", &self.system_prompt.as_ref().map(|p| p.len()))
            .field("additional_instruction", &self.additional_instruction)
            .field("max_retries", &self.max_retries)
            .field(
                "progress_callback",
                &self.progress_callback.as_ref().map(|_| "<dyn GenerationProgressCallback>"),
            )
            .finish()
    }
}

impl GenerationConfig {
    /// Create a new builder for `GenerationConfig`.
    pub fn builder() -> GenerationConfigBuilder {
        GenerationConfigBuilder {
            config: Self::default(),
        }
    }
}

/// Builder for [`GenerationConfig`].
#[derive(Debug)]
pub struct GenerationConfigBuilder {
    config: GenerationConfig,
}

impl GenerationConfigBuilder {
    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.config.model = model.into();
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

    pub fn budget(mut self, budget: PromptBudget) -> Self {
        self.config.budget = budget;
        self
    }

    pub fn overlap(mut self, overlap: Overlap) -> Self {
        self.config.overlap = overlap;
        self
    }

    pub fn message_overhead_tokens(mut self, n: usize) -> Self {
        self.config.message_overhead_tokens = n;
        self
    }

    pub fn mode(mut self, mode: GenerationMode) -> Self {
        self.config.mode = mode;
        self
    }

    pub fn language(mut self, language: Language) -> Self {
        self.config.language = language;
        self
    }

    pub fn system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.config.system_prompt = Some(prompt.into());
        self
    }

    pub fn additional_instruction(mut self, text: impl Into<String>) -> Self {
        self.config.additional_instruction = Some(text.into());
        self
    }

    /// Replace the built-in example exchange.
    pub fn example(mut self, input: impl Into<String>, output: impl Into<String>) -> Self {
        self.config.example_input = Some(input.into());
        self.config.example_output = Some(output.into());
        self
    }

    pub fn max_retries(mut self, n: u32) -> Self {
        self.config.max_retries = n;
        self
    }

    pub fn retry_backoff_ms(mut self, ms: u64) -> Self {
        self.config.retry_backoff_ms = ms;
        self
    }

    pub fn progress_callback(mut self, cb: ProgressCallback) -> Self {
        self.config.progress_callback = Some(cb);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<GenerationConfig, FlashcardError> {
        let c = &self.config;
        if c.model.trim().is_empty() {
            return Err(FlashcardError::InvalidConfig("model must not be empty".into()));
        }
        // Deserialised budgets bypass `PromptBudget::new`.
        PromptBudget::new(
            c.budget.app_token_limit,
            c.budget.prompt_token_limit,
            c.budget.completion_token_limit,
        )?;
        c.overlap.validate()?;
        if c.example_input.is_some() != c.example_output.is_some() {
            return Err(FlashcardError::InvalidConfig(
                "example input and example output must be set together".into(),
            ));
        }
        Ok(self.config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn budget_rejects_overcommitted_limits() {
        let err = PromptBudget::new(100, 60, 50).unwrap_err();
        assert!(matches!(err, FlashcardError::InvalidConfig(_)));
    }

    #[test]
    fn budget_rejects_exact_fit() {
        // Equality leaves zero tokens for input.
        assert!(PromptBudget::new(100, 50, 50).is_err());
    }

    #[test]
    fn budget_rejects_zero_limits() {
        assert!(PromptBudget::new(100, 0, 50).is_err());
        assert!(PromptBudget::new(0, 10, 10).is_err());
    }

    #[test]
    fn budget_accepts_valid_limits() {
        let b = PromptBudget::new(4_096, 1_000, 1_000).unwrap();
        assert_eq!(b.app_token_limit(), 4_096);
        assert_eq!(b.prompt_token_limit(), 1_000);
        assert_eq!(b.completion_token_limit(), 1_000);
    }

    #[test]
    fn default_budget_is_valid() {
        let d = PromptBudget::default();
        assert!(PromptBudget::new(
            d.app_token_limit(),
            d.prompt_token_limit(),
            d.completion_token_limit()
        )
        .is_ok());
    }

    #[test]
    fn overlap_resolution() {
        assert_eq!(Overlap::Absolute { tokens: 42 }.resolve(1000), 42);
        assert_eq!(Overlap::Relative { fraction: 0.25 }.resolve(1000), 250);
        assert_eq!(Overlap::Relative { fraction: 0.1 }.resolve(15), 1);
        assert_eq!(Overlap::Relative { fraction: 0.0 }.resolve(15), 0);
    }

    #[test]
    fn builder_rejects_relative_overlap_of_one() {
        let err = GenerationConfig::builder()
            .overlap(Overlap::Relative { fraction: 1.0 })
            .build()
            .unwrap_err();
        assert!(matches!(err, FlashcardError::InvalidConfig(_)));
    }

    #[test]
    fn builder_rejects_half_example() {
        let mut builder = GenerationConfig::builder();
        builder.config.example_input = Some("text".into());
        assert!(builder.build().is_err());
    }

    #[test]
    fn builder_clamps_temperature() {
        let config = GenerationConfig::builder().temperature(9.0).build().unwrap();
        assert_eq!(config.temperature, 2.0);
    }

    #[test]
    fn defaults() {
        let config = GenerationConfig::default();
        assert_eq!(config.model, DEFAULT_MODEL);
        assert_eq!(config.message_overhead_tokens, 18);
        assert_eq!(config.mode, GenerationMode::Practice);
        assert_eq!(config.max_retries, 0);
    }

    #[test]
    fn mode_to_parse_mode() {
        assert_eq!(GenerationMode::Practice.parse_mode(), ParseMode::Structured);
        assert_eq!(
            GenerationMode::Cloze.parse_mode(),
            ParseMode::Fixed(Category::Cloze)
        );
    }

    #[test]
    fn overlap_round_trips_through_json() {
        let json = serde_json::to_string(&Overlap::Relative { fraction: 0.2 }).unwrap();
        assert_eq!(json, r#"{"kind":"relative","fraction":0.2}"#);
    }
}
