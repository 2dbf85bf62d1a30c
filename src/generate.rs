//! Generation orchestration and the eager entry points.
//!
//! [`Generator`] is the core state machine: size the prompt, decide between a
//! single call and batched calls over token windows, drive the completion
//! backend batch by batch, and aggregate parsed cards with a running id.
//! It knows nothing about providers or prompts; it is handed a token
//! counter, an assembled prompt and a [`CompletionBackend`].
//!
//! [`generate`] wires a [`GenerationConfig`] to that core: it resolves the
//! provider, loads the tokenizer for the model and builds the prompt. Use
//! [`crate::stream::generate_stream`] instead to receive cards batch by batch.

use crate::config::{GenerationConfig, Overlap, PromptBudget};
use crate::deck::{FlashcardDeck, GenerationOutput, GenerationStats, RunMode, TokenEstimate};
use crate::error::FlashcardError;
use crate::pipeline::chunk;
use crate::pipeline::llm::{CompletionBackend, LlmBackend};
use crate::pipeline::messages::PromptAssembler;
use crate::pipeline::parse::{parse_completion, ParseMode, ParseOutcome};
use crate::pipeline::tokens::{TiktokenCounter, TokenCounter, TokenCounterRef};
use crate::progress::GenerationProgressCallback;
use crate::prompts;
use edgequake_llm::{LLMProvider, ProviderFactory};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

/// How a run will be executed, decided before any completion call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunPlan {
    pub mode: RunMode,
    /// Cost of the fixed prompt segments, per call.
    pub prompt_tokens: usize,
    /// Cost of the whole input segment.
    pub input_tokens: usize,
    /// Token budget per fragment; `None` in single-shot mode.
    pub fragment_budget: Option<usize>,
    /// Input text of each completion call, in order.
    pub inputs: Vec<String>,
}

impl RunPlan {
    /// Number of completion calls.
    pub fn batches(&self) -> usize {
        self.inputs.len()
    }
}

/// Drives one or many completion calls for an assembled prompt.
#[derive(Clone)]
pub struct Generator {
    counter: TokenCounterRef,
    budget: PromptBudget,
    overlap: Overlap,
    parse_mode: ParseMode,
}

impl std::fmt::Debug for Generator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Generator")
            .field("model", &self.counter.model())
            .field("budget", &self.budget)
            .field("overlap", &self.overlap)
            .field("parse_mode", &self.parse_mode)
            .finish()
    }
}

impl Generator {
    /// Structured parsing by default; see [`Generator::with_parse_mode`].
    pub fn new(counter: TokenCounterRef, budget: PromptBudget, overlap: Overlap) -> Self {
        Self {
            counter,
            budget,
            overlap,
            parse_mode: ParseMode::Structured,
        }
    }

    pub fn with_parse_mode(mut self, parse_mode: ParseMode) -> Self {
        self.parse_mode = parse_mode;
        self
    }

    /// Generator for `config`, loading the tokenizer of `config.model`.
    pub fn from_config(config: &GenerationConfig) -> Result<Self, FlashcardError> {
        let counter = TiktokenCounter::for_model(&config.model)?;
        Ok(Self::new(Arc::new(counter), config.budget, config.overlap)
            .with_parse_mode(config.mode.parse_mode()))
    }

    pub fn counter(&self) -> &dyn TokenCounter {
        self.counter.as_ref()
    }

    pub fn budget(&self) -> &PromptBudget {
        &self.budget
    }

    pub fn parse_mode(&self) -> ParseMode {
        self.parse_mode
    }

    /// Size the run and, if needed, split the input into fragments.
    ///
    /// # Errors
    /// * [`FlashcardError::ModelMismatch`] if the counter belongs to another model.
    /// * [`FlashcardError::PromptTooLarge`] if the fixed prompt exceeds the
    ///   prompt allowance or leaves no room for input.
    /// * [`FlashcardError::InvalidBudget`] if the overlap swallows the fragment budget.
    pub fn plan(
        &self,
        model_id: &str,
        assembler: &PromptAssembler,
    ) -> Result<RunPlan, FlashcardError> {
        if self.counter.model() != model_id {
            return Err(FlashcardError::ModelMismatch {
                counter: self.counter.model().to_string(),
                requested: model_id.to_string(),
            });
        }

        let counter = self.counter.as_ref();
        let prompt_tokens = assembler.prompt_token_cost(counter);
        let input_tokens = assembler.input_token_cost(counter);
        let total = prompt_tokens + input_tokens;
        debug!(
            "Token accounting for {}: prompt {}, input {}, total {} (app limit {})",
            model_id,
            prompt_tokens,
            input_tokens,
            total,
            self.budget.app_token_limit()
        );

        if prompt_tokens > self.budget.prompt_token_limit() {
            return Err(FlashcardError::PromptTooLarge {
                prompt_tokens,
                limit: self.budget.prompt_token_limit(),
            });
        }

        if total < self.budget.app_token_limit() {
            return Ok(RunPlan {
                mode: RunMode::SingleShot,
                prompt_tokens,
                input_tokens,
                fragment_budget: None,
                inputs: vec![assembler.input().to_string()],
            });
        }

        let reserved = prompt_tokens + self.budget.completion_token_limit();
        let fragment_budget = self.budget.app_token_limit().saturating_sub(reserved);
        if fragment_budget == 0 {
            return Err(FlashcardError::PromptTooLarge {
                prompt_tokens,
                limit: self
                    .budget
                    .app_token_limit()
                    .saturating_sub(self.budget.completion_token_limit()),
            });
        }

        let fragments = chunk::split(counter, assembler.input(), fragment_budget, self.overlap)?;
        Ok(RunPlan {
            mode: RunMode::Batched,
            prompt_tokens,
            input_tokens,
            fragment_budget: Some(fragment_budget),
            inputs: fragments.into_iter().map(|f| f.text).collect(),
        })
    }

    /// Token accounting for a run, without calling the backend.
    pub fn estimate(
        &self,
        model_id: &str,
        assembler: &PromptAssembler,
    ) -> Result<TokenEstimate, FlashcardError> {
        let plan = self.plan(model_id, assembler)?;
        Ok(TokenEstimate {
            model: model_id.to_string(),
            mode: plan.mode,
            prompt_tokens: plan.prompt_tokens,
            input_tokens: plan.input_tokens,
            total_tokens: plan.prompt_tokens + plan.input_tokens,
            app_token_limit: self.budget.app_token_limit(),
            fragment_budget: plan.fragment_budget,
            batches: plan.batches(),
        })
    }

    /// Generate flashcards for `assembler`.
    ///
    /// Batches run strictly in order; card ids continue across batches.
    /// Progress is reported once per completed batch (`1/1` for a single
    /// call). A backend error aborts the run and discards every card
    /// produced so far; bad lines in a completion never do.
    pub async fn run<B: CompletionBackend>(
        &self,
        model_id: &str,
        assembler: &PromptAssembler,
        backend: &B,
        progress: Option<&dyn GenerationProgressCallback>,
    ) -> Result<GenerationOutput, FlashcardError> {
        let start = Instant::now();
        let plan = self.plan(model_id, assembler)?;
        let total_batches = plan.batches();
        let completion_budget = self.budget.completion_token_limit();

        info!(
            "Generating with {} in {:?} mode: {} batch(es), {} prompt + {} input tokens",
            model_id, plan.mode, total_batches, plan.prompt_tokens, plan.input_tokens
        );
        if let Some(cb) = progress {
            cb.on_generation_start(total_batches);
        }

        let mut cards = Vec::new();
        let mut issues = Vec::new();
        let mut next_id = 1;
        let mut dropped_lines = 0;
        let mut degraded_cards = 0;

        for (idx, input) in plan.inputs.iter().enumerate() {
            let batch = idx + 1;
            if let Some(cb) = progress {
                cb.on_batch_start(batch, total_batches);
            }

            let batch_assembler = assembler.with_input(input.as_str());
            let raw = backend
                .generate(model_id, &batch_assembler, completion_budget)
                .await
                .map_err(|e| {
                    warn!("Batch {}/{} failed, aborting run: {}", batch, total_batches, e);
                    FlashcardError::Generation(e)
                })?;

            let ParseOutcome {
                cards: batch_cards,
                issues: batch_issues,
            } = parse_completion(&raw, next_id, self.parse_mode);
            let produced = batch_cards.len();
            next_id += produced;
            for issue in batch_issues {
                if issue.is_dropped() {
                    dropped_lines += 1;
                } else {
                    degraded_cards += 1;
                }
                issues.push(issue.in_batch(batch));
            }
            cards.extend(batch_cards);

            info!("Batch {}/{}: {} cards", batch, total_batches, produced);
            if let Some(cb) = progress {
                cb.on_batch_complete(batch, total_batches, produced);
            }
        }

        let total_cards = cards.len();
        if let Some(cb) = progress {
            cb.on_generation_complete(total_batches, total_cards);
        }
        let total_duration_ms = start.elapsed().as_millis() as u64;
        info!(
            "Generated {} cards in {} batch(es), {} dropped line(s), {} degraded, {}ms",
            total_cards, total_batches, dropped_lines, degraded_cards, total_duration_ms
        );

        Ok(GenerationOutput {
            deck: FlashcardDeck::new(cards),
            stats: GenerationStats {
                mode: plan.mode,
                batches: total_batches,
                cards: total_cards,
                dropped_lines,
                degraded_cards,
                prompt_tokens: plan.prompt_tokens,
                input_tokens: plan.input_tokens,
                total_duration_ms,
            },
            issues,
        })
    }
}

// ── Entry points ─────────────────────────────────────────────────────────────

/// Generate a flashcard deck from `text`.
///
/// This is the primary entry point for the library.
///
/// # Errors
/// Returns `Err(FlashcardError)` for configuration problems (detected before
/// any LLM call), an unresolvable provider, or the first failed completion.
/// Malformed lines in a completion are reported in
/// [`GenerationOutput::issues`] instead.
pub async fn generate(
    text: impl AsRef<str>,
    config: &GenerationConfig,
) -> Result<GenerationOutput, FlashcardError> {
    let text = text.as_ref();
    if text.trim().is_empty() {
        return Err(FlashcardError::EmptyInput);
    }

    // ── Step 1: Tokenizer and prompt ─────────────────────────────────────
    let generator = Generator::from_config(config)?;
    let assembler = build_assembler(text, config);

    // ── Step 2: Size the run before touching the network ─────────────────
    generator.plan(&config.model, &assembler)?;

    // ── Step 3: Provider ─────────────────────────────────────────────────
    let provider = resolve_provider(config).await?;
    let backend = LlmBackend::from_config(provider, config);

    // ── Step 4: Run ──────────────────────────────────────────────────────
    generator
        .run(
            &config.model,
            &assembler,
            &backend,
            config.progress_callback.as_deref(),
        )
        .await
}

/// Synchronous wrapper around [`generate`].
///
/// Creates a Tokio runtime internally; do not call from within an async context.
pub fn generate_sync(
    text: impl AsRef<str>,
    config: &GenerationConfig,
) -> Result<GenerationOutput, FlashcardError> {
    tokio::runtime::Runtime::new()
        .map_err(|e| FlashcardError::Internal(format!("Failed to create tokio runtime: {}", e)))?
        .block_on(generate(text, config))
}

/// Token accounting for `text` under `config`.
///
/// Does not require an LLM provider or API key.
pub fn estimate(
    text: impl AsRef<str>,
    config: &GenerationConfig,
) -> Result<TokenEstimate, FlashcardError> {
    let generator = Generator::from_config(config)?;
    let assembler = build_assembler(text.as_ref(), config);
    generator.estimate(&config.model, &assembler)
}

/// Assemble the four prompt segments for `text`, taking overrides from
/// `config` and built-in prompts for everything else.
pub fn build_assembler(text: &str, config: &GenerationConfig) -> PromptAssembler {
    let system = match config.system_prompt {
        Some(ref custom) => custom.clone(),
        None => prompts::system_prompt(config.mode, config.language),
    };
    let system = match config.additional_instruction {
        Some(ref extra) => prompts::with_additional_instruction(&system, extra),
        None => system,
    };

    let (builtin_input, builtin_output) = prompts::example_exchange(config.mode, config.language);
    let (example_input, example_output) = match (&config.example_input, &config.example_output) {
        (Some(input), Some(output)) => (input.as_str(), output.as_str()),
        _ => (builtin_input, builtin_output),
    };

    PromptAssembler::new(system, example_input, example_output, text)
        .with_overhead(config.message_overhead_tokens)
}

/// Instantiate a named provider bound to `model`.
fn create_provider(provider_name: &str, model: &str) -> Result<Arc<dyn LLMProvider>, FlashcardError> {
    ProviderFactory::create_llm_provider(provider_name, model).map_err(|e| {
        FlashcardError::ProviderNotConfigured {
            provider: provider_name.to_string(),
            hint: format!("{e}"),
        }
    })
}

/// Resolve the LLM provider, from most-specific to least-specific.
///
/// 1. **Pre-built provider** (`config.provider`).
/// 2. **Named provider** (`config.provider_name`) with `config.model`.
/// 3. **`EDGEQUAKE_LLM_PROVIDER`** from the environment, with `config.model`.
/// 4. **`OPENAI_API_KEY`** present → OpenAI with `config.model`.
/// 5. **Full auto-detection** (`ProviderFactory::from_env`).
///
/// Steps 2–4 always bind `config.model`, the model the tokenizer was loaded
/// for; the environment chooses the provider, never a different model.
pub(crate) async fn resolve_provider(
    config: &GenerationConfig,
) -> Result<Arc<dyn LLMProvider>, FlashcardError> {
    if let Some(ref provider) = config.provider {
        return Ok(Arc::clone(provider));
    }

    if let Some(ref name) = config.provider_name {
        return create_provider(name, &config.model);
    }

    if let Ok(prov) = std::env::var("EDGEQUAKE_LLM_PROVIDER") {
        if !prov.is_empty() {
            return create_provider(&prov, &config.model);
        }
    }

    if let Ok(openai_key) = std::env::var("OPENAI_API_KEY") {
        if !openai_key.is_empty() {
            return create_provider("openai", &config.model);
        }
    }

    warn!(
        "No provider configured; auto-detecting. Token accounting assumes model {}",
        config.model
    );
    let (llm_provider, _embedding) =
        ProviderFactory::from_env().map_err(|e| FlashcardError::ProviderNotConfigured {
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
