//! # edgequake-flashcards
//!
//! Turn arbitrary-length text into flashcards with a language model.
//!
//! ## Why this crate?
//!
//! A chapter of a textbook rarely fits into one completion request together
//! with the instructions, an example and room for the reply. This crate does
//! the token accounting with the model's own tokenizer, splits the input into
//! overlapping token windows only when it has to, drives one completion per
//! window, and recovers cards from the model's line-based output without
//! letting one bad line spoil a multi-minute run.
//!
//! ## Pipeline Overview
//!
//! ```text
//! text
//!  │
//!  ├─ 1. Prompt   system instruction + example exchange + input
//!  ├─ 2. Size     prompt / input token cost against the budget
//!  ├─ 3. Chunk    sliding token windows (only if the input does not fit)
//!  ├─ 4. LLM      one completion per batch, strictly in order
//!  ├─ 5. Parse    "[Tag] front; back" lines → cards, bad lines reported
//!  └─ 6. Output   FlashcardDeck + per-run stats + line issues
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use edgequake_flashcards::{generate, GenerationConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // Provider auto-detected from OPENAI_API_KEY / EDGEQUAKE_LLM_PROVIDER / ...
//!     let config = GenerationConfig::default();
//!     let text = std::fs::read_to_string("chapter.txt")?;
//!     let output = generate(&text, &config).await?;
//!     for card in &output.deck {
//!         println!("{} | {} | {}", card.category, card.front, card.back);
//!     }
//!     eprintln!("{} cards in {} batch(es)", output.stats.cards, output.stats.batches);
//!     Ok(())
//! }
//! ```
//!
//! ## Bring your own backend
//!
//! [`Generator`] runs against anything implementing [`CompletionBackend`],
//! so the orchestration can be driven by a queue worker, a cached replay or a
//! test double without an API key.
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `flashcards` binary (clap + anyhow + tracing-subscriber + indicatif) |
//!
//! Disable `cli` when using only the library:
//! ```toml
//! edgequake-flashcards = { version = "0.1", default-features = false }
//! ```

// ── Modules ──────────────────────────────────────────────────────────────

pub mod config;
pub mod deck;
pub mod error;
pub mod generate;
pub mod pipeline;
pub mod progress;
pub mod prompts;
pub mod stream;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use config::{
    GenerationConfig, GenerationConfigBuilder, GenerationMode, Language, Overlap, PromptBudget,
};
pub use deck::{
    Category, Flashcard, FlashcardDeck, GenerationOutput, GenerationStats, RunMode, TokenEstimate,
};
pub use error::{FlashcardError, GenerationError, LineIssue};
pub use generate::{build_assembler, estimate, generate, generate_sync, Generator, RunPlan};
pub use pipeline::chunk::Fragment;
pub use pipeline::llm::{CompletionBackend, LlmBackend};
pub use pipeline::messages::{PromptAssembler, Role};
pub use pipeline::parse::{parse_completion, ParseMode, ParseOutcome};
pub use pipeline::tokens::{count_tokens, TiktokenCounter, TokenCounter};
pub use progress::{
    progress_fn, ChannelProgress, GenerationProgressCallback, NoopProgressCallback,
    ProgressCallback, ProgressEvent,
};
pub use stream::{generate_stream, stream_batches, BatchResult, BatchStream};
