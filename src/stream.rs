//! Streaming generation API: emit cards batch by batch.
//!
//! Long inputs take many completion calls. [`generate_stream`] yields one
//! [`BatchResult`] per call as soon as it is parsed, so callers can show
//! cards early or persist them incrementally.
//!
//! Batches are still produced strictly in order (ids continue across
//! batches). The first failed completion is yielded as an `Err` and ends the
//! stream; batches already yielded are not retracted, so all-or-nothing
//! semantics are the caller's choice here, unlike [`crate::generate::generate`].

use crate::config::GenerationConfig;
use crate::deck::Flashcard;
use crate::error::{FlashcardError, LineIssue};
use crate::generate::{build_assembler, resolve_provider, Generator};
use crate::pipeline::llm::{CompletionBackend, LlmBackend};
use crate::pipeline::messages::PromptAssembler;
use crate::pipeline::parse::parse_completion;
use crate::progress::ProgressCallback;
use futures::stream;
use serde::{Deserialize, Serialize};
use std::pin::Pin;
use tokio_stream::Stream;
use tracing::{info, warn};

/// Cards and issues of one completion call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchResult {
    /// 1-indexed batch number.
    pub batch: usize,
    pub total_batches: usize,
    pub cards: Vec<Flashcard>,
    pub issues: Vec<LineIssue>,
}

/// A boxed stream of batch results.
pub type BatchStream = Pin<Box<dyn Stream<Item = Result<BatchResult, FlashcardError>> + Send>>;

struct StreamState<B> {
    generator: Generator,
    model_id: String,
    assembler: PromptAssembler,
    backend: B,
    inputs: std::vec::IntoIter<String>,
    batch: usize,
    total_batches: usize,
    next_id: usize,
    progress: Option<ProgressCallback>,
    failed: bool,
}

/// Stream the batches of a run over any [`CompletionBackend`].
///
/// Sizing happens eagerly: configuration errors are returned here, before
/// the stream is created and before any completion call.
pub fn stream_batches<B>(
    generator: Generator,
    model_id: impl Into<String>,
    assembler: PromptAssembler,
    backend: B,
    progress: Option<ProgressCallback>,
) -> Result<BatchStream, FlashcardError>
where
    B: CompletionBackend + 'static,
{
    let model_id = model_id.into();
    let plan = generator.plan(&model_id, &assembler)?;
    let total_batches = plan.batches();
    info!(
        "Streaming {} batch(es) with {} ({:?} mode)",
        total_batches, model_id, plan.mode
    );
    if let Some(ref cb) = progress {
        cb.on_generation_start(total_batches);
    }

    let state = StreamState {
        generator,
        model_id,
        assembler,
        backend,
        inputs: plan.inputs.into_iter(),
        batch: 0,
        total_batches,
        next_id: 1,
        progress,
        failed: false,
    };

    let s = stream::unfold(state, |mut st| async move {
        if st.failed {
            return None;
        }
        let Some(input) = st.inputs.next() else {
            if let Some(ref cb) = st.progress {
                cb.on_generation_complete(st.total_batches, st.next_id - 1);
            }
            return None;
        };
        st.batch += 1;
        if let Some(ref cb) = st.progress {
            cb.on_batch_start(st.batch, st.total_batches);
        }

        let batch_assembler = st.assembler.with_input(input);
        let completion_budget = st.generator.budget().completion_token_limit();
        let raw = match st
            .backend
            .generate(&st.model_id, &batch_assembler, completion_budget)
            .await
        {
            Ok(raw) => raw,
            Err(e) => {
                warn!("Batch {}/{} failed, ending stream: {}", st.batch, st.total_batches, e);
                st.failed = true;
                return Some((Err(FlashcardError::Generation(e)), st));
            }
        };

        let parsed = parse_completion(&raw, st.next_id, st.generator.parse_mode());
        st.next_id += parsed.cards.len();
        if let Some(ref cb) = st.progress {
            cb.on_batch_complete(st.batch, st.total_batches, parsed.cards.len());
        }
        let result = BatchResult {
            batch: st.batch,
            total_batches: st.total_batches,
            cards: parsed.cards,
            issues: parsed
                .issues
                .into_iter()
                .map(|i| i.in_batch(st.batch))
                .collect(),
        };
        Some((Ok(result), st))
    });

    Ok(Box::pin(s))
}

/// Generate flashcards from `text`, streaming one result per batch.
///
/// # Returns
/// - `Ok(BatchStream)` — a stream of `Result<BatchResult, FlashcardError>`
/// - `Err(FlashcardError)` — configuration or provider error, before any call
///
/// # Example
/// ```rust,no_run
/// use edgequake_flashcards::{generate_stream, GenerationConfig};
/// use futures::StreamExt;
///
/// # async fn run() -> Result<(), Box<dyn std::error::Error>> {
/// let config = GenerationConfig::default();
/// let mut batches = generate_stream("A long chapter ...", &config).await?;
/// while let Some(batch) = batches.next().await {
///     let batch = batch?;
///     println!("batch {}/{}: {} cards", batch.batch, batch.total_batches, batch.cards.len());
/// }
/// # Ok(())
/// # }
/// ```
pub async fn generate_stream(
    text: impl AsRef<str>,
    config: &GenerationConfig,
) -> Result<BatchStream, FlashcardError> {
    let text = text.as_ref();
    if text.trim().is_empty() {
        return Err(FlashcardError::EmptyInput);
    }
    let generator = Generator::from_config(config)?;
    let assembler = build_assembler(text, config);
    generator.plan(&config.model, &assembler)?;

    let provider = resolve_provider(config).await?;
    let backend = LlmBackend::from_config(provider, config);
    stream_batches(
        generator,
        config.model.clone(),
        assembler,
        backend,
        config.progress_callback.clone(),
    )
}
