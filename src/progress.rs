//! Progress reporting for generation runs.
//!
//! Inject an [`Arc<dyn GenerationProgressCallback>`] via
//! [`crate::config::GenerationConfigBuilder::progress_callback`] (or pass one
//! to [`crate::generate::Generator::run`]) to receive events as batches
//! complete. Events are emitted synchronously from the run, in batch order.
//!
//! Three ready-made adapters cover the usual integrations:
//!
//! * [`NoopProgressCallback`]: the default.
//! * [`progress_fn`]: a plain `(current_batch, total_batches)` closure.
//! * [`ChannelProgress`]: forwards [`ProgressEvent`]s into a Tokio channel
//!   for an embedding system that polls task state elsewhere.
//!
//! # Example
//!
//! ```rust
//! use edgequake_flashcards::{progress_fn, GenerationConfig};
//!
//! let config = GenerationConfig::builder()
//!     .progress_callback(progress_fn(|current, total| {
//!         eprintln!("batch {current}/{total} done");
//!     }))
//!     .build()
//!     .unwrap();
//! ```

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::mpsc;

/// Receives generation events. All methods default to no-ops.
pub trait GenerationProgressCallback: Send + Sync {
    /// Called once, after sizing, before the first completion call.
    ///
    /// # Arguments
    /// * `total_batches` — completion calls the run will make (1 in single-shot mode)
    fn on_generation_start(&self, total_batches: usize) {
        let _ = total_batches;
    }

    /// Called just before the completion request for a batch is sent.
    fn on_batch_start(&self, batch: usize, total_batches: usize) {
        let _ = (batch, total_batches);
    }

    /// Called after a batch's completion has been parsed.
    ///
    /// # Arguments
    /// * `batch`         — 1-indexed batch number
    /// * `total_batches` — total batches in the run
    /// * `cards`         — cards produced by this batch (degraded ones included)
    fn on_batch_complete(&self, batch: usize, total_batches: usize, cards: usize) {
        let _ = (batch, total_batches, cards);
    }

    /// Called once after the last batch.
    fn on_generation_complete(&self, total_batches: usize, total_cards: usize) {
        let _ = (total_batches, total_cards);
    }
}

/// A no-op implementation for callers that don't need progress events.
pub struct NoopProgressCallback;

impl GenerationProgressCallback for NoopProgressCallback {}

/// Convenience alias matching the type stored in [`crate::config::GenerationConfig`].
pub type ProgressCallback = Arc<dyn GenerationProgressCallback>;

struct FnProgress<F>(F);

impl<F> GenerationProgressCallback for FnProgress<F>
where
    F: Fn(usize, usize) + Send + Sync,
{
    fn on_batch_complete(&self, batch: usize, total_batches: usize, _cards: usize) {
        (self.0)(batch, total_batches)
    }
}

/// Adapt a `(current_batch, total_batches)` closure. It is called once per
/// completed batch, so a single-shot run reports `(1, 1)`.
pub fn progress_fn<F>(f: F) -> ProgressCallback
where
    F: Fn(usize, usize) + Send + Sync + 'static,
{
    Arc::new(FnProgress(f))
}

/// One progress event, as delivered by [`ChannelProgress`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum ProgressEvent {
    Started { total_batches: usize },
    BatchStarted { batch: usize, total_batches: usize },
    BatchCompleted { batch: usize, total_batches: usize, cards: usize },
    Finished { total_batches: usize, total_cards: usize },
}

/// Forwards every callback as a [`ProgressEvent`] into an unbounded channel.
///
/// Sending never blocks the run; events are discarded once the receiver is
/// dropped.
#[derive(Clone)]
pub struct ChannelProgress {
    tx: mpsc::UnboundedSender<ProgressEvent>,
}

impl ChannelProgress {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<ProgressEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    fn send(&self, event: ProgressEvent) {
        let _ = self.tx.send(event);
    }
}

impl GenerationProgressCallback for ChannelProgress {
    fn on_generation_start(&self, total_batches: usize) {
        self.send(ProgressEvent::Started { total_batches });
    }

    fn on_batch_start(&self, batch: usize, total_batches: usize) {
        self.send(ProgressEvent::BatchStarted {
            batch,
            total_batches,
        });
    }

    fn on_batch_complete(&self, batch: usize, total_batches: usize, cards: usize) {
        self.send(ProgressEvent::BatchCompleted {
            batch,
            total_batches,
            cards,
        });
    }

    fn on_generation_complete(&self, total_batches: usize, total_cards: usize) {
        self.send(ProgressEvent::Finished {
            total_batches,
            total_cards,
        });
    }
}
