//! Pipeline stages for flashcard generation.
//!
//! Each submodule implements one step and is testable on its own; the
//! orchestration that strings them together lives in [`crate::generate`].
//!
//! ## Data Flow
//!
//! ```text
//! text ──▶ messages ──▶ (chunk) ──▶ llm ──▶ parse
//!          (4 segments)  (windows)   (call)  (cards)
//!             ▲             ▲
//!             └── tokens ───┘
//! ```
//!
//! 1. [`tokens`]   — exact per-model token counts; every sizing decision uses them
//! 2. [`messages`] — the system / example / input segments of a call and their cost
//! 3. [`chunk`]    — sliding token windows over input that does not fit in one call
//! 4. [`llm`]      — the completion capability; the only stage with network I/O
//! 5. [`parse`]    — line-by-line recovery of cards from completion text

pub mod chunk;
pub mod llm;
pub mod messages;
pub mod parse;
pub mod tokens;

#[cfg(test)]
pub(crate) mod testing;
