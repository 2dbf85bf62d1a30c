//! Token-window chunking of oversized input.
//!
//! The input is tokenized once and a window of `budget` tokens slides over
//! it, advancing `budget - overlap` tokens per step. Each window is decoded
//! back to text. Windows are addressed by token offsets, so fragments are
//! exactly reproducible for a given tokenizer, budget and overlap.

use crate::config::Overlap;
use crate::error::FlashcardError;
use crate::pipeline::tokens::TokenCounter;
use tracing::debug;

/// One window of the tokenized input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fragment {
    /// First token offset (inclusive).
    pub start: usize,
    /// Last token offset (exclusive), clipped to the input length.
    pub end: usize,
    pub text: String,
}

impl Fragment {
    /// Number of tokens covered by this fragment.
    pub fn token_len(&self) -> usize {
        self.end - self.start
    }
}

/// Token ranges of the windows over an input of `token_len` tokens.
///
/// # Errors
/// [`FlashcardError::InvalidBudget`] if `budget == 0` or `overlap >= budget`.
pub fn windows(
    token_len: usize,
    budget: usize,
    overlap: usize,
) -> Result<Vec<(usize, usize)>, FlashcardError> {
    if budget == 0 || overlap >= budget {
        return Err(FlashcardError::InvalidBudget { budget, overlap });
    }
    let stride = budget - overlap;
    let ranges = (0..token_len)
        .step_by(stride)
        .map(|start| (start, (start + budget).min(token_len)))
        .collect();
    Ok(ranges)
}

/// Split `text` into overlapping fragments of at most `budget` tokens.
///
/// Text that fits into one window comes back as a single fragment equal to
/// the input; empty text yields no fragments. A window boundary that falls
/// inside a multi-byte character decodes that character as U+FFFD.
///
/// # Errors
/// [`FlashcardError::InvalidBudget`] if the resolved overlap is not smaller
/// than `budget`, or `budget` is zero.
pub fn split(
    counter: &dyn TokenCounter,
    text: &str,
    budget: usize,
    overlap: Overlap,
) -> Result<Vec<Fragment>, FlashcardError> {
    let overlap_tokens = overlap.resolve(budget);
    let tokens = counter.encode(text);
    let ranges = windows(tokens.len(), budget, overlap_tokens)?;

    debug!(
        "Splitting {} tokens into {} fragments (budget {}, overlap {})",
        tokens.len(),
        ranges.len(),
        budget,
        overlap_tokens
    );

    if let &[(start, end)] = ranges.as_slice() {
        return Ok(vec![Fragment {
            start,
            end,
            text: text.to_string(),
        }]);
    }

    Ok(ranges
        .into_iter()
        .map(|(start, end)| Fragment {
            start,
            end,
            text: counter.decode(&tokens[start..end]),
        })
        .collect())
}
