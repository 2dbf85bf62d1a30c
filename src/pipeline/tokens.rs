//! Token counting: how many tokens a string costs for a given model.
//!
//! Every sizing decision in the pipeline (single-shot vs. batched, fragment
//! size, completion reservation) is derived from these counts, so the counter
//! must use the exact tokenizer of the target model. An unknown model is a
//! configuration error; there is no approximate fallback.

use crate::error::FlashcardError;
use std::fmt;
use std::sync::Arc;
use tiktoken_rs::tokenizer::get_tokenizer;
use tiktoken_rs::{get_bpe_from_tokenizer, CoreBPE};
use tracing::debug;

/// Counts, encodes and decodes tokens for one specific model.
///
/// Implementations must be deterministic: the same text always yields the
/// same token sequence. `decode(encode(text)) == text` for any `text`.
pub trait TokenCounter: Send + Sync {
    /// Model id this counter is bound to.
    fn model(&self) -> &str;

    /// Encode text into token ids.
    fn encode(&self, text: &str) -> Vec<u32>;

    /// Decode a token window back into text.
    ///
    /// Windows may start or end inside a multi-byte character; such partial
    /// bytes are replaced with U+FFFD instead of failing.
    fn decode(&self, tokens: &[u32]) -> String;

    /// Number of tokens `text` consumes.
    fn count(&self, text: &str) -> usize {
        self.encode(text).len()
    }
}

/// Shared, dynamically dispatched token counter.
pub type TokenCounterRef = Arc<dyn TokenCounter>;

/// BPE token counter backed by `tiktoken-rs`.
pub struct TiktokenCounter {
    model: String,
    bpe: CoreBPE,
}

impl TiktokenCounter {
    /// Load the tokenizer used by `model`.
    ///
    /// # Errors
    /// * [`FlashcardError::UnsupportedModel`] if no tokenizer is known for `model`.
    /// * [`FlashcardError::Tokenizer`] if the BPE ranks fail to load.
    pub fn for_model(model: &str) -> Result<Self, FlashcardError> {
        let tokenizer = get_tokenizer(model).ok_or_else(|| FlashcardError::UnsupportedModel {
            model: model.to_string(),
        })?;
        let bpe = get_bpe_from_tokenizer(tokenizer)
            .map_err(|e| FlashcardError::Tokenizer(format!("loading {tokenizer:?}: {e}")))?;
        debug!("Loaded {:?} tokenizer for model {}", tokenizer, model);
        Ok(Self {
            model: model.to_string(),
            bpe,
        })
    }
}

impl fmt::Debug for TiktokenCounter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TiktokenCounter")
            .field("model", &self.model)
            .finish_non_exhaustive()
    }
}

impl TokenCounter for TiktokenCounter {
    fn model(&self) -> &str {
        &self.model
    }

    fn encode(&self, text: &str) -> Vec<u32> {
        // Ordinary encoding: user text containing "<|endoftext|>" is content,
        // not a control token.
        self.bpe.encode_ordinary(text)
    }

    fn decode(&self, tokens: &[u32]) -> String {
        let bytes: Vec<u8> = self
            .bpe
            ._decode_native_and_split(tokens.to_vec())
            .flatten()
            .collect();
        String::from_utf8_lossy(&bytes).into_owned()
    }
}

/// One-off count for `model_id`. Loads the tokenizer on every call; hold a
/// [`TiktokenCounter`] instead when counting repeatedly.
pub fn count_tokens(model_id: &str, text: &str) -> Result<usize, FlashcardError> {
    Ok(TiktokenCounter::for_model(model_id)?.count(text))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_model_is_rejected() {
        let err = TiktokenCounter::for_model("definitely-not-a-model").unwrap_err();
        assert!(
            matches!(err, FlashcardError::UnsupportedModel { ref model } if model == "definitely-not-a-model"),
            "got: {err:?}"
        );
    }

    #[test]
    fn count_is_deterministic() {
        let counter = TiktokenCounter::for_model("gpt-3.5-turbo").unwrap();
        let text = "Photosynthesis converts light energy into chemical energy.";
        let first = counter.count(text);
        assert!(first > 0);
        assert_eq!(first, counter.count(text));
        assert_eq!(counter.count(""), 0);
    }

    #[test]
    fn encode_decode_round_trip() {
        let counter = TiktokenCounter::for_model("gpt-4o-mini").unwrap();
        let text = "Die Zelle ist die kleinste Einheit des Lebens — ça va? 🚀";
        let tokens = counter.encode(text);
        assert_eq!(counter.decode(&tokens), text);
    }

    #[test]
    fn partial_window_decodes_lossily() {
        let counter = TiktokenCounter::for_model("gpt-3.5-turbo").unwrap();
        let tokens = counter.encode("🚀🚀🚀");
        // Any prefix must decode without panicking, even mid-character.
        for end in 0..=tokens.len() {
            let _ = counter.decode(&tokens[..end]);
        }
    }

    #[test]
    fn special_token_text_is_counted_as_content() {
        let counter = TiktokenCounter::for_model("gpt-3.5-turbo").unwrap();
        assert!(counter.count("<|endoftext|>") > 1);
    }

    #[test]
    fn count_tokens_helper() {
        assert_eq!(count_tokens("gpt-4", "").unwrap(), 0);
        assert!(count_tokens("gpt-4", "hello world").unwrap() >= 2);
        assert!(count_tokens("nope", "hello").is_err());
    }
}
