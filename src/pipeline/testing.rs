//! Deterministic stand-ins for unit tests.

use crate::error::GenerationError;
use crate::pipeline::llm::CompletionBackend;
use crate::pipeline::messages::PromptAssembler;
use crate::pipeline::tokens::TokenCounter;
use std::collections::VecDeque;
use std::sync::Mutex;

/// One token per `char`; the token id is the code point.
pub(crate) struct CharCounter {
    model: String,
}

impl CharCounter {
    pub(crate) fn new(model: &str) -> Self {
        Self {
            model: model.to_string(),
        }
    }
}

impl TokenCounter for CharCounter {
    fn model(&self) -> &str {
        &self.model
    }

    fn encode(&self, text: &str) -> Vec<u32> {
        text.chars().map(u32::from).collect()
    }

    fn decode(&self, tokens: &[u32]) -> String {
        tokens
            .iter()
            .map(|t| char::from_u32(*t).unwrap_or(char::REPLACEMENT_CHARACTER))
            .collect()
    }
}

/// A recorded `generate` call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Call {
    pub model_id: String,
    pub input: String,
    pub completion_budget: usize,
}

/// Replays queued replies in order and records every call.
/// Once the queue is empty every call returns an empty completion.
#[derive(Default)]
pub(crate) struct ScriptedBackend {
    replies: Mutex<VecDeque<Result<String, GenerationError>>>,
    calls: Mutex<Vec<Call>>,
}

impl ScriptedBackend {
    pub(crate) fn new<I, S>(replies: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::with_results(replies.into_iter().map(|s| Ok(s.into())))
    }

    pub(crate) fn with_results(
        replies: impl IntoIterator<Item = Result<String, GenerationError>>,
    ) -> Self {
        Self {
            replies: Mutex::new(replies.into_iter().collect()),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub(crate) fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }
}

impl CompletionBackend for ScriptedBackend {
    async fn generate(
        &self,
        model_id: &str,
        assembler: &PromptAssembler,
        completion_token_budget: usize,
    ) -> Result<String, GenerationError> {
        self.calls.lock().unwrap().push(Call {
            model_id: model_id.to_string(),
            input: assembler.input().to_string(),
            completion_budget: completion_token_budget,
        });
        self.replies
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Ok(String::new()))
    }
}
