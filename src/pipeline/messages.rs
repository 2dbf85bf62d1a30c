//! Prompt assembly: the four ordered segments of a generation call.
//!
//! A call always consists of the same shape of conversation:
//!
//! 1. **system**: the card-writing instruction
//! 2. **user**: an example input
//! 3. **assistant**: the example output for that input
//! 4. **user**: the actual input (the whole text, or one fragment of it)
//!
//! The first three segments are the *prompt*; their cost is fixed for a run.
//! Only the fourth varies between batches, and each batch gets its own
//! assembler via [`PromptAssembler::with_input`].

use crate::pipeline::tokens::TokenCounter;
use edgequake_llm::ChatMessage;
use std::fmt;
use std::sync::Arc;

/// Per-call token overhead of the chat wire format on top of the role and
/// content tokens of the prompt segments.
pub const DEFAULT_MESSAGE_OVERHEAD_TOKENS: usize = 18;

/// Speaker of one segment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Role {
    System,
    User,
    Assistant,
}

impl Role {
    /// Wire name of the role; also what gets counted as the role's tokens.
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::System => "system",
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The four segments of one generation call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PromptAssembler {
    system: Arc<str>,
    example_input: Arc<str>,
    example_output: Arc<str>,
    input: String,
    overhead_tokens: usize,
}

impl PromptAssembler {
    pub fn new(
        system: impl Into<Arc<str>>,
        example_input: impl Into<Arc<str>>,
        example_output: impl Into<Arc<str>>,
        input: impl Into<String>,
    ) -> Self {
        Self {
            system: system.into(),
            example_input: example_input.into(),
            example_output: example_output.into(),
            input: input.into(),
            overhead_tokens: DEFAULT_MESSAGE_OVERHEAD_TOKENS,
        }
    }

    /// Replace the wire-format overhead added to the prompt cost.
    pub fn with_overhead(mut self, tokens: usize) -> Self {
        self.overhead_tokens = tokens;
        self
    }

    /// A new assembler sharing this one's prompt segments, with `input`
    /// as the fourth segment.
    pub fn with_input(&self, input: impl Into<String>) -> Self {
        Self {
            system: Arc::clone(&self.system),
            example_input: Arc::clone(&self.example_input),
            example_output: Arc::clone(&self.example_output),
            input: input.into(),
            overhead_tokens: self.overhead_tokens,
        }
    }

    pub fn system(&self) -> &str {
        &self.system
    }

    pub fn input(&self) -> &str {
        &self.input
    }

    pub fn overhead_tokens(&self) -> usize {
        self.overhead_tokens
    }

    /// `(role, text)` pairs in call order. Each call yields the same sequence.
    pub fn as_ordered_pairs(&self) -> impl Iterator<Item = (Role, &str)> + '_ {
        [
            (Role::System, &*self.system),
            (Role::User, &*self.example_input),
            (Role::Assistant, &*self.example_output),
            (Role::User, self.input.as_str()),
        ]
        .into_iter()
    }

    /// Cost of the system and example segments, including the per-call overhead.
    pub fn prompt_token_cost(&self, counter: &dyn TokenCounter) -> usize {
        self.overhead_tokens
            + self
                .as_ordered_pairs()
                .take(3)
                .map(|(role, text)| pair_cost(counter, role, text))
                .sum::<usize>()
    }

    /// Cost of the input segment alone.
    pub fn input_token_cost(&self, counter: &dyn TokenCounter) -> usize {
        pair_cost(counter, Role::User, &self.input)
    }

    pub fn total_token_cost(&self, counter: &dyn TokenCounter) -> usize {
        self.prompt_token_cost(counter) + self.input_token_cost(counter)
    }

    /// The segments as provider chat messages.
    pub fn to_chat_messages(&self) -> Vec<ChatMessage> {
        self.as_ordered_pairs()
            .map(|(role, text)| match role {
                Role::System => ChatMessage::system(text),
                Role::User => ChatMessage::user(text),
                Role::Assistant => ChatMessage::assistant(text),
            })
            .collect()
    }
}

fn pair_cost(counter: &dyn TokenCounter, role: Role, text: &str) -> usize {
    counter.count(role.as_str()) + counter.count(text)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::testing::CharCounter;

    fn assembler() -> PromptAssembler {
        PromptAssembler::new("sys", "ex-in", "ex-out", "the input").with_overhead(0)
    }

    #[test]
    fn pairs_are_in_fixed_order_and_restartable() {
        let a = assembler();
        let roles: Vec<Role> = a.as_ordered_pairs().map(|(r, _)| r).collect();
        assert_eq!(
            roles,
            vec![Role::System, Role::User, Role::Assistant, Role::User]
        );
        let first: Vec<_> = a.as_ordered_pairs().collect();
        let second: Vec<_> = a.as_ordered_pairs().collect();
        assert_eq!(first, second);
        assert_eq!(first[3].1, "the input");
    }

    #[test]
    fn costs_count_role_and_text() {
        let counter = CharCounter::new("test-model");
        let a = assembler();
        // "system"+"sys" + "user"+"ex-in" + "assistant"+"ex-out"
        assert_eq!(a.prompt_token_cost(&counter), 6 + 3 + 4 + 5 + 9 + 6);
        // "user"+"the input"
        assert_eq!(a.input_token_cost(&counter), 4 + 9);
    }

    #[test]
    fn overhead_is_added_to_prompt_cost_only() {
        let counter = CharCounter::new("test-model");
        let base = assembler();
        let padded = assembler().with_overhead(18);
        assert_eq!(
            padded.prompt_token_cost(&counter),
            base.prompt_token_cost(&counter) + 18
        );
        assert_eq!(
            padded.input_token_cost(&counter),
            base.input_token_cost(&counter)
        );
        assert_eq!(
            PromptAssembler::new("", "", "", "").overhead_tokens(),
            DEFAULT_MESSAGE_OVERHEAD_TOKENS
        );
    }

    #[test]
    fn total_is_prompt_plus_input() {
        let counter = CharCounter::new("test-model");
        for input in ["", "x", "a much longer piece of input text"] {
            let a = PromptAssembler::new("system text", "ein", "eout", input);
            assert_eq!(
                a.total_token_cost(&counter),
                a.prompt_token_cost(&counter) + a.input_token_cost(&counter)
            );
        }
    }

    #[test]
    fn with_input_keeps_prompt_segments() {
        let counter = CharCounter::new("test-model");
        let a = assembler();
        let b = a.with_input("fragment two");
        assert_eq!(b.input(), "fragment two");
        assert_eq!(a.input(), "the input");
        assert_eq!(a.prompt_token_cost(&counter), b.prompt_token_cost(&counter));
        assert_eq!(b.system(), "sys");
    }

    #[test]
    fn chat_messages_have_four_entries() {
        assert_eq!(assembler().to_chat_messages().len(), 4);
    }
}
