//! Output types: cards, decks, and per-run statistics.

use crate::error::LineIssue;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// The kind of question a card asks.
///
/// In structured mode the model self-classifies each card with a bracketed
/// tag; in fixed-type modes every card gets the mode's category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Category {
    Definition,
    OpenEnded,
    Unknown,
    MultipleChoice,
    Cloze,
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Category::Definition => "Definition",
            Category::OpenEnded => "OpenEnded",
            Category::Unknown => "Unknown",
            Category::MultipleChoice => "MultipleChoice",
            Category::Cloze => "Cloze",
        };
        f.write_str(s)
    }
}

/// One question/answer unit. Immutable once parsed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Flashcard {
    /// 1-based, unique within a run.
    pub id: usize,
    #[serde(rename = "type")]
    pub category: Category,
    #[serde(rename = "frontSide")]
    pub front: String,
    #[serde(rename = "backSide")]
    pub back: String,
}

impl Flashcard {
    pub fn new(id: usize, category: Category, front: impl Into<String>, back: impl Into<String>) -> Self {
        Self {
            id,
            category,
            front: front.into(),
            back: back.into(),
        }
    }

    /// Placeholder emitted for a line whose tag could not be classified.
    pub fn degraded(id: usize) -> Self {
        Self::new(id, Category::Unknown, "", "")
    }

    /// True for placeholders produced by [`Flashcard::degraded`].
    pub fn is_degraded(&self) -> bool {
        self.category == Category::Unknown && self.front.is_empty()
    }
}

/// The ordered cards produced by one generation run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FlashcardDeck {
    cards: Vec<Flashcard>,
}

impl FlashcardDeck {
    pub fn new(cards: Vec<Flashcard>) -> Self {
        Self { cards }
    }

    pub fn len(&self) -> usize {
        self.cards.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cards.is_empty()
    }

    pub fn cards(&self) -> &[Flashcard] {
        &self.cards
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Flashcard> {
        self.cards.iter()
    }

    pub fn into_cards(self) -> Vec<Flashcard> {
        self.cards
    }

    /// Number of cards per category, in category order.
    pub fn count_by_category(&self) -> BTreeMap<Category, usize> {
        let mut counts = BTreeMap::new();
        for card in &self.cards {
            *counts.entry(card.category).or_insert(0) += 1;
        }
        counts
    }
}

impl<'a> IntoIterator for &'a FlashcardDeck {
    type Item = &'a Flashcard;
    type IntoIter = std::slice::Iter<'a, Flashcard>;

    fn into_iter(self) -> Self::IntoIter {
        self.cards.iter()
    }
}

/// Whether a run fit into one request or had to be chunked.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunMode {
    SingleShot,
    Batched,
}

/// Statistics for a completed run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationStats {
    pub mode: RunMode,
    /// Number of completion calls made (== fragments in batched mode).
    pub batches: usize,
    pub cards: usize,
    /// Lines that produced no card.
    pub dropped_lines: usize,
    /// Cards emitted as `Unknown` placeholders.
    pub degraded_cards: usize,
    /// Token cost of the fixed prompt segments (per call).
    pub prompt_tokens: usize,
    /// Token cost of the full input segment before any splitting.
    pub input_tokens: usize,
    pub total_duration_ms: u64,
}

/// The full result of [`crate::generate::Generator::run`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationOutput {
    pub deck: FlashcardDeck,
    pub stats: GenerationStats,
    /// Every dropped or degraded line, in encounter order.
    pub issues: Vec<LineIssue>,
}

/// Token accounting for a prospective run, computed without any LLM call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenEstimate {
    pub model: String,
    pub mode: RunMode,
    pub prompt_tokens: usize,
    pub input_tokens: usize,
    pub total_tokens: usize,
    pub app_token_limit: usize,
    /// Token budget per fragment; `None` in single-shot mode.
    pub fragment_budget: Option<usize>,
    /// Completion calls the run would make.
    pub batches: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deck_counts_by_category() {
        let deck = FlashcardDeck::new(vec![
            Flashcard::new(1, Category::Definition, "Q1", "A1"),
            Flashcard::new(2, Category::OpenEnded, "Q2", "A2"),
            Flashcard::new(3, Category::Definition, "Q3", "A3"),
            Flashcard::degraded(4),
        ]);
        let counts = deck.count_by_category();
        assert_eq!(counts[&Category::Definition], 2);
        assert_eq!(counts[&Category::OpenEnded], 1);
        assert_eq!(counts[&Category::Unknown], 1);
        assert!(!counts.contains_key(&Category::Cloze));
    }

    #[test]
    fn degraded_card_is_empty_unknown() {
        let card = Flashcard::degraded(7);
        assert_eq!(card.id, 7);
        assert!(card.is_degraded());
        assert!(!Flashcard::new(1, Category::Unknown, "front", "").is_degraded());
    }

    #[test]
    fn card_serialises_as_list_view() {
        let card = Flashcard::new(1, Category::Definition, "Q", "A");
        let json = serde_json::to_value(&card).unwrap();
        assert_eq!(json["id"], 1);
        assert_eq!(json["type"], "Definition");
        assert_eq!(json["frontSide"], "Q");
        assert_eq!(json["backSide"], "A");
    }

    #[test]
    fn deck_serialises_as_plain_array() {
        let deck = FlashcardDeck::new(vec![Flashcard::new(1, Category::Cloze, "a ___ c", "b")]);
        let json = serde_json::to_string(&deck).unwrap();
        assert!(json.starts_with('['), "got: {json}");
    }
}
