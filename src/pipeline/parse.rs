//! Completion parsing: raw model text → flashcards.
//!
//! The model is asked for one card per line, `front; back`, optionally
//! prefixed with a bracketed category tag (`[Term] Mitochondrion; ...`).
//! Models do not always comply, so every line is parsed on its own and
//! classified as one of three [`LineOutcome`]s:
//!
//! | Outcome    | Card emitted             | Example                          |
//! |------------|--------------------------|----------------------------------|
//! | `Parsed`   | yes                      | `[Term] ATP; energy carrier`     |
//! | `Degraded` | `Unknown`, empty sides   | `[Mystery] Q; A`                 |
//! | `Dropped`  | no                       | `notaline`, `Q without tag; A`   |
//!
//! No line can fail the whole completion.

use crate::deck::{Category, Flashcard};
use crate::error::LineIssue;
use once_cell::sync::Lazy;
use regex::Regex;
use tracing::warn;

/// How lines are turned into cards.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParseMode {
    /// Each line carries a `[tag]` that selects the category.
    Structured,
    /// Every line is a card of the given category; no tag expected.
    Fixed(Category),
}

/// Result of parsing one line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LineOutcome {
    Parsed(Flashcard),
    Dropped(LineIssue),
    Degraded(Flashcard, LineIssue),
}

/// Cards and issues from one completion.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParseOutcome {
    pub cards: Vec<Flashcard>,
    pub issues: Vec<LineIssue>,
}

impl ParseOutcome {
    /// Lines that produced no card.
    pub fn dropped(&self) -> usize {
        self.issues.iter().filter(|i| i.is_dropped()).count()
    }

    /// Placeholder cards among [`ParseOutcome::cards`].
    pub fn degraded(&self) -> usize {
        self.issues.len() - self.dropped()
    }
}

// ── Completion cleanup ───────────────────────────────────────────────────────

static RE_OUTER_FENCE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)^```[A-Za-z0-9_-]*\n(.*?)\n?```\s*$").unwrap());

/// Normalise line endings and strip an outer Markdown code fence.
pub fn clean_completion(raw: &str) -> String {
    let normalised = raw.replace("\r\n", "\n").replace('\r', "\n");
    let trimmed = normalised.trim();
    match RE_OUTER_FENCE.captures(trimmed) {
        Some(caps) => caps[1].to_string(),
        None => trimmed.to_string(),
    }
}

// ── Line parsing ─────────────────────────────────────────────────────────────

static RE_TAGGED_FRONT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\s*\[\s*(.*?)\s*\]\s*(.*)$").unwrap());

/// Category for a lower-cased tag, or `None` if unrecognised.
fn classify_tag(tag: &str) -> Option<Category> {
    if tag.contains("term") {
        Some(Category::Definition)
    } else if tag.contains("concept") || tag.contains("critical thinking") {
        Some(Category::OpenEnded)
    } else {
        None
    }
}

/// Parse a single line. `id` is the id the card gets if one is produced;
/// `line_no` is only used for issue reporting.
pub fn parse_line(line: &str, line_no: usize, id: usize, mode: ParseMode) -> LineOutcome {
    let malformed = |reason: &str| {
        LineOutcome::Dropped(LineIssue::Malformed {
            batch: None,
            line: line_no,
            reason: reason.to_string(),
        })
    };

    let Some((head, back)) = line.split_once(';') else {
        return malformed("missing ';' between front and back");
    };
    let back = back.trim();

    match mode {
        ParseMode::Fixed(category) => {
            let front = head.trim();
            if front.is_empty() {
                return malformed("empty front side");
            }
            LineOutcome::Parsed(Flashcard::new(id, category, front, back))
        }
        ParseMode::Structured => {
            let Some(caps) = RE_TAGGED_FRONT.captures(head) else {
                return malformed("missing [tag] prefix");
            };
            let tag = caps[1].to_lowercase();
            // An unrecognised tag always keeps its placeholder, whatever the front.
            let Some(category) = classify_tag(&tag) else {
                return LineOutcome::Degraded(
                    Flashcard::degraded(id),
                    LineIssue::UnrecognizedPrefix {
                        batch: None,
                        line: line_no,
                        tag,
                    },
                );
            };
            let front = caps[2].trim();
            if front.is_empty() {
                return malformed("empty front side");
            }
            LineOutcome::Parsed(Flashcard::new(id, category, front, back))
        }
    }
}

/// Parse a whole completion, numbering produced cards from `start_id`.
///
/// Blank lines are skipped and do not count towards line numbers. Dropped
/// lines consume no id.
pub fn parse_completion(raw: &str, start_id: usize, mode: ParseMode) -> ParseOutcome {
    let cleaned = clean_completion(raw);
    let mut outcome = ParseOutcome::default();
    let mut next_id = start_id;

    let lines = cleaned.split('\n').filter(|l| !l.trim().is_empty());
    for (idx, line) in lines.enumerate() {
        let line_no = idx + 1;
        match parse_line(line, line_no, next_id, mode) {
            LineOutcome::Parsed(card) => {
                outcome.cards.push(card);
                next_id += 1;
            }
            LineOutcome::Degraded(card, issue) => {
                warn!("{}; kept as Unknown card {}", issue, card.id);
                outcome.cards.push(card);
                outcome.issues.push(issue);
                next_id += 1;
            }
            LineOutcome::Dropped(issue) => {
                warn!("{}; dropped {:?}", issue, line);
                outcome.issues.push(issue);
            }
        }
    }
    outcome
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    #[test]
    fn term_line_is_definition() {
        let out = parse_completion("[Term] Q; A", 1, ParseMode::Structured);
        assert_eq!(out.cards, vec![Flashcard::new(1, Category::Definition, "Q", "A")]);
        assert!(out.issues.is_empty());
    }

    #[test]
    fn concept_and_critical_thinking_are_open_ended() {
        let out = parse_completion(
            "[Key Concept] Why? ; Because\n[Critical Thinking] How?; Like so",
            5,
            ParseMode::Structured,
        );
        assert_eq!(out.cards.len(), 2);
        assert!(out.cards.iter().all(|c| c.category == Category::OpenEnded));
        assert_eq!(out.cards[0].id, 5);
        assert_eq!(out.cards[0].front, "Why?");
        assert_eq!(out.cards[1].id, 6);
    }

    #[test]
    fn malformed_line_is_dropped_without_consuming_id() {
        let out = parse_completion(
            "[Term] Q1; A1\nnotaline\n[Term] Q2; A2",
            1,
            ParseMode::Structured,
        );
        let ids: Vec<usize> = out.cards.iter().map(|c| c.id).collect();
        assert_eq!(ids, vec![1, 2]);
        assert_eq!(out.issues.len(), 1);
        assert!(matches!(out.issues[0], LineIssue::Malformed { line: 2, .. }));
        assert_eq!(out.dropped(), 1);
        assert_eq!(out.degraded(), 0);
    }

    #[test]
    fn unknown_tag_degrades() {
        let out = parse_completion("[Mystery] Q; A", 1, ParseMode::Structured);
        assert_eq!(out.cards, vec![Flashcard::degraded(1)]);
        assert_eq!(
            out.issues,
            vec![LineIssue::UnrecognizedPrefix {
                batch: None,
                line: 1,
                tag: "mystery".into()
            }]
        );
        assert_eq!(out.degraded(), 1);
    }

    #[test]
    fn unknown_tag_with_empty_front_still_degrades() {
        let out = parse_completion("[Mystery] ; A", 1, ParseMode::Structured);
        assert_eq!(out.cards, vec![Flashcard::degraded(1)]);
        assert!(matches!(
            out.issues.as_slice(),
            [LineIssue::UnrecognizedPrefix { line: 1, tag, .. }] if tag == "mystery"
        ));
    }

    #[test]
    fn missing_tag_is_malformed() {
        let out = parse_completion("Q without tag; A", 1, ParseMode::Structured);
        assert!(out.cards.is_empty());
        assert_eq!(out.dropped(), 1);
    }

    #[test]
    fn empty_front_is_malformed() {
        let out = parse_completion("[Term]   ; A", 1, ParseMode::Structured);
        assert!(out.cards.is_empty());
        assert_eq!(out.dropped(), 1);
    }

    #[test]
    fn back_keeps_later_semicolons() {
        let out = parse_completion("[Term] Q; A; with; more", 1, ParseMode::Structured);
        assert_eq!(out.cards[0].back, "A; with; more");
    }

    #[test]
    fn fixed_mode_uses_mode_category() {
        let out = parse_completion(
            "Capital of France?; Paris\n\n\nno delimiter",
            10,
            ParseMode::Fixed(Category::MultipleChoice),
        );
        assert_eq!(
            out.cards,
            vec![Flashcard::new(10, Category::MultipleChoice, "Capital of France?", "Paris")]
        );
        assert!(matches!(out.issues[0], LineIssue::Malformed { line: 2, .. }));
    }

    #[test]
    fn blank_lines_and_fences_are_ignored() {
        let raw = "```text\r\n[Term] A; 1\r\n\r\n\r\n[Term] B; 2\r\n```";
        let out = parse_completion(raw, 1, ParseMode::Structured);
        assert_eq!(out.cards.len(), 2);
        assert!(out.issues.is_empty());
        assert_eq!(out.cards[1].front, "B");
    }

    #[test]
    fn parsing_is_idempotent() {
        let raw = "[Term] Q1; A1\nbad\n[Odd] x; y\n[Concept] Q2; A2";
        assert_eq!(
            parse_completion(raw, 3, ParseMode::Structured),
            parse_completion(raw, 3, ParseMode::Structured)
        );
    }

    #[test]
    fn clean_completion_passthrough() {
        assert_eq!(clean_completion("  [Term] a; b \n"), "[Term] a; b");
        assert_eq!(clean_completion("```\n[Term] a; b\n```"), "[Term] a; b");
    }

    #[test]
    fn empty_completion_yields_nothing() {
        assert_eq!(parse_completion("", 1, ParseMode::Structured), ParseOutcome::default());
    }

    // ── Logged warnings ──────────────────────────────────────────────────

    #[derive(Clone, Default)]
    struct Captured(Arc<Mutex<Vec<u8>>>);

    impl std::io::Write for Captured {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    /// Parse `raw` under a WARN-level subscriber and return the log lines.
    fn warnings_for(raw: &str) -> Vec<String> {
        let sink = Captured::default();
        let writer = sink.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_writer(move || writer.clone())
            .with_max_level(tracing::Level::WARN)
            .with_ansi(false)
            .without_time()
            .finish();
        tracing::subscriber::with_default(subscriber, || {
            parse_completion(raw, 1, ParseMode::Structured);
        });
        let bytes = sink.0.lock().unwrap().clone();
        String::from_utf8(bytes)
            .unwrap()
            .lines()
            .map(str::to_string)
            .collect()
    }

    #[test]
    fn unknown_tag_logs_exactly_one_warning() {
        let lines = warnings_for("[Mystery] Q; A");
        assert_eq!(lines.len(), 1, "got: {lines:?}");
        assert!(lines[0].contains("WARN"));
        assert!(lines[0].contains("unrecognised prefix 'mystery'"));
    }

    #[test]
    fn dropped_line_logs_exactly_one_warning() {
        let lines = warnings_for("[Term] Q1; A1\nnotaline\n[Term] Q2; A2");
        assert_eq!(lines.len(), 1, "got: {lines:?}");
        assert!(lines[0].contains("WARN"));
        assert!(lines[0].contains("line 2: malformed flashcard"));
    }

    #[test]
    fn clean_lines_log_nothing() {
        assert!(warnings_for("[Term] Q; A\n[Concept] Why?; Because").is_empty());
    }
}
