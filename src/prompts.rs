//! Built-in prompts for flashcard generation.
//!
//! Every call is made of a system instruction and one example exchange
//! (input text → expected card lines) before the real input. The example
//! matters more than the instruction: models copy its line format closely,
//! and [`crate::pipeline::parse`] depends on that format.
//!
//! Callers can override the system prompt and the example via
//! [`crate::config::GenerationConfig`]; the constants here are used only when
//! no override is provided.

use crate::config::{GenerationMode, Language};

// ── Task descriptions ────────────────────────────────────────────────────────

const TASK_PRACTICE_EN: &str = "You are an experienced teacher. Turn the text the user sends into a varied set of flashcards for self-study. Cover definitions of important terms, explanations of key concepts, and questions that require critical thinking about the material.";
const TASK_PRACTICE_DE: &str = "Du bist eine erfahrene Lehrkraft. Erstelle aus dem Text, den der Nutzer sendet, abwechslungsreiche Karteikarten zum Selbstlernen. Decke Definitionen wichtiger Begriffe, Erklärungen zentraler Konzepte und Fragen ab, die kritisches Nachdenken über den Stoff erfordern.";

const TASK_DEFINITIONS_EN: &str = "You are an experienced teacher. Extract every important technical term from the text the user sends and write one flashcard per term: the term on the front, a concise definition on the back.";
const TASK_DEFINITIONS_DE: &str = "Du bist eine erfahrene Lehrkraft. Entnimm dem Text, den der Nutzer sendet, alle wichtigen Fachbegriffe und schreibe pro Begriff eine Karteikarte: der Begriff auf der Vorderseite, eine knappe Definition auf der Rückseite.";

const TASK_OPEN_ENDED_EN: &str = "You are an experienced teacher. Write open questions about the text the user sends. Each question should require an explanation in the learner's own words; the back holds a model answer of one to three sentences.";
const TASK_OPEN_ENDED_DE: &str = "Du bist eine erfahrene Lehrkraft. Formuliere offene Fragen zu dem Text, den der Nutzer sendet. Jede Frage soll eine Erklärung in eigenen Worten verlangen; die Rückseite enthält eine Musterantwort von ein bis drei Sätzen.";

const TASK_MULTIPLE_CHOICE_EN: &str = "You are an experienced teacher. Write multiple-choice questions about the text the user sends. Put the question and four options labelled A) to D) on the front, and the correct option on the back.";
const TASK_MULTIPLE_CHOICE_DE: &str = "Du bist eine erfahrene Lehrkraft. Formuliere Multiple-Choice-Fragen zu dem Text, den der Nutzer sendet. Die Vorderseite enthält die Frage und vier mit A) bis D) beschriftete Antworten, die Rückseite die richtige Antwort.";

const TASK_CLOZE_EN: &str = "You are an experienced teacher. Write fill-in-the-blank sentences about the text the user sends. Replace one key word or phrase with ___ on the front and put the missing words on the back.";
const TASK_CLOZE_DE: &str = "Du bist eine erfahrene Lehrkraft. Formuliere Lückentexte zu dem Text, den der Nutzer sendet. Ersetze auf der Vorderseite ein Schlüsselwort oder eine Wortgruppe durch ___ und schreibe die fehlenden Wörter auf die Rückseite.";

// ── Output format rules ──────────────────────────────────────────────────────

const FORMAT_TAGGED_EN: &str = r#"Output format, one flashcard per line:
[Tag] front; back
- Tag is exactly one of: Term, Concept, Critical Thinking
- Use Term for definitions, Concept for explanations, Critical Thinking for questions that need reasoning
- Separate front and back with the first semicolon; do not use a semicolon inside the front
- Do not number the lines, do not add headings, blank lines or any other text"#;

const FORMAT_TAGGED_DE: &str = r#"Ausgabeformat, eine Karteikarte pro Zeile:
[Tag] Vorderseite; Rückseite
- Tag ist genau einer von: Term, Concept, Critical Thinking (englische Tags beibehalten)
- Term für Definitionen, Concept für Erklärungen, Critical Thinking für Fragen, die Nachdenken erfordern
- Trenne Vorder- und Rückseite mit dem ersten Semikolon; verwende kein Semikolon auf der Vorderseite
- Keine Nummerierung, keine Überschriften, keine Leerzeilen und kein weiterer Text"#;

const FORMAT_PLAIN_EN: &str = r#"Output format, one flashcard per line:
front; back
- Separate front and back with the first semicolon; do not use a semicolon inside the front
- Do not number the lines, do not add headings, blank lines or any other text"#;

const FORMAT_PLAIN_DE: &str = r#"Ausgabeformat, eine Karteikarte pro Zeile:
Vorderseite; Rückseite
- Trenne Vorder- und Rückseite mit dem ersten Semikolon; verwende kein Semikolon auf der Vorderseite
- Keine Nummerierung, keine Überschriften, keine Leerzeilen und kein weiterer Text"#;

// ── Example exchange ─────────────────────────────────────────────────────────

/// Example input shown to the model before the real input (English).
pub const EXAMPLE_INPUT_EN: &str = "Photosynthesis is the process by which plants, algae and some bacteria convert light energy into chemical energy. It takes place in the chloroplasts, which contain the green pigment chlorophyll. In the light-dependent reactions, water is split and oxygen is released; the Calvin cycle then uses the resulting ATP and NADPH to fix carbon dioxide into glucose.";

/// Example input shown to the model before the real input (German).
pub const EXAMPLE_INPUT_DE: &str = "Die Photosynthese ist der Prozess, bei dem Pflanzen, Algen und einige Bakterien Lichtenergie in chemische Energie umwandeln. Sie findet in den Chloroplasten statt, die den grünen Farbstoff Chlorophyll enthalten. In den lichtabhängigen Reaktionen wird Wasser gespalten und Sauerstoff freigesetzt; der Calvin-Zyklus nutzt anschließend das entstandene ATP und NADPH, um Kohlendioxid zu Glukose zu fixieren.";

const EXAMPLE_PRACTICE_EN: &str = "[Term] Photosynthesis; The process by which plants, algae and some bacteria convert light energy into chemical energy.
[Term] Chlorophyll; The green pigment in chloroplasts that absorbs light.
[Concept] What happens in the light-dependent reactions?; Water is split, oxygen is released, and ATP and NADPH are produced.
[Critical Thinking] Why would a plant kept in darkness eventually stop producing glucose?; Without light no ATP and NADPH are made, so the Calvin cycle has nothing to fix carbon dioxide with.";
const EXAMPLE_PRACTICE_DE: &str = "[Term] Photosynthese; Der Prozess, bei dem Pflanzen, Algen und einige Bakterien Lichtenergie in chemische Energie umwandeln.
[Term] Chlorophyll; Der grüne Farbstoff in den Chloroplasten, der Licht absorbiert.
[Concept] Was geschieht in den lichtabhängigen Reaktionen?; Wasser wird gespalten, Sauerstoff freigesetzt und ATP sowie NADPH gebildet.
[Critical Thinking] Warum stellt eine Pflanze im Dunkeln irgendwann keine Glukose mehr her?; Ohne Licht entstehen kein ATP und NADPH, sodass der Calvin-Zyklus kein Kohlendioxid fixieren kann.";

const EXAMPLE_DEFINITIONS_EN: &str = "Photosynthesis; The process by which plants, algae and some bacteria convert light energy into chemical energy.
Chloroplast; The cell organelle in which photosynthesis takes place.
Chlorophyll; The green pigment in chloroplasts that absorbs light.
Calvin cycle; The reactions that use ATP and NADPH to fix carbon dioxide into glucose.";
const EXAMPLE_DEFINITIONS_DE: &str = "Photosynthese; Der Prozess, bei dem Pflanzen, Algen und einige Bakterien Lichtenergie in chemische Energie umwandeln.
Chloroplast; Das Zellorganell, in dem die Photosynthese stattfindet.
Chlorophyll; Der grüne Farbstoff in den Chloroplasten, der Licht absorbiert.
Calvin-Zyklus; Die Reaktionen, die mit ATP und NADPH Kohlendioxid zu Glukose fixieren.";

const EXAMPLE_OPEN_ENDED_EN: &str = "Explain what photosynthesis achieves for a plant.; It converts light energy into chemical energy stored in glucose, which the plant uses to grow.
How are the light-dependent reactions and the Calvin cycle connected?; The light-dependent reactions produce ATP and NADPH, which the Calvin cycle consumes to fix carbon dioxide.";
const EXAMPLE_OPEN_ENDED_DE: &str = "Erkläre, was die Photosynthese für eine Pflanze leistet.; Sie wandelt Lichtenergie in chemische Energie in Form von Glukose um, die die Pflanze zum Wachsen nutzt.
Wie hängen die lichtabhängigen Reaktionen und der Calvin-Zyklus zusammen?; Die lichtabhängigen Reaktionen liefern ATP und NADPH, die der Calvin-Zyklus zur Fixierung von Kohlendioxid verbraucht.";

const EXAMPLE_MULTIPLE_CHOICE_EN: &str = "Where does photosynthesis take place? A) Mitochondria B) Chloroplasts C) Nucleus D) Ribosomes; B) Chloroplasts
Which gas is released when water is split? A) Carbon dioxide B) Nitrogen C) Oxygen D) Hydrogen; C) Oxygen";
const EXAMPLE_MULTIPLE_CHOICE_DE: &str = "Wo findet die Photosynthese statt? A) Mitochondrien B) Chloroplasten C) Zellkern D) Ribosomen; B) Chloroplasten
Welches Gas wird bei der Spaltung von Wasser freigesetzt? A) Kohlendioxid B) Stickstoff C) Sauerstoff D) Wasserstoff; C) Sauerstoff";

const EXAMPLE_CLOZE_EN: &str = "Photosynthesis takes place in the ___.; chloroplasts
The green pigment ___ absorbs light.; chlorophyll
The ___ uses ATP and NADPH to fix carbon dioxide into glucose.; Calvin cycle";
const EXAMPLE_CLOZE_DE: &str = "Die Photosynthese findet in den ___ statt.; Chloroplasten
Der grüne Farbstoff ___ absorbiert Licht.; Chlorophyll
Der ___ nutzt ATP und NADPH, um Kohlendioxid zu Glukose zu fixieren.; Calvin-Zyklus";

// ── Lookup ───────────────────────────────────────────────────────────────────

fn task(mode: GenerationMode, lang: Language) -> &'static str {
    match (mode, lang) {
        (GenerationMode::Practice, Language::En) => TASK_PRACTICE_EN,
        (GenerationMode::Practice, Language::De) => TASK_PRACTICE_DE,
        (GenerationMode::Definitions, Language::En) => TASK_DEFINITIONS_EN,
        (GenerationMode::Definitions, Language::De) => TASK_DEFINITIONS_DE,
        (GenerationMode::OpenEnded, Language::En) => TASK_OPEN_ENDED_EN,
        (GenerationMode::OpenEnded, Language::De) => TASK_OPEN_ENDED_DE,
        (GenerationMode::MultipleChoice, Language::En) => TASK_MULTIPLE_CHOICE_EN,
        (GenerationMode::MultipleChoice, Language::De) => TASK_MULTIPLE_CHOICE_DE,
        (GenerationMode::Cloze, Language::En) => TASK_CLOZE_EN,
        (GenerationMode::Cloze, Language::De) => TASK_CLOZE_DE,
    }
}

fn format_rules(mode: GenerationMode, lang: Language) -> &'static str {
    match (mode, lang) {
        (GenerationMode::Practice, Language::En) => FORMAT_TAGGED_EN,
        (GenerationMode::Practice, Language::De) => FORMAT_TAGGED_DE,
        (_, Language::En) => FORMAT_PLAIN_EN,
        (_, Language::De) => FORMAT_PLAIN_DE,
    }
}

/// Built-in system prompt for `mode` in `lang`.
pub fn system_prompt(mode: GenerationMode, lang: Language) -> String {
    format!("{}\n\n{}", task(mode, lang), format_rules(mode, lang))
}

/// Built-in example exchange `(input, expected output)` for `mode` in `lang`.
pub fn example_exchange(mode: GenerationMode, lang: Language) -> (&'static str, &'static str) {
    let input = match lang {
        Language::En => EXAMPLE_INPUT_EN,
        Language::De => EXAMPLE_INPUT_DE,
    };
    let output = match (mode, lang) {
        (GenerationMode::Practice, Language::En) => EXAMPLE_PRACTICE_EN,
        (GenerationMode::Practice, Language::De) => EXAMPLE_PRACTICE_DE,
        (GenerationMode::Definitions, Language::En) => EXAMPLE_DEFINITIONS_EN,
        (GenerationMode::Definitions, Language::De) => EXAMPLE_DEFINITIONS_DE,
        (GenerationMode::OpenEnded, Language::En) => EXAMPLE_OPEN_ENDED_EN,
        (GenerationMode::OpenEnded, Language::De) => EXAMPLE_OPEN_ENDED_DE,
        (GenerationMode::MultipleChoice, Language::En) => EXAMPLE_MULTIPLE_CHOICE_EN,
        (GenerationMode::MultipleChoice, Language::De) => EXAMPLE_MULTIPLE_CHOICE_DE,
        (GenerationMode::Cloze, Language::En) => EXAMPLE_CLOZE_EN,
        (GenerationMode::Cloze, Language::De) => EXAMPLE_CLOZE_DE,
    };
    (input, output)
}

/// Append a caller-supplied instruction to a system prompt.
pub fn with_additional_instruction(system: &str, instruction: &str) -> String {
    let instruction = instruction.trim();
    if instruction.is_empty() {
        return system.to_string();
    }
    format!("{}\n\n{}", system.trim_end(), instruction)
}
