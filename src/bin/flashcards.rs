//! CLI binary for edgequake-flashcards.
//!
//! A thin shim over the library crate that maps CLI flags
//! to `GenerationConfig` and prints the resulting deck.

use anyhow::{Context, Result};
use clap::Parser;
use edgequake_flashcards::{
    estimate, generate, GenerationConfig, GenerationMode, GenerationOutput,
    GenerationProgressCallback, Language, Overlap, ProgressCallback, PromptBudget, RunMode,
    TokenEstimate,
};
use indicatif::{ProgressBar, ProgressStyle};
use std::io::{self, Write};
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tokio::io::AsyncReadExt;
use tracing_subscriber::EnvFilter;

// ── ANSI colour helpers (no extra deps) ──────────────────────────────────────

fn green(s: &str) -> String {
    format!("\x1b[32m{s}\x1b[0m")
}
fn yellow(s: &str) -> String {
    format!("\x1b[33m{s}\x1b[0m")
}
fn dim(s: &str) -> String {
    format!("\x1b[2m{s}\x1b[0m")
}
fn bold(s: &str) -> String {
    format!("\x1b[1m{s}\x1b[0m")
}
fn cyan(s: &str) -> String {
    format!("\x1b[36m{s}\x1b[0m")
}

// ── CLI progress callback using indicatif ────────────────────────────────────

/// Terminal progress callback: a bar over batches plus one log line per
/// completed batch.
struct CliProgressCallback {
    bar: ProgressBar,
    batch_started: Mutex<Option<Instant>>,
}

impl CliProgressCallback {
    /// Spinner until `on_generation_start` reports the batch count.
    fn new_dynamic() -> Arc<Self> {
        let bar = ProgressBar::new(0);
        let spinner_style = ProgressStyle::with_template("{spinner:.cyan} {prefix:.bold}  {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"]);

        bar.set_style(spinner_style);
        bar.set_prefix("Preparing");
        bar.set_message("Counting tokens…");
        bar.enable_steady_tick(Duration::from_millis(80));

        Arc::new(Self {
            bar,
            batch_started: Mutex::new(None),
        })
    }

    fn activate_bar(&self, total: usize) {
        let progress_style = ProgressStyle::with_template(
            "{spinner:.cyan} {prefix:.bold}  \
             [{bar:42.green/238}] {pos:>3}/{len} batches  \
             ⏱ {elapsed_precise}  ETA {eta_precise}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("█▉▊▋▌▍▎▏  ")
        .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"]);

        self.bar.set_length(total as u64);
        self.bar.set_style(progress_style);
        self.bar.set_prefix("Generating");
        self.bar.reset_eta();
    }

    /// Remove the bar without a completion line (the run failed).
    fn abandon(&self) {
        self.bar.finish_and_clear();
    }
}

impl GenerationProgressCallback for CliProgressCallback {
    fn on_generation_start(&self, total_batches: usize) {
        self.activate_bar(total_batches);
        self.bar.println(format!(
            "{} {}",
            cyan("◆"),
            bold(&format!("Generating flashcards in {total_batches} batch(es)…"))
        ));
    }

    fn on_batch_start(&self, batch: usize, _total: usize) {
        if let Ok(mut started) = self.batch_started.lock() {
            *started = Some(Instant::now());
        }
        self.bar.set_message(format!("batch {batch}"));
    }

    fn on_batch_complete(&self, batch: usize, total: usize, cards: usize) {
        let elapsed_ms = self
            .batch_started
            .lock()
            .ok()
            .and_then(|mut s| s.take())
            .map(|t| t.elapsed().as_millis())
            .unwrap_or(0);

        self.bar.println(format!(
            "  {} Batch {:>3}/{:<3}  {:<10}  {}",
            green("✓"),
            batch,
            total,
            dim(&format!("{cards:>4} cards")),
            dim(&format!("{:.1}s", elapsed_ms as f64 / 1000.0)),
        ));
        self.bar.inc(1);
    }

    fn on_generation_complete(&self, _total_batches: usize, total_cards: usize) {
        self.bar.finish_and_clear();
        eprintln!(
            "{} {} flashcards generated",
            green("✔"),
            bold(&total_cards.to_string())
        );
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Mixed practice deck from a text file (stdout)
  flashcards chapter.txt

  # Definitions only, German prompts, JSON output to a file
  flashcards --mode definitions --lang de --json chapter.txt -o deck.json

  # Read from stdin
  cat notes.md | flashcards -

  # How many calls would this take? (no API key needed)
  flashcards --estimate-only book.txt

  # Smaller context budget with a fixed 200-token overlap
  flashcards --app-token-limit 8000 --overlap-type absolute --overlap 200 book.txt

  # Use a specific provider
  flashcards --provider openai --model gpt-4o chapter.txt

MODES:
  practice         Mixed deck; the model tags each card [Term] / [Concept] /
                   [Critical Thinking] and the tag picks the category (default)
  definitions      Term → definition
  open-ended       Open questions with a model answer
  multiple-choice  Question with options A)–D) → correct option
  cloze            Sentence with a ___ gap → missing words

TOKEN BUDGET:
  Each call must satisfy  prompt + input + completion <= app-token-limit.
  Input that does not fit is split into overlapping token windows of
  app-token-limit - (prompt + completion-token-limit) tokens each.

ENVIRONMENT VARIABLES:
  OPENAI_API_KEY          OpenAI API key
  ANTHROPIC_API_KEY       Anthropic API key
  GEMINI_API_KEY          Google Gemini API key
  EDGEQUAKE_LLM_PROVIDER  Override provider (openai, anthropic, gemini, ollama)
  EDGEQUAKE_MODEL         Override model ID (also selects the tokenizer)
  RUST_LOG                Override log filter (e.g. edgequake_flashcards=debug)
"#;

/// Turn long text into flashcards using an LLM.
#[derive(Parser, Debug)]
#[command(
    name = "flashcards",
    version,
    about = "Turn long text into flashcards using an LLM",
    long_about = "Generate flashcards from arbitrary-length text. Input that does not fit into \
one request is split into overlapping token windows and processed batch by batch. Supports \
OpenAI, Anthropic, Google Gemini, Ollama and any OpenAI-compatible endpoint.",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// Text file to read, or `-` for stdin.
    input: String,

    /// Write the deck to this file instead of stdout.
    #[arg(short, long, env = "FLASHCARDS_OUTPUT")]
    output: Option<PathBuf>,

    /// LLM model ID; also selects the tokenizer.
    #[arg(long, env = "EDGEQUAKE_MODEL", default_value = edgequake_flashcards::config::DEFAULT_MODEL)]
    model: String,

    /// LLM provider: openai, anthropic, gemini, ollama, azure.
    #[arg(long, env = "EDGEQUAKE_PROVIDER")]
    provider: Option<String>,

    /// Kind of cards to generate.
    #[arg(long, env = "FLASHCARDS_MODE", value_enum, default_value = "practice")]
    mode: ModeArg,

    /// Prompt language.
    #[arg(long = "lang", env = "FLASHCARDS_LANG", value_enum, default_value = "en")]
    language: LangArg,

    /// Maximum tokens per call (prompt + input + completion).
    #[arg(long, env = "FLASHCARDS_APP_TOKEN_LIMIT", default_value_t = 16_000)]
    app_token_limit: usize,

    /// Maximum tokens for the system prompt and example exchange.
    #[arg(long, env = "FLASHCARDS_PROMPT_TOKEN_LIMIT", default_value_t = 4_000)]
    prompt_token_limit: usize,

    /// Tokens reserved for each completion.
    #[arg(long, env = "FLASHCARDS_COMPLETION_TOKEN_LIMIT", default_value_t = 4_000)]
    completion_token_limit: usize,

    /// How `--overlap` is interpreted.
    #[arg(long, env = "FLASHCARDS_OVERLAP_TYPE", value_enum, default_value = "relative")]
    overlap_type: OverlapTypeArg,

    /// Overlap between fragments: a fraction in [0, 1) or a token count.
    #[arg(long, env = "FLASHCARDS_OVERLAP", default_value_t = 0.1)]
    overlap: f64,

    /// LLM temperature (0.0–2.0).
    #[arg(long, env = "FLASHCARDS_TEMPERATURE", default_value_t = 0.7)]
    temperature: f32,

    /// Retries per batch on rate-limit, connection or server errors.
    #[arg(long, env = "FLASHCARDS_MAX_RETRIES", default_value_t = 0)]
    max_retries: u32,

    /// Path to a text file containing a custom system prompt.
    #[arg(long, env = "FLASHCARDS_SYSTEM_PROMPT")]
    system_prompt: Option<PathBuf>,

    /// Extra instruction appended to the system prompt.
    #[arg(long, env = "FLASHCARDS_INSTRUCTION")]
    instruction: Option<String>,

    /// Output structured JSON (deck, stats, issues) instead of a card list.
    #[arg(long, env = "FLASHCARDS_JSON")]
    json: bool,

    /// Print token accounting only; makes no LLM call.
    #[arg(long)]
    estimate_only: bool,

    /// Disable progress bar.
    #[arg(long, env = "FLASHCARDS_NO_PROGRESS")]
    no_progress: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, env = "FLASHCARDS_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, env = "FLASHCARDS_QUIET")]
    quiet: bool,
}

#[derive(clap::ValueEnum, Clone, Copy, Debug)]
enum ModeArg {
    Practice,
    Definitions,
    OpenEnded,
    MultipleChoice,
    Cloze,
}

impl From<ModeArg> for GenerationMode {
    fn from(v: ModeArg) -> Self {
        match v {
            ModeArg::Practice => GenerationMode::Practice,
            ModeArg::Definitions => GenerationMode::Definitions,
            ModeArg::OpenEnded => GenerationMode::OpenEnded,
            ModeArg::MultipleChoice => GenerationMode::MultipleChoice,
            ModeArg::Cloze => GenerationMode::Cloze,
        }
    }
}

#[derive(clap::ValueEnum, Clone, Copy, Debug)]
enum LangArg {
    En,
    De,
}

impl From<LangArg> for Language {
    fn from(v: LangArg) -> Self {
        match v {
            LangArg::En => Language::En,
            LangArg::De => Language::De,
        }
    }
}

#[derive(clap::ValueEnum, Clone, Copy, Debug)]
enum OverlapTypeArg {
    Absolute,
    Relative,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // The progress bar replaces INFO-level library logs.
    let show_progress = !cli.quiet && !cli.no_progress && !cli.json && !cli.estimate_only;
    let filter = if cli.verbose {
        "debug"
    } else if cli.quiet || show_progress {
        "error"
    } else {
        "info"
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(io::stderr)
        .init();

    // ── Read input ───────────────────────────────────────────────────────
    let text = read_input(&cli.input).await?;

    let cli_progress = show_progress.then(CliProgressCallback::new_dynamic);
    let progress_cb: Option<ProgressCallback> = cli_progress
        .clone()
        .map(|cb| cb as Arc<dyn GenerationProgressCallback>);

    let config = clear_on_err(build_config(&cli, progress_cb).await, cli_progress.as_deref())?;

    // ── Estimate-only mode ───────────────────────────────────────────────
    if cli.estimate_only {
        let est = estimate(&text, &config).context("Token estimate failed")?;
        if cli.json {
            println!(
                "{}",
                serde_json::to_string_pretty(&est).context("Failed to serialise estimate")?
            );
        } else {
            print_estimate(&est);
        }
        return Ok(());
    }

    // ── Run generation ───────────────────────────────────────────────────
    let output = clear_on_err(
        generate(&text, &config)
            .await
            .context("Flashcard generation failed"),
        cli_progress.as_deref(),
    )?;

    let rendered = if cli.json {
        let mut json =
            serde_json::to_string_pretty(&output).context("Failed to serialise output")?;
        json.push('\n');
        json
    } else {
        render_deck(&output)
    };

    match cli.output {
        Some(ref path) => tokio::fs::write(path, rendered.as_bytes())
            .await
            .with_context(|| format!("Failed to write {}", path.display()))?,
        None => {
            let stdout = io::stdout();
            let mut handle = stdout.lock();
            handle
                .write_all(rendered.as_bytes())
                .context("Failed to write to stdout")?;
        }
    }

    if !cli.quiet {
        print_summary(&output, show_progress);
    }

    Ok(())
}

/// Clear the progress bar before an error reaches the terminal.
fn clear_on_err<T>(result: Result<T>, progress: Option<&CliProgressCallback>) -> Result<T> {
    if result.is_err() {
        if let Some(cb) = progress {
            cb.abandon();
        }
    }
    result
}

/// Read the whole input from a file or stdin.
async fn read_input(input: &str) -> Result<String> {
    if input == "-" {
        let mut buf = String::new();
        tokio::io::stdin()
            .read_to_string(&mut buf)
            .await
            .context("Failed to read stdin")?;
        Ok(buf)
    } else {
        tokio::fs::read_to_string(input)
            .await
            .with_context(|| format!("Failed to read {input}"))
    }
}

/// Map CLI args to `GenerationConfig`.
async fn build_config(cli: &Cli, progress: Option<ProgressCallback>) -> Result<GenerationConfig> {
    let budget = PromptBudget::new(
        cli.app_token_limit,
        cli.prompt_token_limit,
        cli.completion_token_limit,
    )
    .context("Invalid token limits")?;

    let overlap = match cli.overlap_type {
        OverlapTypeArg::Relative => Overlap::Relative {
            fraction: cli.overlap,
        },
        OverlapTypeArg::Absolute => {
            if cli.overlap < 0.0 || cli.overlap.fract() != 0.0 {
                anyhow::bail!(
                    "Absolute overlap must be a whole number of tokens (got {})",
                    cli.overlap
                );
            }
            Overlap::Absolute {
                tokens: cli.overlap as usize,
            }
        }
    };

    let mut builder = GenerationConfig::builder()
        .model(cli.model.clone())
        .mode(cli.mode.into())
        .language(cli.language.into())
        .budget(budget)
        .overlap(overlap)
        .temperature(cli.temperature)
        .max_retries(cli.max_retries);

    if let Some(ref name) = cli.provider {
        builder = builder.provider_name(name.clone());
    }
    if let Some(ref path) = cli.system_prompt {
        let prompt = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read system prompt from {:?}", path))?;
        builder = builder.system_prompt(prompt);
    }
    if let Some(ref instruction) = cli.instruction {
        builder = builder.additional_instruction(instruction.clone());
    }
    if let Some(cb) = progress {
        builder = builder.progress_callback(cb);
    }

    builder.build().context("Invalid configuration")
}

/// Human-readable card list.
fn render_deck(output: &GenerationOutput) -> String {
    let mut out = String::new();
    for card in &output.deck {
        if card.is_degraded() {
            continue;
        }
        out.push_str(&format!(
            "#{} [{}]\n  Q: {}\n  A: {}\n\n",
            card.id, card.category, card.front, card.back
        ));
    }
    out
}

fn print_estimate(est: &TokenEstimate) {
    println!("Model:            {}", est.model);
    println!("Prompt tokens:    {}", est.prompt_tokens);
    println!("Input tokens:     {}", est.input_tokens);
    println!("Total tokens:     {}", est.total_tokens);
    println!("App token limit:  {}", est.app_token_limit);
    match est.mode {
        RunMode::SingleShot => println!("Mode:             single call"),
        RunMode::Batched => println!("Mode:             batched"),
    }
    if let Some(budget) = est.fragment_budget {
        println!("Fragment budget:  {} tokens", budget);
    }
    println!("Completion calls: {}", est.batches);
}

fn print_summary(output: &GenerationOutput, show_progress: bool) {
    let stats = &output.stats;
    if !show_progress {
        eprintln!(
            "Generated {} cards in {} batch(es) in {}ms",
            stats.cards, stats.batches, stats.total_duration_ms
        );
    } else {
        eprintln!(
            "   {} batch(es)  —  {}ms total",
            dim(&stats.batches.to_string()),
            stats.total_duration_ms,
        );
    }
    if stats.dropped_lines > 0 || stats.degraded_cards > 0 {
        eprintln!(
            "{} {} malformed line(s) dropped, {} card(s) with unrecognised tags",
            yellow("⚠"),
            stats.dropped_lines,
            stats.degraded_cards
        );
        for issue in output.issues.iter().take(5) {
            eprintln!("   {}", dim(&issue.to_string()));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn failed_run_clears_the_progress_bar() {
        let cb = CliProgressCallback::new_dynamic();
        cb.on_generation_start(3);
        cb.on_batch_start(1, 3);

        let result: Result<()> =
            clear_on_err(Err(anyhow::anyhow!("rate limited")), Some(&*cb));

        assert!(result.is_err());
        assert!(cb.bar.is_finished());
    }

    #[test]
    fn successful_step_keeps_the_progress_bar() {
        let cb = CliProgressCallback::new_dynamic();
        let value = clear_on_err(Ok(7), Some(&*cb)).unwrap();
        assert_eq!(value, 7);
        assert!(!cb.bar.is_finished());
        cb.abandon();
    }
}
