//! CLI binary for edgequake-litreview.
//!
//! A thin shim over the library crate that maps CLI flags to
//! `ResearchConfig`, drives the flows and prints results.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use edgequake_litreview::{
    extract_text_async, load_document, Document, LiteratureReviewOutput, ProgressCallback,
    ResearchConfig, ReviewFlow, Session, SummarizeFlow, SummaryOutput, WorkflowProgressCallback,
};
use indicatif::{ProgressBar, ProgressStyle};
use std::io::{self, BufRead, IsTerminal, Write};
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

// ── ANSI colour helpers (no extra deps) ──────────────────────────────────────

fn green(s: &str) -> String {
    format!("\x1b[32m{s}\x1b[0m")
}
fn red(s: &str) -> String {
    format!("\x1b[31m{s}\x1b[0m")
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

const SPINNER_TICKS: &[&str] = &["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"];

/// "4 seconds" for whole seconds, "250 ms" otherwise.
fn format_wait(wait: Duration) -> String {
    if wait.subsec_millis() == 0 && wait.as_secs() > 0 {
        let secs = wait.as_secs();
        format!("{secs} second{}", if secs == 1 { "" } else { "s" })
    } else {
        format!("{} ms", wait.as_millis())
    }
}

// ── CLI progress callback using indicatif ────────────────────────────────────

/// Terminal progress: a spinner for the current step plus one log line per
/// extraction, paper and rate-limit retry.
struct CliProgressCallback {
    bar: ProgressBar,
}

impl CliProgressCallback {
    fn new() -> Arc<Self> {
        let bar = ProgressBar::new_spinner();
        let style = ProgressStyle::with_template("{spinner:.cyan} {prefix:.bold}  {msg}  {elapsed:.dim}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(SPINNER_TICKS);
        bar.set_style(style);
        bar.set_prefix("Working");
        bar.enable_steady_tick(Duration::from_millis(80));
        Arc::new(Self { bar })
    }

    /// Run `f` with the spinner hidden, e.g. while asking the user a question.
    fn suspend<R>(&self, f: impl FnOnce() -> R) -> R {
        self.bar.suspend(f)
    }

    fn finish(&self) {
        self.bar.finish_and_clear();
    }
}

impl WorkflowProgressCallback for CliProgressCallback {
    fn on_extraction_complete(&self, document: &str, chars: usize) {
        self.bar.println(format!(
            "  {} Text extraction completed  {}  {}",
            green("✓"),
            document,
            dim(&format!("{chars} chars")),
        ));
    }

    fn on_paper_start(&self, index: usize, total: usize, name: &str) {
        self.bar.set_prefix(format!("Paper {index}/{total}"));
        self.bar.set_message(format!("Processing {name}…"));
    }

    fn on_paper_complete(&self, index: usize, total: usize, summary_len: usize) {
        self.bar.println(format!(
            "  {} Paper {:>2}/{:<2} summarised  {}",
            green("✓"),
            index,
            total,
            dim(&format!("{summary_len} chars")),
        ));
    }

    fn on_paper_skipped(&self, index: usize, total: usize, error: &str) {
        self.bar.println(format!(
            "  {} Paper {:>2}/{:<2} {}",
            red("✗"),
            index,
            total,
            red(error),
        ));
    }

    fn on_request_start(&self, label: &str) {
        self.bar.set_message(format!("Generating {label}…"));
    }

    fn on_retry(&self, attempt: u32, max_attempts: u32, wait: Duration) {
        self.bar.println(format!(
            "  {} Rate limit reached. Retrying in {}...  {}",
            yellow("⚠"),
            format_wait(wait),
            dim(&format!("attempt {attempt}/{max_attempts}")),
        ));
    }

    fn on_rate_limit_exhausted(&self, attempts: u32) {
        self.bar.println(format!(
            "  {} Rate limit exceeded after {attempts} attempts. Please check your usage or plan.",
            red("✘"),
        ));
    }
}

/// Quiet-mode warnings without a spinner.
struct PlainProgressCallback;

impl WorkflowProgressCallback for PlainProgressCallback {
    fn on_retry(&self, _attempt: u32, _max_attempts: u32, wait: Duration) {
        eprintln!("Rate limit reached. Retrying in {}...", format_wait(wait));
    }

    fn on_rate_limit_exhausted(&self, _attempts: u32) {
        eprintln!("Rate limit exceeded. Please check your usage or plan.");
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Summarise one paper (asks before calling the model)
  litreview summarize paper.pdf --title "Gnewuch et al., 2023"

  # Literature review over several papers, no confirmation prompt
  litreview review a.pdf b.pdf c.pdf --theme "Human + AI Collaboration" --yes

  # Papers can be URLs
  litreview summarize https://arxiv.org/pdf/1706.03762 --title "Vaswani et al., 2017"

  # Just print the extracted text (no API key needed)
  litreview extract paper.pdf

  # JSON output with per-paper outcomes and token counts
  litreview review *.pdf --theme "Human vs. AI" --yes --json > review.json

SUMMARY RUBRIC:
  1. Context
  2. Research Question and Findings
  3. Theme of Research (Human vs. AI, Human + AI Collaboration)
  4. Method (Conceptual, Modeling, Empirical Study)
  5. Contribution (theoretical, managerial, methodological)
  6. Future Potential and Limitations

  Only the first 2000 characters of each paper are sent to the model.

RATE LIMITS:
  Each request is tried up to --max-retries times while the provider returns
  rate-limit errors, waiting 1, 2, 4, 8 … × --backoff-unit-ms in between.
  In a review, a paper that still fails is skipped and the review is written
  from the remaining summaries.

ENVIRONMENT VARIABLES:
  OPENAI_API_KEY          OpenAI API key
  ANTHROPIC_API_KEY       Anthropic API key
  GEMINI_API_KEY          Google Gemini API key
  EDGEQUAKE_LLM_PROVIDER  Override provider (openai, anthropic, gemini, ollama)
  EDGEQUAKE_MODEL         Override model ID
  PDFIUM_LIB_PATH         Path to an existing libpdfium (skips auto-download)
"#;

/// Summarise research papers and write literature reviews with LLMs.
#[derive(Parser, Debug)]
#[command(
    name = "litreview",
    version,
    about = "Summarise research papers and write literature reviews with LLMs",
    long_about = "Extract text from PDF papers (local files or URLs), summarise each one \
against a six-category rubric, and synthesise literature reviews on a theme. Supports \
OpenAI, Anthropic, Google Gemini, Azure OpenAI, and OpenAI-compatible endpoints.",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// LLM model ID (e.g. gpt-3.5-turbo, gpt-4.1-mini).
    #[arg(long, global = true, env = "EDGEQUAKE_MODEL")]
    model: Option<String>,

    /// LLM provider: openai, anthropic, gemini, ollama, azure.
    #[arg(long, global = true, env = "EDGEQUAKE_PROVIDER")]
    provider: Option<String>,

    /// Max tokens generated per request.
    #[arg(long, global = true, env = "LITREVIEW_MAX_TOKENS", default_value_t = 1500)]
    max_tokens: usize,

    /// Attempts per request while the provider is rate limiting.
    #[arg(long, global = true, env = "LITREVIEW_MAX_RETRIES", default_value_t = 5)]
    max_retries: u32,

    /// Backoff unit in milliseconds; waits are 1, 2, 4, 8 … units.
    #[arg(long, global = true, env = "LITREVIEW_BACKOFF_UNIT_MS", default_value_t = 1000)]
    backoff_unit_ms: u64,

    /// LLM temperature (0.0–2.0). Provider default when unset.
    #[arg(long, global = true, env = "LITREVIEW_TEMPERATURE")]
    temperature: Option<f32>,

    /// PDF user password for encrypted documents.
    #[arg(long, global = true, env = "LITREVIEW_PASSWORD")]
    password: Option<String>,

    /// HTTP download timeout in seconds.
    #[arg(long, global = true, env = "LITREVIEW_DOWNLOAD_TIMEOUT", default_value_t = 120)]
    download_timeout: u64,

    /// Output structured JSON instead of plain text.
    #[arg(long, global = true, env = "LITREVIEW_JSON")]
    json: bool,

    /// Do not ask for confirmation before calling the model.
    #[arg(short = 'y', long, global = true)]
    yes: bool,

    /// Disable the progress spinner.
    #[arg(long, global = true, env = "LITREVIEW_NO_PROGRESS")]
    no_progress: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, global = true, env = "LITREVIEW_VERBOSE")]
    verbose: bool,

    /// Suppress all output except results, warnings and errors.
    #[arg(short, long, global = true, env = "LITREVIEW_QUIET")]
    quiet: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print the extracted text of a PDF.
    Extract {
        /// Local PDF file path or HTTP/HTTPS URL.
        input: String,
    },
    /// Summarise one paper.
    Summarize {
        /// Local PDF file path or HTTP/HTTPS URL.
        input: String,

        /// Title and author label, e.g. "Gnewuch et al., 2023".
        #[arg(short, long)]
        title: Option<String>,
    },
    /// Summarise several papers and write a literature review.
    Review {
        /// Local PDF file paths or HTTP/HTTPS URLs, in review order.
        #[arg(required = true)]
        inputs: Vec<String>,

        /// Theme of the review, e.g. "Human + AI Collaboration".
        #[arg(long)]
        theme: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // The spinner gives all the feedback that matters while it is active.
    let show_progress = !cli.quiet && !cli.no_progress && !cli.json;
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

    let spinner = show_progress.then(CliProgressCallback::new);
    let progress: ProgressCallback = match &spinner {
        Some(cb) => cb.clone() as ProgressCallback,
        None => Arc::new(PlainProgressCallback),
    };
    let config = build_config(&cli, progress)?;

    let result = match &cli.command {
        Command::Extract { input } => run_extract(&cli, input, &config).await,
        Command::Summarize { input, title } => {
            run_summarize(&cli, input, title.as_deref(), &config, spinner.as_deref()).await
        }
        Command::Review { inputs, theme } => {
            run_review(&cli, inputs, theme, &config, spinner.as_deref()).await
        }
    };

    if let Some(cb) = &spinner {
        cb.finish();
    }
    result
}

async fn run_extract(cli: &Cli, input: &str, config: &ResearchConfig) -> Result<()> {
    let doc = load(input, config).await?;
    let text = extract_text_async(&doc, config.password.as_deref())
        .await
        .with_context(|| format!("Failed to extract text from '{}'", doc.name))?;

    if cli.json {
        let value = serde_json::json!({
            "document": doc.name,
            "chars": text.chars().count(),
            "text": text,
        });
        println!(
            "{}",
            serde_json::to_string_pretty(&value).context("Failed to serialise output")?
        );
    } else {
        write_stdout(&text)?;
    }
    Ok(())
}

async fn run_summarize(
    cli: &Cli,
    input: &str,
    title: Option<&str>,
    config: &ResearchConfig,
    spinner: Option<&CliProgressCallback>,
) -> Result<()> {
    // Credentials are read once, before any work starts.
    let session = Session::from_config(config).context("Failed to set up the LLM provider")?;
    let doc = load(input, config).await?;

    let mut flow = SummarizeFlow::new(title);
    flow.extract(&session, &doc)
        .await
        .with_context(|| format!("Failed to extract text from '{}'", doc.name))?;

    if !confirm(cli, spinner, "Generate summary?")? {
        eprintln!("Cancelled.");
        return Ok(());
    }

    flow.confirm(&session)
        .await
        .context("Summary generation failed")?;
    let output = flow.finish()?;

    if let Some(cb) = spinner {
        cb.finish();
    }
    print_summary(cli, &output)
}

async fn run_review(
    cli: &Cli,
    inputs: &[String],
    theme: &str,
    config: &ResearchConfig,
    spinner: Option<&CliProgressCallback>,
) -> Result<()> {
    let session = Session::from_config(config).context("Failed to set up the LLM provider")?;

    let mut docs = Vec::with_capacity(inputs.len());
    for input in inputs {
        docs.push(load(input, config).await?);
    }

    let mut flow = ReviewFlow::new(theme);
    let papers = flow
        .process(&session, &docs)
        .await
        .context("Processing papers failed")?;

    let skipped = papers.iter().filter(|p| p.is_skipped()).count();
    if !cli.quiet {
        let line = format!(
            "{} Summaries generated for {}/{} papers",
            if skipped == 0 { green("✔") } else { yellow("⚠") },
            bold(&(papers.len() - skipped).to_string()),
            papers.len(),
        );
        match spinner {
            Some(cb) => cb.bar.println(line),
            None => eprintln!("{line}"),
        }
    }

    if !confirm(cli, spinner, "Generate literature review?")? {
        eprintln!("Cancelled.");
        return Ok(());
    }

    flow.confirm(&session)
        .await
        .context("Literature review generation failed")?;
    let output = flow.finish()?;

    if let Some(cb) = spinner {
        cb.finish();
    }
    print_review(cli, &output)
}

/// Map CLI args to `ResearchConfig`.
fn build_config(cli: &Cli, progress: ProgressCallback) -> Result<ResearchConfig> {
    let mut builder = ResearchConfig::builder()
        .max_tokens(cli.max_tokens)
        .max_retries(cli.max_retries)
        .backoff_unit_ms(cli.backoff_unit_ms)
        .download_timeout_secs(cli.download_timeout)
        .progress_callback(progress);

    if let Some(t) = cli.temperature {
        builder = builder.temperature(t);
    }
    if let Some(ref m) = cli.model {
        builder = builder.model(m.clone());
    }
    if let Some(ref p) = cli.provider {
        builder = builder.provider_name(p.clone());
    }
    if let Some(ref pwd) = cli.password {
        builder = builder.password(pwd.clone());
    }

    builder.build().context("Invalid configuration")
}

async fn load(input: &str, config: &ResearchConfig) -> Result<Document> {
    load_document(input, config.download_timeout_secs)
        .await
        .with_context(|| format!("Failed to load '{input}'"))
}

/// Ask the user before a model call. Non-interactive runs and `--yes` proceed.
fn confirm(cli: &Cli, spinner: Option<&CliProgressCallback>, question: &str) -> Result<bool> {
    if cli.yes || !io::stdin().is_terminal() {
        return Ok(true);
    }

    let ask = || -> io::Result<bool> {
        eprint!("{} {} ", cyan("?"), bold(&format!("{question} [Y/n]")));
        io::stderr().flush()?;
        let mut answer = String::new();
        io::stdin().lock().read_line(&mut answer)?;
        let answer = answer.trim().to_lowercase();
        Ok(answer.is_empty() || answer == "y" || answer == "yes")
    };

    let answer = match spinner {
        Some(cb) => cb.suspend(ask),
        None => ask(),
    };
    answer.context("Failed to read confirmation from stdin")
}

fn print_summary(cli: &Cli, output: &SummaryOutput) -> Result<()> {
    if cli.json {
        let json = serde_json::to_string_pretty(output).context("Failed to serialise output")?;
        println!("{json}");
        return Ok(());
    }

    write_stdout(&output.summary)?;
    if !cli.quiet {
        eprintln!(
            "{}  {}  {} tokens in / {} tokens out  {}ms",
            green("✔"),
            bold(&output.document),
            dim(&output.stats.total_input_tokens.to_string()),
            dim(&output.stats.total_output_tokens.to_string()),
            output.stats.total_duration_ms,
        );
    }
    Ok(())
}

fn print_review(cli: &Cli, output: &LiteratureReviewOutput) -> Result<()> {
    if cli.json {
        let json = serde_json::to_string_pretty(output).context("Failed to serialise output")?;
        println!("{json}");
        return Ok(());
    }

    write_stdout(&output.review)?;
    if !cli.quiet {
        let skipped = output.skipped_count();
        eprintln!(
            "{}  review on {} from {}/{} papers  {} tokens in / {} tokens out  {}ms",
            if skipped == 0 { green("✔") } else { yellow("⚠") },
            bold(&format!("\"{}\"", output.theme)),
            output.papers.len() - skipped,
            output.papers.len(),
            dim(&output.stats.total_input_tokens.to_string()),
            dim(&output.stats.total_output_tokens.to_string()),
            output.stats.total_duration_ms,
        );
        for paper in output.papers.iter().filter(|p| p.is_skipped()) {
            eprintln!("   {} skipped: {}", red("✗"), paper.name());
        }
    }
    Ok(())
}

fn write_stdout(text: &str) -> Result<()> {
    let stdout = io::stdout();
    let mut handle = stdout.lock();
    handle
        .write_all(text.as_bytes())
        .context("Failed to write to stdout")?;
    if !text.ends_with('\n') {
        handle.write_all(b"\n").ok();
    }
    Ok(())
}
