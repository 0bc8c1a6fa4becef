//! # edgequake-litreview
//!
//! Summarise research papers and synthesise literature reviews from PDFs
//! with a language model.
//!
//! ## Pipeline Overview
//!
//! ```text
//! PDF
//!  │
//!  ├─ 1. Input    load a local file or download from URL
//!  ├─ 2. Extract  page text via pdfium (spawn_blocking), concatenated in order
//!  ├─ 3. Prompt   six-category rubric + first 2000 characters of text
//!  ├─ 4. LLM      completion with exponential backoff on rate limits
//!  └─ 5. Review   (many papers) "Paper 1: …", "Paper 2: …" → synthesis
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use edgequake_litreview::{load_document, summarize_paper, ResearchConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // Provider auto-detected from OPENAI_API_KEY / ANTHROPIC_API_KEY / GEMINI_API_KEY
//!     let config = ResearchConfig::default();
//!     let paper = load_document("paper.pdf", config.download_timeout_secs).await?;
//!     let output = summarize_paper(&paper, Some("Gnewuch et al., 2023"), &config).await?;
//!     println!("{}", output.summary);
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `litreview` binary (clap + anyhow + tracing-subscriber) |
//!
//! ## Rate limits
//!
//! Each request is attempted up to [`ResearchConfig::max_retries`] times
//! (default 5) while the provider keeps rate limiting, waiting 1, 2, 4, 8 …
//! backoff units in between. In a literature review a paper whose summary
//! still fails is skipped; the review is written from the rest.

// ── Modules ──────────────────────────────────────────────────────────────

pub mod config;
pub mod error;
pub mod output;
pub mod pipeline;
pub mod progress;
pub mod prompts;
pub mod workflow;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use config::{ResearchConfig, ResearchConfigBuilder, DEFAULT_MODEL};
pub use error::{CompletionError, ExtractionError, FailureKind, PaperError, ResearchError};
pub use output::{LiteratureReviewOutput, PaperOutcome, RunStats, SummaryOutput};
pub use pipeline::extract::{extract_text, extract_text_async, PdfiumExtractor, TextExtractor};
pub use pipeline::input::{load_document, Document};
pub use pipeline::llm::{
    Completion, CompletionClient, CompletionEndpoint, CompletionRequest, LlmEndpoint,
};
pub use progress::{NoopProgressCallback, ProgressCallback, WorkflowProgressCallback};
pub use workflow::{
    generate_literature_review, summarize_paper, ReviewFlow, ReviewState, Session, SummarizeFlow,
    SummarizeState,
};
