//! Result types returned by the workflows.
//!
//! All of them serialise with serde so the CLI can emit `--json`.
//! Summaries and reviews are opaque text; nothing here parses them.

use crate::error::PaperError;
use serde::{Deserialize, Serialize};

/// Counters for one flow run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunStats {
    /// Completion requests that returned text.
    pub requests: usize,
    /// Rate-limited attempts that were retried or exhausted.
    pub rate_limit_retries: u32,
    pub total_input_tokens: u64,
    pub total_output_tokens: u64,
    pub total_duration_ms: u64,
}

impl RunStats {
    pub(crate) fn record(&mut self, completion: &crate::pipeline::llm::Completion) {
        self.requests += 1;
        self.rate_limit_retries += completion.retries;
        self.total_input_tokens += completion.input_tokens;
        self.total_output_tokens += completion.output_tokens;
    }
}

/// Result of the summarize-one-paper flow.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SummaryOutput {
    pub document: String,
    pub title_and_author: Option<String>,
    /// Characters extracted from the PDF, before the excerpt cut.
    pub extracted_chars: usize,
    pub summary: String,
    pub stats: RunStats,
}

/// What happened to one uploaded paper in a literature review.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum PaperOutcome {
    Summarized {
        /// 1-based upload position.
        index: usize,
        name: String,
        summary: String,
    },
    Skipped {
        index: usize,
        name: String,
        error: PaperError,
    },
}

impl PaperOutcome {
    pub fn summary(&self) -> Option<&str> {
        match self {
            PaperOutcome::Summarized { summary, .. } => Some(summary),
            PaperOutcome::Skipped { .. } => None,
        }
    }

    pub fn name(&self) -> &str {
        match self {
            PaperOutcome::Summarized { name, .. } | PaperOutcome::Skipped { name, .. } => name,
        }
    }

    pub fn is_skipped(&self) -> bool {
        matches!(self, PaperOutcome::Skipped { .. })
    }
}

/// Result of the literature-review flow.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LiteratureReviewOutput {
    pub theme: String,
    /// One entry per uploaded paper, in upload order.
    pub papers: Vec<PaperOutcome>,
    pub review: String,
    pub stats: RunStats,
}

impl LiteratureReviewOutput {
    pub fn skipped_count(&self) -> usize {
        self.papers.iter().filter(|p| p.is_skipped()).count()
    }
}
