//! The two user-facing flows: summarise one paper, and review many.
//!
//! Each flow is an explicit state value ([`SummarizeFlow`], [`ReviewFlow`])
//! advanced by async transition methods against a [`Session`]. The
//! presentation layer decides when to call each transition, which is where
//! the "user confirms" step lives; [`summarize_paper`] and
//! [`generate_literature_review`] run a flow start to finish for callers
//! with nothing to confirm.
//!
//! ## Failure policy
//!
//! * Summary flow: any error ends the flow in `Failed`. A rate-limit failure
//!   is not retried beyond the client's own budget and yields no partial output.
//! * Review flow: a paper whose summary exhausts the rate-limit budget is
//!   skipped and the batch continues; every other error aborts the batch.
//!   Skipped papers get no marker in the review prompt, only in
//!   [`LiteratureReviewOutput::papers`].

use crate::config::ResearchConfig;
use crate::error::{FailureKind, PaperError, ResearchError};
use crate::output::{LiteratureReviewOutput, PaperOutcome, RunStats, SummaryOutput};
use crate::pipeline::extract::{PdfiumExtractor, TextExtractor};
use crate::pipeline::input::Document;
use crate::pipeline::llm::CompletionClient;
use crate::progress::ProgressCallback;
use crate::prompts::{review_prompt, summary_prompt};
use std::sync::Arc;
use std::time::Instant;
use tracing::{info, warn};

// ── Session ──────────────────────────────────────────────────────────────

/// The collaborators a flow talks to: a completion client, a text
/// extractor, and where to report progress.
///
/// One session can run any number of flows; each flow keeps its own state
/// and nothing carries over between them.
#[derive(Clone)]
pub struct Session {
    client: CompletionClient,
    extractor: Arc<dyn TextExtractor>,
    password: Option<String>,
    progress: Option<ProgressCallback>,
}

impl Session {
    /// Assemble a session from explicit parts; password and callback come from `config`.
    pub fn new(
        client: CompletionClient,
        extractor: Arc<dyn TextExtractor>,
        config: &ResearchConfig,
    ) -> Self {
        Self {
            client,
            extractor,
            password: config.password.clone(),
            progress: config.progress_callback.clone(),
        }
    }

    /// Resolve the LLM provider and use pdfium for extraction.
    pub fn from_config(config: &ResearchConfig) -> Result<Self, ResearchError> {
        let client = CompletionClient::from_config(config)?;
        Ok(Self::new(client, Arc::new(PdfiumExtractor), config))
    }

    pub fn client(&self) -> &CompletionClient {
        &self.client
    }

    /// Run the summary flow start to finish.
    pub async fn summarize_paper(
        &self,
        document: &Document,
        title_and_author: Option<&str>,
    ) -> Result<SummaryOutput, ResearchError> {
        let mut flow = SummarizeFlow::new(title_and_author);
        flow.extract(self, document).await?;
        flow.confirm(self).await?;
        flow.finish()
    }

    /// Run the literature-review flow start to finish.
    pub async fn literature_review(
        &self,
        documents: &[Document],
        theme: &str,
    ) -> Result<LiteratureReviewOutput, ResearchError> {
        let mut flow = ReviewFlow::new(theme);
        flow.process(self, documents).await?;
        flow.confirm(self).await?;
        flow.finish()
    }

    fn progress(&self) -> Option<&ProgressCallback> {
        self.progress.as_ref()
    }
}

// ── Summarize one paper ──────────────────────────────────────────────────

/// Where a [`SummarizeFlow`] currently stands.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SummarizeState {
    Idle,
    Extracting,
    Extracted,
    RequestingSummary,
    Done,
    Failed(FailureKind),
}

impl SummarizeState {
    fn name(&self) -> &'static str {
        match self {
            SummarizeState::Idle => "idle",
            SummarizeState::Extracting => "extracting",
            SummarizeState::Extracted => "extracted",
            SummarizeState::RequestingSummary => "requesting a summary",
            SummarizeState::Done => "done",
            SummarizeState::Failed(_) => "failed",
        }
    }
}

/// Idle → Extracting → Extracted → RequestingSummary → Done | Failed.
pub struct SummarizeFlow {
    title_and_author: Option<String>,
    state: SummarizeState,
    document: Option<String>,
    text: String,
    summary: Option<String>,
    stats: RunStats,
    started: Instant,
}

impl SummarizeFlow {
    /// Start a flow. A blank label is treated as no label.
    pub fn new(title_and_author: Option<&str>) -> Self {
        Self {
            title_and_author: title_and_author
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string),
            state: SummarizeState::Idle,
            document: None,
            text: String::new(),
            summary: None,
            stats: RunStats::default(),
            started: Instant::now(),
        }
    }

    pub fn state(&self) -> &SummarizeState {
        &self.state
    }

    /// Extracted text, empty until the flow reaches `Extracted`.
    pub fn text(&self) -> &str {
        &self.text
    }

    /// Extract the uploaded paper's text. Allowed from `Idle` only.
    pub async fn extract(
        &mut self,
        session: &Session,
        document: &Document,
    ) -> Result<&str, ResearchError> {
        self.expect_state(SummarizeState::Idle, "extract a paper")?;
        self.state = SummarizeState::Extracting;
        info!("Extracting text from '{}'", document.name);

        match session
            .extractor
            .extract(document, session.password.as_deref())
            .await
        {
            Ok(text) => {
                let chars = text.chars().count();
                info!("Text extraction completed: {} chars", chars);
                if let Some(cb) = session.progress() {
                    cb.on_extraction_complete(&document.name, chars);
                }
                self.document = Some(document.name.clone());
                self.text = text;
                self.state = SummarizeState::Extracted;
                Ok(&self.text)
            }
            Err(e) => {
                self.state = SummarizeState::Failed(FailureKind::Extraction);
                Err(e.into())
            }
        }
    }

    /// Request the summary. Allowed from `Extracted` only.
    pub async fn confirm(&mut self, session: &Session) -> Result<&str, ResearchError> {
        self.expect_state(SummarizeState::Extracted, "request a summary")?;
        self.state = SummarizeState::RequestingSummary;

        let prompt = summary_prompt(&self.text, self.title_and_author.as_deref());
        if let Some(cb) = session.progress() {
            cb.on_request_start("summary");
        }

        match session.client.request(&prompt).await {
            Ok(completion) => {
                self.stats.record(&completion);
                self.summary = Some(completion.text);
                self.state = SummarizeState::Done;
                Ok(self.summary.as_deref().unwrap_or_default())
            }
            Err(e) => {
                if let ResearchError::RateLimitExceeded { attempts, .. } = &e {
                    self.stats.rate_limit_retries += attempts;
                }
                warn!("Summary request failed: {}", e);
                self.state = SummarizeState::Failed(e.kind());
                Err(e)
            }
        }
    }

    /// Consume a `Done` flow into its output.
    pub fn finish(self) -> Result<SummaryOutput, ResearchError> {
        self.expect_state(SummarizeState::Done, "collect the summary")?;
        let mut stats = self.stats;
        stats.total_duration_ms = self.started.elapsed().as_millis() as u64;
        Ok(SummaryOutput {
            document: self.document.unwrap_or_default(),
            title_and_author: self.title_and_author,
            extracted_chars: self.text.chars().count(),
            summary: self.summary.unwrap_or_default(),
            stats,
        })
    }

    fn expect_state(&self, want: SummarizeState, action: &'static str) -> Result<(), ResearchError> {
        if self.state == want {
            Ok(())
        } else {
            Err(ResearchError::InvalidState {
                action,
                state: self.state.name().to_string(),
            })
        }
    }
}

/// Extract and summarise one paper with the provider named by `config`.
pub async fn summarize_paper(
    document: &Document,
    title_and_author: Option<&str>,
    config: &ResearchConfig,
) -> Result<SummaryOutput, ResearchError> {
    Session::from_config(config)?
        .summarize_paper(document, title_and_author)
        .await
}

// ── Literature review ────────────────────────────────────────────────────

/// Where a [`ReviewFlow`] currently stands.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReviewState {
    Idle,
    /// Working on paper `index` (1-based) of `total`.
    Processing { index: usize, total: usize },
    AllProcessed,
    RequestingReview,
    Done,
    Failed(FailureKind),
}

impl ReviewState {
    fn name(&self) -> &'static str {
        match self {
            ReviewState::Idle => "idle",
            ReviewState::Processing { .. } => "processing papers",
            ReviewState::AllProcessed => "waiting for confirmation",
            ReviewState::RequestingReview => "requesting the review",
            ReviewState::Done => "done",
            ReviewState::Failed(_) => "failed",
        }
    }
}

/// Idle → Processing(1..n) → AllProcessed → RequestingReview → Done | Failed.
pub struct ReviewFlow {
    theme: String,
    state: ReviewState,
    papers: Vec<PaperOutcome>,
    review: Option<String>,
    stats: RunStats,
    started: Instant,
}

impl ReviewFlow {
    pub fn new(theme: &str) -> Self {
        Self {
            theme: theme.trim().to_string(),
            state: ReviewState::Idle,
            papers: Vec::new(),
            review: None,
            stats: RunStats::default(),
            started: Instant::now(),
        }
    }

    pub fn state(&self) -> &ReviewState {
        &self.state
    }

    /// Per-paper outcomes so far, in upload order.
    pub fn papers(&self) -> &[PaperOutcome] {
        &self.papers
    }

    /// Extract and summarise every document, one after another.
    ///
    /// Allowed from `Idle` only. On success the flow is `AllProcessed`.
    pub async fn process(
        &mut self,
        session: &Session,
        documents: &[Document],
    ) -> Result<&[PaperOutcome], ResearchError> {
        self.expect_state(ReviewState::Idle, "process papers")?;
        if self.theme.is_empty() {
            self.state = ReviewState::Failed(FailureKind::Other);
            return Err(ResearchError::InvalidInput(
                "a literature review needs a theme".into(),
            ));
        }
        if documents.is_empty() {
            self.state = ReviewState::Failed(FailureKind::Other);
            return Err(ResearchError::InvalidInput(
                "a literature review needs at least one paper".into(),
            ));
        }

        let total = documents.len();
        info!("Processing {} papers for theme '{}'", total, self.theme);

        for (i, document) in documents.iter().enumerate() {
            let index = i + 1;
            self.state = ReviewState::Processing { index, total };
            if let Some(cb) = session.progress() {
                cb.on_paper_start(index, total, &document.name);
            }
            info!("Processing {} ({}/{})", document.name, index, total);

            let extracted = session
                .extractor
                .extract(document, session.password.as_deref())
                .await;
            let text = match extracted {
                Ok(text) => text,
                Err(e) => {
                    self.state = ReviewState::Failed(FailureKind::Extraction);
                    return Err(e.into());
                }
            };
            if let Some(cb) = session.progress() {
                cb.on_extraction_complete(&document.name, text.chars().count());
                cb.on_request_start("summary");
            }

            let prompt = summary_prompt(&text, None);
            match session.client.request(&prompt).await {
                Ok(completion) => {
                    self.stats.record(&completion);
                    if let Some(cb) = session.progress() {
                        cb.on_paper_complete(index, total, completion.text.chars().count());
                    }
                    self.papers.push(PaperOutcome::Summarized {
                        index,
                        name: document.name.clone(),
                        summary: completion.text,
                    });
                }
                Err(ResearchError::RateLimitExceeded { attempts, .. }) => {
                    self.stats.rate_limit_retries += attempts;
                    let error = PaperError::RateLimited {
                        index,
                        name: document.name.clone(),
                        attempts,
                    };
                    warn!("{}", error);
                    if let Some(cb) = session.progress() {
                        cb.on_paper_skipped(index, total, &error.to_string());
                    }
                    self.papers.push(PaperOutcome::Skipped {
                        index,
                        name: document.name.clone(),
                        error,
                    });
                }
                Err(e) => {
                    self.state = ReviewState::Failed(e.kind());
                    return Err(e);
                }
            }
        }

        let summarized = self.papers.iter().filter(|p| !p.is_skipped()).count();
        info!("Summaries generated for {}/{} papers", summarized, total);
        self.state = ReviewState::AllProcessed;
        Ok(&self.papers)
    }

    /// Request the literature review. Allowed from `AllProcessed` only.
    pub async fn confirm(&mut self, session: &Session) -> Result<&str, ResearchError> {
        self.expect_state(ReviewState::AllProcessed, "request the review")?;

        let summaries: Vec<&str> = self.papers.iter().filter_map(PaperOutcome::summary).collect();
        if summaries.is_empty() {
            warn!("Every paper was skipped; requesting a review with no summaries");
        }
        let prompt = review_prompt(&self.theme, &summaries);

        self.state = ReviewState::RequestingReview;
        if let Some(cb) = session.progress() {
            cb.on_request_start("literature review");
        }

        match session.client.request(&prompt).await {
            Ok(completion) => {
                self.stats.record(&completion);
                self.review = Some(completion.text);
                self.state = ReviewState::Done;
                Ok(self.review.as_deref().unwrap_or_default())
            }
            Err(e) => {
                if let ResearchError::RateLimitExceeded { attempts, .. } = &e {
                    self.stats.rate_limit_retries += attempts;
                }
                warn!("Literature review request failed: {}", e);
                self.state = ReviewState::Failed(e.kind());
                Err(e)
            }
        }
    }

    /// Consume a `Done` flow into its output.
    pub fn finish(self) -> Result<LiteratureReviewOutput, ResearchError> {
        self.expect_state(ReviewState::Done, "collect the review")?;
        let mut stats = self.stats;
        stats.total_duration_ms = self.started.elapsed().as_millis() as u64;
        Ok(LiteratureReviewOutput {
            theme: self.theme,
            papers: self.papers,
            review: self.review.unwrap_or_default(),
            stats,
        })
    }

    fn expect_state(&self, want: ReviewState, action: &'static str) -> Result<(), ResearchError> {
        if self.state == want {
            Ok(())
        } else {
            Err(ResearchError::InvalidState {
                action,
                state: self.state.name().to_string(),
            })
        }
    }
}

/// Summarise every document and synthesise a review on `theme`.
pub async fn generate_literature_review(
    documents: &[Document],
    theme: &str,
    config: &ResearchConfig,
) -> Result<LiteratureReviewOutput, ResearchError> {
    Session::from_config(config)?
        .literature_review(documents, theme)
        .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::CompletionError;
    use crate::pipeline::llm::{Completion, CompletionEndpoint, CompletionRequest};
    use async_trait::async_trait;
    use std::sync::Arc;

    struct Echo;

    #[async_trait]
    impl CompletionEndpoint for Echo {
        async fn complete(&self, _request: &CompletionRequest) -> Result<Completion, CompletionError> {
            Ok(Completion {
                text: "ok".into(),
                ..Default::default()
            })
        }
    }

    fn session() -> Session {
        let config = ResearchConfig::default();
        let client = CompletionClient::new(Arc::new(Echo), &config);
        Session::new(client, Arc::new(PdfiumExtractor), &config)
    }

    #[test]
    fn blank_title_is_no_title() {
        let flow = SummarizeFlow::new(Some("   "));
        assert!(flow.title_and_author.is_none());
        assert_eq!(flow.state(), &SummarizeState::Idle);
    }

    #[tokio::test]
    async fn summary_requires_extraction_first() {
        let mut flow = SummarizeFlow::new(Some("Doe, 2024"));
        let err = flow.confirm(&session()).await.unwrap_err();
        assert!(matches!(err, ResearchError::InvalidState { .. }));
        assert!(err.to_string().contains("idle"));
        assert_eq!(flow.state(), &SummarizeState::Idle);
    }

    #[tokio::test]
    async fn failed_extraction_fails_the_flow() {
        let mut flow = SummarizeFlow::new(None);
        let doc = Document::new("broken.pdf", b"not a pdf".to_vec());
        let err = flow.extract(&session(), &doc).await.unwrap_err();
        assert_eq!(err.kind(), FailureKind::Extraction);
        assert_eq!(flow.state(), &SummarizeState::Failed(FailureKind::Extraction));
        assert!(flow.finish().is_err());
    }

    #[tokio::test]
    async fn review_requires_theme_and_papers() {
        let mut flow = ReviewFlow::new("  ");
        let err = flow
            .process(&session(), &[Document::new("a.pdf", b"%PDF".to_vec())])
            .await
            .unwrap_err();
        assert!(matches!(err, ResearchError::InvalidInput(_)));

        let mut flow = ReviewFlow::new("Human + AI Collaboration");
        let err = flow.process(&session(), &[]).await.unwrap_err();
        assert!(matches!(err, ResearchError::InvalidInput(_)));
    }

    #[tokio::test]
    async fn review_cannot_be_confirmed_before_processing() {
        let mut flow = ReviewFlow::new("Theme");
        let err = flow.confirm(&session()).await.unwrap_err();
        assert!(matches!(err, ResearchError::InvalidState { .. }));
    }

    #[tokio::test]
    async fn review_extraction_error_aborts_batch() {
        let mut flow = ReviewFlow::new("Theme");
        let docs = [Document::new("empty.pdf", Vec::new())];
        let err = flow.process(&session(), &docs).await.unwrap_err();
        assert_eq!(err.kind(), FailureKind::Extraction);
        assert_eq!(flow.state(), &ReviewState::Failed(FailureKind::Extraction));
        assert!(flow.papers().is_empty());
    }
}
