//! Workflow integration tests against scripted collaborators.
//!
//! A scripted completion endpoint and an in-memory text extractor stand in
//! for the LLM provider and pdfium, so these run offline and fast. The
//! backoff unit is one millisecond throughout.

use async_trait::async_trait;
use edgequake_litreview::{
    Completion, CompletionClient, CompletionEndpoint, CompletionError, CompletionRequest,
    Document, ExtractionError, FailureKind, PaperError, PaperOutcome, ResearchConfig,
    ResearchError, ReviewFlow, ReviewState, Session, SummarizeFlow, SummarizeState, TextExtractor,
    WorkflowProgressCallback,
};
use std::sync::{Arc, Mutex};
use std::time::Duration;

// ── Test doubles ─────────────────────────────────────────────────────────────

/// Answers every prompt according to its content.
///
/// * prompts containing `RATE_LIMITED` are always rate limited
/// * prompts containing `AUTH_FAIL` fail authentication
/// * review prompts get `"REVIEW"`
/// * summary prompts get `"summary of <first word after 'Text: '>"`
#[derive(Default)]
struct ScriptedEndpoint {
    prompts: Mutex<Vec<String>>,
}

impl ScriptedEndpoint {
    fn prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap().clone()
    }
}

#[async_trait]
impl CompletionEndpoint for ScriptedEndpoint {
    async fn complete(&self, request: &CompletionRequest) -> Result<Completion, CompletionError> {
        self.prompts.lock().unwrap().push(request.prompt.clone());
        let prompt = &request.prompt;

        if prompt.starts_with("Based on the following summaries") {
            return Ok(Completion {
                text: "  REVIEW\n".into(),
                input_tokens: 100,
                output_tokens: 50,
                ..Default::default()
            });
        }
        if prompt.contains("RATE_LIMITED") {
            return Err(CompletionError::RateLimited("429 Too Many Requests".into()));
        }
        if prompt.contains("AUTH_FAIL") {
            return Err(CompletionError::Auth("401 invalid api key".into()));
        }

        let word = prompt
            .split("Text: ")
            .nth(1)
            .and_then(|rest| rest.split_whitespace().next())
            .unwrap_or("nothing");
        Ok(Completion {
            text: format!("summary of {word}"),
            input_tokens: 10,
            output_tokens: 5,
            ..Default::default()
        })
    }
}

/// Treats the document bytes as its UTF-8 text.
struct InMemoryExtractor;

#[async_trait]
impl TextExtractor for InMemoryExtractor {
    async fn extract(
        &self,
        document: &Document,
        _password: Option<&str>,
    ) -> Result<String, ExtractionError> {
        if document.bytes.is_empty() {
            return Err(ExtractionError::Empty {
                name: document.name.clone(),
            });
        }
        Ok(String::from_utf8_lossy(&document.bytes).into_owned())
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Event {
    Retry(u32, u32, Duration),
    Exhausted(u32),
    Skipped(usize),
    Complete(usize),
}

#[derive(Default)]
struct Recorder {
    events: Mutex<Vec<Event>>,
    summary_lens: Mutex<Vec<usize>>,
}

impl Recorder {
    fn events(&self) -> Vec<Event> {
        self.events.lock().unwrap().clone()
    }

    fn waits(&self) -> Vec<Duration> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                Event::Retry(_, _, wait) => Some(wait),
                _ => None,
            })
            .collect()
    }
}

impl WorkflowProgressCallback for Recorder {
    fn on_paper_complete(&self, index: usize, _total: usize, summary_len: usize) {
        self.summary_lens.lock().unwrap().push(summary_len);
        self.events.lock().unwrap().push(Event::Complete(index));
    }

    fn on_paper_skipped(&self, index: usize, _total: usize, _error: &str) {
        self.events.lock().unwrap().push(Event::Skipped(index));
    }

    fn on_retry(&self, attempt: u32, max_attempts: u32, wait: Duration) {
        self.events
            .lock()
            .unwrap()
            .push(Event::Retry(attempt, max_attempts, wait));
    }

    fn on_rate_limit_exhausted(&self, attempts: u32) {
        self.events.lock().unwrap().push(Event::Exhausted(attempts));
    }
}

struct Harness {
    endpoint: Arc<ScriptedEndpoint>,
    recorder: Arc<Recorder>,
    session: Session,
}

fn harness(max_retries: u32) -> Harness {
    let endpoint = Arc::new(ScriptedEndpoint::default());
    let recorder = Arc::new(Recorder::default());
    let config = ResearchConfig::builder()
        .max_retries(max_retries)
        .backoff_unit_ms(1)
        .progress_callback(recorder.clone())
        .build()
        .unwrap();
    let client = CompletionClient::new(endpoint.clone(), &config);
    let session = Session::new(client, Arc::new(InMemoryExtractor), &config);
    Harness {
        endpoint,
        recorder,
        session,
    }
}

fn doc(name: &str, text: &str) -> Document {
    Document::new(name, text.as_bytes().to_vec())
}

// ── Completion client ────────────────────────────────────────────────────────

#[tokio::test]
async fn exhausted_budget_makes_exactly_max_retries_calls() {
    let h = harness(4);
    let err = h
        .session
        .client()
        .request("RATE_LIMITED please")
        .await
        .unwrap_err();

    assert!(matches!(err, ResearchError::RateLimitExceeded { attempts: 4, .. }));
    assert_eq!(err.kind(), FailureKind::RateLimitExceeded);
    assert_eq!(h.endpoint.prompts().len(), 4);
    assert_eq!(
        h.recorder.waits(),
        vec![
            Duration::from_millis(1),
            Duration::from_millis(2),
            Duration::from_millis(4),
        ]
    );
    assert_eq!(h.recorder.events().last(), Some(&Event::Exhausted(4)));
}

#[tokio::test]
async fn non_rate_limit_error_is_not_retried() {
    let h = harness(5);
    let err = h.session.client().request("AUTH_FAIL").await.unwrap_err();

    assert!(matches!(
        err,
        ResearchError::Upstream(CompletionError::Auth(_))
    ));
    assert_eq!(h.endpoint.prompts().len(), 1);
    assert!(h.recorder.waits().is_empty());
}

#[tokio::test]
async fn success_text_is_trimmed() {
    let h = harness(5);
    let completion = h
        .session
        .client()
        .request("Based on the following summaries, nothing")
        .await
        .unwrap();
    assert_eq!(completion.text, "REVIEW");
    assert_eq!(completion.retries, 0);
}

// ── Summary flow ─────────────────────────────────────────────────────────────

#[tokio::test]
async fn summary_round_trip_with_title() {
    let h = harness(5);
    let paper = doc("paper.pdf", "Sample paper content about AI collaboration.");

    let mut flow = SummarizeFlow::new(Some("Doe, 2024"));
    let text = flow.extract(&h.session, &paper).await.unwrap().to_string();
    assert_eq!(text, "Sample paper content about AI collaboration.");
    assert_eq!(flow.state(), &SummarizeState::Extracted);
    assert!(h.endpoint.prompts().is_empty(), "no request before confirm");

    let summary = flow.confirm(&h.session).await.unwrap().to_string();
    assert_eq!(summary, "summary of Sample");
    assert_eq!(flow.state(), &SummarizeState::Done);

    let prompts = h.endpoint.prompts();
    assert_eq!(prompts.len(), 1);
    assert!(prompts[0].contains("Title and Author: Doe, 2024\n"));
    assert!(prompts[0].ends_with("Text: Sample paper content about AI collaboration."));
    for category in [
        "1. Context",
        "2. Research Question and Findings",
        "3. Theme of Research",
        "4. Method",
        "5. Contribution",
        "6. Future Potential and Limitations",
    ] {
        assert!(prompts[0].contains(category), "missing {category}");
    }

    let output = flow.finish().unwrap();
    assert_eq!(output.document, "paper.pdf");
    assert_eq!(output.title_and_author.as_deref(), Some("Doe, 2024"));
    assert_eq!(output.extracted_chars, 44);
    assert_eq!(output.stats.requests, 1);
    assert_eq!(output.stats.total_input_tokens, 10);
}

#[tokio::test]
async fn long_paper_is_cut_to_2000_chars() {
    let h = harness(5);
    let long = "x".repeat(5000);
    h.session
        .summarize_paper(&doc("long.pdf", &long), None)
        .await
        .unwrap();

    let prompt = &h.endpoint.prompts()[0];
    let embedded = prompt.split("Text: ").nth(1).unwrap();
    assert_eq!(embedded.chars().count(), 2000);
    assert!(!prompt.contains("Title and Author"));
}

#[tokio::test]
async fn rate_limited_summary_fails_the_flow() {
    let h = harness(3);
    let mut flow = SummarizeFlow::new(None);
    flow.extract(&h.session, &doc("busy.pdf", "RATE_LIMITED text"))
        .await
        .unwrap();

    let err = flow.confirm(&h.session).await.unwrap_err();
    assert!(matches!(err, ResearchError::RateLimitExceeded { .. }));
    assert_eq!(
        flow.state(),
        &SummarizeState::Failed(FailureKind::RateLimitExceeded)
    );
    assert_eq!(h.endpoint.prompts().len(), 3);
    assert!(flow.finish().is_err());
}

// ── Review flow ──────────────────────────────────────────────────────────────

#[tokio::test]
async fn rate_limited_paper_is_skipped_and_rest_renumbered() {
    let h = harness(3);
    let docs = [
        doc("one.pdf", "alpha findings"),
        doc("two.pdf", "RATE_LIMITED findings"),
        doc("three.pdf", "gamma findings"),
    ];

    let mut flow = ReviewFlow::new("Human + AI Collaboration");
    let papers = flow.process(&h.session, &docs).await.unwrap();
    assert_eq!(papers.len(), 3);
    assert!(matches!(
        &papers[1],
        PaperOutcome::Skipped {
            index: 2,
            error: PaperError::RateLimited { attempts: 3, .. },
            ..
        }
    ));
    assert_eq!(flow.state(), &ReviewState::AllProcessed);

    let review = flow.confirm(&h.session).await.unwrap().to_string();
    assert_eq!(review, "REVIEW");

    let prompts = h.endpoint.prompts();
    // 1 + 3 attempts for the skipped paper + 1 + the review
    assert_eq!(prompts.len(), 6);
    for p in &prompts[..5] {
        assert!(!p.contains("Title and Author"));
    }

    let review_prompt = prompts.last().unwrap();
    assert!(review_prompt.starts_with(
        "Based on the following summaries, write a literature review on \"Human + AI Collaboration\":\n"
    ));
    let first = review_prompt.find("\nPaper 1: summary of alpha\n").unwrap();
    let second = review_prompt.find("\nPaper 2: summary of gamma\n").unwrap();
    assert!(first < second);
    assert!(!review_prompt.contains("Paper 3:"));
    assert!(review_prompt.ends_with(
        "Synthesize the context, findings, and contributions into a cohesive review."
    ));

    let events = h.recorder.events();
    assert!(events.contains(&Event::Complete(1)));
    assert!(events.contains(&Event::Skipped(2)));
    assert!(events.contains(&Event::Complete(3)));

    let output = flow.finish().unwrap();
    assert_eq!(output.skipped_count(), 1);
    assert_eq!(output.theme, "Human + AI Collaboration");
    assert_eq!(output.stats.requests, 3);
}

#[tokio::test]
async fn paper_progress_reports_summary_length_in_chars() {
    let h = harness(5);
    let docs = [doc("cafe.pdf", "café findings")];

    let mut flow = ReviewFlow::new("Theme");
    let papers = flow.process(&h.session, &docs).await.unwrap();
    let summary = papers[0].summary().unwrap();
    assert_eq!(summary, "summary of café");
    assert_ne!(summary.len(), summary.chars().count());

    assert_eq!(*h.recorder.summary_lens.lock().unwrap(), vec![15]);
}

#[tokio::test]
async fn all_papers_skipped_still_requests_review() {
    let h = harness(1);
    let docs = [doc("a.pdf", "RATE_LIMITED a"), doc("b.pdf", "RATE_LIMITED b")];

    let output = h.session.literature_review(&docs, "Human vs. AI").await.unwrap();
    assert_eq!(output.skipped_count(), 2);
    assert_eq!(output.review, "REVIEW");

    let review_prompt = h.endpoint.prompts().pop().unwrap();
    assert!(!review_prompt.contains("Paper 1:"));
    // single-attempt budget: no waits at all
    assert!(h.recorder.waits().is_empty());
}

#[tokio::test]
async fn upstream_error_aborts_the_batch() {
    let h = harness(5);
    let docs = [
        doc("a.pdf", "alpha"),
        doc("b.pdf", "AUTH_FAIL"),
        doc("c.pdf", "gamma"),
    ];

    let mut flow = ReviewFlow::new("Theme");
    let err = flow.process(&h.session, &docs).await.unwrap_err();
    assert_eq!(err.kind(), FailureKind::Upstream);
    assert_eq!(flow.state(), &ReviewState::Failed(FailureKind::Upstream));
    // c.pdf never reached
    assert_eq!(h.endpoint.prompts().len(), 2);
}

#[tokio::test]
async fn empty_paper_aborts_with_extraction_failure() {
    let h = harness(5);
    let docs = [doc("a.pdf", "alpha"), Document::new("empty.pdf", Vec::new())];

    let err = h.session.literature_review(&docs, "Theme").await.unwrap_err();
    assert!(matches!(
        err,
        ResearchError::Extraction(ExtractionError::Empty { .. })
    ));
}
