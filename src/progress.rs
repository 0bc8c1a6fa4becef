//! Progress-callback trait for workflow events.
//!
//! Inject an [`Arc<dyn WorkflowProgressCallback>`] via
//! [`crate::config::ResearchConfigBuilder::progress_callback`] to hear about
//! extraction, per-paper progress and rate-limit retries while a flow runs.
//! The retry notifications are what lets a human understand why a request
//! has gone quiet for several seconds.
//!
//! # Example
//!
//! ```rust
//! use edgequake_litreview::{ResearchConfig, WorkflowProgressCallback};
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! struct StderrWarnings;
//!
//! impl WorkflowProgressCallback for StderrWarnings {
//!     fn on_retry(&self, _attempt: u32, _max_attempts: u32, wait: Duration) {
//!         eprintln!("Rate limit reached. Retrying in {} seconds...", wait.as_secs());
//!     }
//! }
//!
//! let config = ResearchConfig::builder()
//!     .progress_callback(Arc::new(StderrWarnings))
//!     .build()
//!     .unwrap();
//! ```

use std::sync::Arc;
use std::time::Duration;

/// Called by the workflows as they move through their states.
///
/// All methods have default no-op implementations so callers only override
/// what they care about. Flows are sequential, so calls never overlap.
pub trait WorkflowProgressCallback: Send + Sync {
    /// Text has been extracted from a document.
    ///
    /// # Arguments
    /// * `document`: display name of the document
    /// * `chars`: extracted character count (before truncation)
    fn on_extraction_complete(&self, document: &str, chars: usize) {
        let _ = (document, chars);
    }

    /// A literature-review paper is about to be extracted and summarised.
    ///
    /// # Arguments
    /// * `index`: 1-based upload position
    /// * `total`: number of uploaded papers
    /// * `name`: display name of the document
    fn on_paper_start(&self, index: usize, total: usize, name: &str) {
        let _ = (index, total, name);
    }

    /// A literature-review paper was summarised.
    fn on_paper_complete(&self, index: usize, total: usize, summary_len: usize) {
        let _ = (index, total, summary_len);
    }

    /// A literature-review paper was skipped; the batch continues.
    fn on_paper_skipped(&self, index: usize, total: usize, error: &str) {
        let _ = (index, total, error);
    }

    /// A completion request is about to be sent.
    ///
    /// `label` is a short description such as `"summary"` or `"literature review"`.
    fn on_request_start(&self, label: &str) {
        let _ = label;
    }

    /// The endpoint rate limited the request; the client waits `wait` and retries.
    ///
    /// # Arguments
    /// * `attempt`: 1-based number of the attempt that just failed
    /// * `max_attempts`: the retry budget
    /// * `wait`: backoff before the next attempt
    fn on_retry(&self, attempt: u32, max_attempts: u32, wait: Duration) {
        let _ = (attempt, max_attempts, wait);
    }

    /// Every attempt was rate limited; the request is abandoned.
    fn on_rate_limit_exhausted(&self, attempts: u32) {
        let _ = attempts;
    }
}

/// A no-op implementation for callers that don't need progress events.
pub struct NoopProgressCallback;

impl WorkflowProgressCallback for NoopProgressCallback {}

/// Convenience alias matching the type stored in [`crate::config::ResearchConfig`].
pub type ProgressCallback = Arc<dyn WorkflowProgressCallback>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    #[derive(Default)]
    struct TrackingCallback {
        papers: AtomicUsize,
        skipped: AtomicUsize,
        waits: Mutex<Vec<Duration>>,
    }

    impl WorkflowProgressCallback for TrackingCallback {
        fn on_paper_complete(&self, _index: usize, _total: usize, _summary_len: usize) {
            self.papers.fetch_add(1, Ordering::SeqCst);
        }

        fn on_paper_skipped(&self, _index: usize, _total: usize, _error: &str) {
            self.skipped.fetch_add(1, Ordering::SeqCst);
        }

        fn on_retry(&self, _attempt: u32, _max_attempts: u32, wait: Duration) {
            self.waits.lock().unwrap().push(wait);
        }
    }

    #[test]
    fn noop_callback_does_not_panic() {
        let cb = NoopProgressCallback;
        cb.on_extraction_complete("a.pdf", 100);
        cb.on_paper_start(1, 2, "a.pdf");
        cb.on_paper_complete(1, 2, 42);
        cb.on_paper_skipped(2, 2, "rate limited");
        cb.on_request_start("summary");
        cb.on_retry(1, 5, Duration::from_secs(1));
        cb.on_rate_limit_exhausted(5);
    }

    #[test]
    fn tracking_callback_receives_events() {
        let tracker = TrackingCallback::default();
        tracker.on_paper_complete(1, 3, 10);
        tracker.on_paper_skipped(2, 3, "rate limited");
        tracker.on_paper_complete(3, 3, 10);
        tracker.on_retry(1, 5, Duration::from_secs(1));
        tracker.on_retry(2, 5, Duration::from_secs(2));

        assert_eq!(tracker.papers.load(Ordering::SeqCst), 2);
        assert_eq!(tracker.skipped.load(Ordering::SeqCst), 1);
        assert_eq!(
            *tracker.waits.lock().unwrap(),
            vec![Duration::from_secs(1), Duration::from_secs(2)]
        );
    }

    #[test]
    fn arc_dyn_callback_works() {
        let cb: ProgressCallback = Arc::new(NoopProgressCallback);
        cb.on_request_start("literature review");
    }
}
