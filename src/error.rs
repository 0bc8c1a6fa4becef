//! Error types for the edgequake-litreview library.
//!
//! Four error types reflect the layers a request passes through:
//!
//! * [`ExtractionError`]: the PDF could not be loaded or parsed. Never
//!   retried; surfaced to the user as-is.
//!
//! * [`CompletionError`]: a single failed call to the completion endpoint,
//!   classified by kind. Only [`CompletionError::RateLimited`] is retried by
//!   [`crate::pipeline::llm::CompletionClient`].
//!
//! * [`ResearchError`]: **Fatal** for the current action: returned by the
//!   workflow entry points once retries (if any) are exhausted.
//!
//! * [`PaperError`]: **Non-fatal**: one paper of a literature review was
//!   skipped but the batch continued. Stored inside
//!   [`crate::output::PaperOutcome`].

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use thiserror::Error;

/// The PDF could not be turned into text.
#[derive(Debug, Error)]
pub enum ExtractionError {
    // ── Input errors ──────────────────────────────────────────────────────
    /// The document has zero bytes.
    #[error("'{name}' is empty (0 bytes)")]
    Empty { name: String },

    /// Input file was not found at the given path.
    #[error("PDF file not found: '{path}'\nCheck the path exists and is readable.")]
    FileNotFound { path: PathBuf },

    /// Process does not have read permission on the file.
    #[error("Permission denied reading '{path}'\nTry: chmod +r {path:?}")]
    PermissionDenied { path: PathBuf },

    /// The input string is not a valid file path or URL.
    #[error("Invalid input '{input}': not a file path or a valid HTTP/HTTPS URL")]
    InvalidInput { input: String },

    /// HTTP URL was syntactically valid but download failed.
    #[error("Failed to download '{url}': {reason}\nCheck your internet connection.")]
    DownloadFailed { url: String, reason: String },

    /// Download exceeded the configured timeout.
    #[error("Download timed out after {secs}s for '{url}'\nIncrease --download-timeout.")]
    DownloadTimeout { url: String, secs: u64 },

    /// The bytes were read, but they are not a PDF.
    #[error("'{name}' is not a valid PDF\nFirst bytes: {magic:?}")]
    NotAPdf { name: String, magic: Vec<u8> },

    // ── PDF errors ────────────────────────────────────────────────────────
    /// PDF header/trailer/xref is corrupt and cannot be parsed.
    #[error("PDF '{name}' is corrupt: {detail}")]
    CorruptPdf { name: String, detail: String },

    /// PDF requires a password but none was provided.
    #[error("PDF '{name}' is encrypted and requires a password.\nProvide it with --password <PASSWORD>.")]
    PasswordRequired { name: String },

    /// A password was provided but it is wrong.
    #[error("Wrong password for PDF '{name}'")]
    WrongPassword { name: String },

    /// pdfium returned an error while reading a page's text layer.
    #[error("Text extraction failed for page {page} of '{name}': {detail}")]
    PageTextFailed {
        name: String,
        page: usize,
        detail: String,
    },

    /// Could not bind to a pdfium library.
    #[error(
        "Failed to bind to pdfium library: {0}\n\n\
PDFium is normally downloaded automatically on first run.\n\
If the auto-download failed, you can:\n\
  • Check your internet connection and try again.\n\
  • Set PDFIUM_LIB_PATH=/path/to/libpdfium to use an existing copy.\n"
    )]
    PdfiumUnavailable(String),

    /// The blocking extraction task died.
    #[error("Internal extraction error: {0}")]
    Internal(String),
}

/// One failed call to the completion endpoint.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CompletionError {
    /// HTTP 429 or an equivalent quota/throughput signal.
    #[error("rate limited: {0}")]
    RateLimited(String),

    /// 401/403, missing or rejected API key.
    #[error("authentication failed: {0}")]
    Auth(String),

    /// 400-class request the endpoint refused to process.
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// Connection, DNS, TLS or timeout fault.
    #[error("network error: {0}")]
    Network(String),

    /// Anything the endpoint reported that fits no other kind.
    #[error("{0}")]
    Other(String),
}

impl CompletionError {
    pub fn is_rate_limited(&self) -> bool {
        matches!(self, CompletionError::RateLimited(_))
    }
}

/// All fatal errors returned by the workflow entry points.
#[derive(Debug, Error)]
pub enum ResearchError {
    /// The PDF could not be read.
    #[error(transparent)]
    Extraction(#[from] ExtractionError),

    /// Every attempt within the retry budget was rate limited.
    #[error("Rate limit exceeded after {attempts} attempts. Please check your usage or plan.\nLast error: {detail}")]
    RateLimitExceeded { attempts: u32, detail: String },

    /// The completion endpoint failed for a reason other than rate limiting.
    #[error("LLM request failed: {0}")]
    Upstream(#[from] CompletionError),

    /// The configured provider is not initialised (missing API key etc.).
    #[error("LLM provider '{provider}' is not configured.\n{hint}")]
    ProviderNotConfigured { provider: String, hint: String },

    /// Required user input is missing (empty theme, no documents).
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// A flow transition was requested from the wrong state.
    #[error("Cannot {action} while the flow is {state}")]
    InvalidState { action: &'static str, state: String },

    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl ResearchError {
    /// Coarse classification used by the flow state machines.
    pub fn kind(&self) -> FailureKind {
        match self {
            ResearchError::Extraction(_) => FailureKind::Extraction,
            ResearchError::RateLimitExceeded { .. } => FailureKind::RateLimitExceeded,
            ResearchError::Upstream(_) | ResearchError::ProviderNotConfigured { .. } => {
                FailureKind::Upstream
            }
            ResearchError::InvalidInput(_)
            | ResearchError::InvalidState { .. }
            | ResearchError::InvalidConfig(_)
            | ResearchError::Internal(_) => FailureKind::Other,
        }
    }
}

/// Why a flow ended in its `Failed` state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FailureKind {
    Extraction,
    RateLimitExceeded,
    Upstream,
    Other,
}

/// A non-fatal error for a single paper of a literature review.
#[derive(Debug, Clone, Error, Serialize, Deserialize, PartialEq, Eq)]
pub enum PaperError {
    /// The summary request for this paper exhausted its retry budget.
    #[error("Paper {index} ('{name}'): skipped, rate limit exceeded after {attempts} attempts")]
    RateLimited {
        index: usize,
        name: String,
        attempts: u32,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rate_limit_exceeded_display() {
        let e = ResearchError::RateLimitExceeded {
            attempts: 5,
            detail: "429 Too Many Requests".into(),
        };
        let msg = e.to_string();
        assert!(msg.contains("5 attempts"), "got: {msg}");
        assert!(msg.contains("429"), "got: {msg}");
    }

    #[test]
    fn extraction_error_is_transparent() {
        let e: ResearchError = ExtractionError::Empty {
            name: "paper.pdf".into(),
        }
        .into();
        assert_eq!(e.to_string(), "'paper.pdf' is empty (0 bytes)");
        assert_eq!(e.kind(), FailureKind::Extraction);
    }

    #[test]
    fn upstream_kind() {
        let e: ResearchError = CompletionError::Auth("invalid key".into()).into();
        assert_eq!(e.kind(), FailureKind::Upstream);
        assert!(e.to_string().contains("invalid key"));
    }

    #[test]
    fn only_rate_limited_is_rate_limited() {
        assert!(CompletionError::RateLimited("x".into()).is_rate_limited());
        assert!(!CompletionError::Network("x".into()).is_rate_limited());
        assert!(!CompletionError::Other("x".into()).is_rate_limited());
    }

    #[test]
    fn paper_error_display() {
        let e = PaperError::RateLimited {
            index: 2,
            name: "b.pdf".into(),
            attempts: 5,
        };
        let msg = e.to_string();
        assert!(msg.contains("Paper 2"));
        assert!(msg.contains("b.pdf"));
    }
}
