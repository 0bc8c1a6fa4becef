//! Text extraction: pull the text layer of every page via pdfium.
//!
//! ## Why spawn_blocking?
//!
//! `pdfium-render` wraps the pdfium C++ library, which keeps thread-local
//! state and must not run on an async worker thread.
//! [`extract_text_async`] moves the work onto tokio's blocking pool.
//!
//! Pages are concatenated in page order with no separator. A document
//! whose pages carry no text layer (scanned images) yields an empty string.

use crate::error::ExtractionError;
use crate::pipeline::input::Document;
use async_trait::async_trait;
use pdfium_render::prelude::*;
use tracing::{debug, info, warn};

/// Turns a [`Document`] into plain text.
#[async_trait]
pub trait TextExtractor: Send + Sync {
    async fn extract(
        &self,
        document: &Document,
        password: Option<&str>,
    ) -> Result<String, ExtractionError>;
}

/// [`TextExtractor`] backed by pdfium.
#[derive(Debug, Clone, Copy, Default)]
pub struct PdfiumExtractor;

#[async_trait]
impl TextExtractor for PdfiumExtractor {
    async fn extract(
        &self,
        document: &Document,
        password: Option<&str>,
    ) -> Result<String, ExtractionError> {
        extract_text_async(document, password).await
    }
}

/// Extract the text of every page of `document`, in page order.
///
/// Blocking; call [`extract_text_async`] from async code.
pub fn extract_text(document: &Document, password: Option<&str>) -> Result<String, ExtractionError> {
    document.validate()?;

    let pdfium = pdfium_auto::bind_pdfium_silent()
        .map_err(|e| ExtractionError::PdfiumUnavailable(e.to_string()))?;

    let pdf = pdfium
        .load_pdf_from_byte_slice(&document.bytes, password)
        .map_err(|e| classify_load_error(&document.name, password, &e))?;

    let pages = pdf.pages();
    info!("PDF '{}' loaded: {} pages", document.name, pages.len());

    let mut page_texts = Vec::with_capacity(pages.len() as usize);
    for (idx, page) in pages.iter().enumerate() {
        let text = page.text().map_err(|e| ExtractionError::PageTextFailed {
            name: document.name.clone(),
            page: idx + 1,
            detail: format!("{:?}", e),
        })?;
        let content = text.all();
        debug!("Page {}: {} chars", idx + 1, content.chars().count());
        page_texts.push(content);
    }

    let text = join_pages(page_texts);
    if text.trim().is_empty() {
        warn!(
            "'{}' has no extractable text (scanned or image-only pages?)",
            document.name
        );
    }
    Ok(text)
}

/// Async wrapper around [`extract_text`] running on the blocking pool.
pub async fn extract_text_async(
    document: &Document,
    password: Option<&str>,
) -> Result<String, ExtractionError> {
    // Fail before spawning for the cheap cases.
    document.validate()?;

    let doc = document.clone();
    let pwd = password.map(str::to_string);

    tokio::task::spawn_blocking(move || extract_text(&doc, pwd.as_deref()))
        .await
        .map_err(|e| ExtractionError::Internal(format!("Extraction task panicked: {}", e)))?
}

/// Concatenate per-page text in order, with no separator.
pub fn join_pages<I, S>(pages: I) -> String
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    pages.into_iter().fold(String::new(), |mut acc, page| {
        acc.push_str(page.as_ref());
        acc
    })
}

fn classify_load_error(name: &str, password: Option<&str>, err: &PdfiumError) -> ExtractionError {
    let err_str = format!("{:?}", err);
    if err_str.contains("Password") || err_str.contains("password") {
        if password.is_some() {
            ExtractionError::WrongPassword {
                name: name.to_string(),
            }
        } else {
            ExtractionError::PasswordRequired {
                name: name.to_string(),
            }
        }
    } else {
        ExtractionError::CorruptPdf {
            name: name.to_string(),
            detail: err_str,
        }
    }
}
