//! Pipeline stages shared by both workflows.
//!
//! ```text
//! input ──▶ extract ──▶ (prompts) ──▶ llm
//! (path/URL)  (pdfium)                 (retry/backoff)
//! ```
//!
//! 1. [`input`]: load a path or URL into an in-memory [`input::Document`]
//! 2. [`extract`]: page-ordered text via pdfium; runs in `spawn_blocking`
//! 3. [`llm`]: completion requests with exponential backoff on rate
//!    limits; the only stage that talks to the model

pub mod extract;
pub mod input;
pub mod llm;
