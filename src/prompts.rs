//! Prompt templates for paper summaries and literature reviews.
//!
//! Every prompt is built here by pure functions so tests can inspect the
//! exact bytes sent to the model without a network call.
//!
//! Paper text is cut to the first [`EXCERPT_CHARS`] characters before it is
//! embedded. The cut is silent: no warning is raised when a paper is longer.

/// Number of characters of extracted paper text embedded in a summary prompt.
pub const EXCERPT_CHARS: usize = 2000;

/// Role line that opens every summary prompt.
pub const ASSISTANT_ROLE: &str = "You are an academic assistant.";

/// The six-category rubric every paper summary follows.
pub const SUMMARY_RUBRIC: &str = "\
Summarize the following research paper into these categories:
1. Context
2. Research Question and Findings
3. Theme of Research (Human vs. AI, Human + AI Collaboration)
4. Method (Conceptual, Modeling, Empirical Study)
5. Contribution (theoretical, managerial, methodological)
6. Future Potential and Limitations";

/// Closing instruction of a literature-review prompt.
pub const REVIEW_INSTRUCTION: &str =
    "Synthesize the context, findings, and contributions into a cohesive review.";

/// First [`EXCERPT_CHARS`] characters of `text`, cut on a char boundary.
pub fn excerpt(text: &str) -> &str {
    match text.char_indices().nth(EXCERPT_CHARS) {
        Some((byte_idx, _)) => &text[..byte_idx],
        None => text,
    }
}

/// Build the prompt asking for a six-category summary of one paper.
///
/// `title_and_author` is a free-form citation label such as
/// `"Gnewuch et al., 2023"`; the literature-review flow passes `None`.
pub fn summary_prompt(text: &str, title_and_author: Option<&str>) -> String {
    let mut prompt = String::with_capacity(SUMMARY_RUBRIC.len() + EXCERPT_CHARS + 128);
    prompt.push_str(ASSISTANT_ROLE);
    prompt.push(' ');
    prompt.push_str(SUMMARY_RUBRIC);
    prompt.push_str("\n\n");
    if let Some(label) = title_and_author {
        prompt.push_str("Title and Author: ");
        prompt.push_str(label);
        prompt.push('\n');
    }
    prompt.push_str("Text: ");
    prompt.push_str(excerpt(text));
    prompt
}

/// Build the prompt asking for a literature review over prior summaries.
///
/// Summaries are labelled `Paper 1:`, `Paper 2:`, … in slice order.
pub fn review_prompt<S: AsRef<str>>(theme: &str, summaries: &[S]) -> String {
    let mut prompt = format!(
        "Based on the following summaries, write a literature review on \"{}\":\n",
        theme
    );
    for (i, summary) in summaries.iter().enumerate() {
        prompt.push_str(&format!("\nPaper {}: {}\n", i + 1, summary.as_ref()));
    }
    prompt.push('\n');
    prompt.push_str(REVIEW_INSTRUCTION);
    prompt
}
