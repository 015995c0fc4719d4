//! Text-to-summary collaborator.

use async_trait::async_trait;
use std::borrow::Cow;
use std::sync::Arc;

use crate::error::ServiceResult;
use crate::ollama::{self, OllamaClient};

/// Inputs longer than this many characters are cut before being sent
pub const MAX_SUMMARY_INPUT_CHARS: usize = 30_000;

const TRUNCATION_MARKER: &str = "...";

const SUMMARY_SYSTEM_PROMPT: &str = "You are a helpful assistant that creates concise, \
    well-structured summaries. Capture the main ideas, key points and important details. \
    Reply with the summary only.";

/// Produces one summary for a text
#[async_trait]
pub trait Summarizer: Send + Sync {
    async fn summarize(&self, text: &str) -> ServiceResult<String>;
}

/// Summarizer backed by the LLM chat endpoint
pub struct LlmSummarizer {
    client: Arc<OllamaClient>,
}

impl LlmSummarizer {
    pub fn new(client: Arc<OllamaClient>) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Summarizer for LlmSummarizer {
    async fn summarize(&self, text: &str) -> ServiceResult<String> {
        let input = truncate_chars(text, MAX_SUMMARY_INPUT_CHARS);
        if let Cow::Owned(_) = input {
            tracing::debug!(
                original_chars = text.chars().count(),
                "Truncated summarizer input"
            );
        }

        ollama::complete(
            &self.client,
            SUMMARY_SYSTEM_PROMPT,
            format!("Please summarize the following text:\n\n{input}"),
            "summary",
        )
        .await
    }
}

/// Cut `text` to at most `max_chars` characters, marking the cut
pub fn truncate_chars(text: &str, max_chars: usize) -> Cow<'_, str> {
    match text.char_indices().nth(max_chars) {
        None => Cow::Borrowed(text),
        Some((byte_idx, _)) => Cow::Owned(format!("{}{}", &text[..byte_idx], TRUNCATION_MARKER)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_short_text_is_borrowed() {
        assert!(matches!(truncate_chars("short", 10), Cow::Borrowed("short")));
        // Exactly at the limit is not truncated
        assert!(matches!(truncate_chars("12345", 5), Cow::Borrowed(_)));
    }

    #[test]
    fn test_truncation_respects_char_boundaries() {
        let text = "héllo wörld";
        assert_eq!(truncate_chars(text, 4), "héll...");
        assert_eq!(truncate_chars("日本語テキスト", 3), "日本語...");
    }

    #[test]
    fn test_long_input_is_bounded() {
        let text = "a".repeat(MAX_SUMMARY_INPUT_CHARS + 500);
        let truncated = truncate_chars(&text, MAX_SUMMARY_INPUT_CHARS);
        assert_eq!(
            truncated.chars().count(),
            MAX_SUMMARY_INPUT_CHARS + TRUNCATION_MARKER.len()
        );
    }
}
