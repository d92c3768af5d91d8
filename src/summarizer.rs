//! Condensing a span of dialogue into summary text.

use crate::errors::Error;

/// Turns a long concatenated dialogue into a shorter summary.
pub trait Summarizer: Send + Sync {
    fn summarize(&self, text: &str) -> Result<String, Error>;
}

/// Stand-in summarizer that keeps a leading excerpt of the text.
///
/// Useful when no generative model is wired in; output has the form
/// `Summary of: <first max_chars characters>...`.
#[derive(Debug, Clone)]
pub struct ExcerptSummarizer {
    max_chars: usize,
}

impl ExcerptSummarizer {
    pub fn new(max_chars: usize) -> Self {
        Self { max_chars }
    }
}

impl Default for ExcerptSummarizer {
    fn default() -> Self {
        Self::new(50)
    }
}

impl Summarizer for ExcerptSummarizer {
    fn summarize(&self, text: &str) -> Result<String, Error> {
        let excerpt: String = text.chars().take(self.max_chars).collect();
        Ok(format!("Summary of: {}...", excerpt))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_excerpt_truncates() {
        let s = ExcerptSummarizer::new(5).summarize("hello world").unwrap();
        assert_eq!(s, "Summary of: hello...");
    }

    #[test]
    fn test_excerpt_short_text() {
        let s = ExcerptSummarizer::default().summarize("hi").unwrap();
        assert_eq!(s, "Summary of: hi...");
    }

    #[test]
    fn test_excerpt_respects_char_boundaries() {
        let s = ExcerptSummarizer::new(2).summarize("héllo").unwrap();
        assert_eq!(s, "Summary of: hé...");
    }
}
