//! # Utilities Module
//!
//! ## Purpose
//! Small shared helpers: performance timing for request handlers, text
//! truncation for snippet fields, and request validation.

use std::time::Instant;

/// Performance timer for measuring operation duration
pub struct Timer {
    start: Instant,
    name: String,
}

/// Text processing utilities
pub struct TextUtils;

/// Validation utilities
pub struct ValidationUtils;

impl Timer {
    /// Start a new timer with a name
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            start: Instant::now(),
            name: name.into(),
        }
    }

    /// Get elapsed time in milliseconds
    pub fn elapsed_ms(&self) -> u64 {
        self.start.elapsed().as_millis() as u64
    }

    /// Stop timer and log duration
    pub fn stop(self) -> u64 {
        let elapsed = self.elapsed_ms();
        tracing::debug!("Timer '{}' completed in {}ms", self.name, elapsed);
        elapsed
    }
}

impl TextUtils {
    /// Truncate text to at most `max_length` bytes with an ellipsis,
    /// respecting char boundaries so snippets with non-ASCII text never
    /// split a codepoint
    pub fn truncate(text: &str, max_length: usize) -> String {
        if text.len() <= max_length {
            return text.to_string();
        }
        let budget = max_length.saturating_sub(3);
        let cut = text
            .char_indices()
            .map(|(i, _)| i)
            .take_while(|&i| i <= budget)
            .last()
            .unwrap_or(0);
        format!("{}...", &text[..cut])
    }
}

impl ValidationUtils {
    /// Validate a topic (industry) string from a request
    pub fn is_valid_topic(topic: &str, min_length: usize, max_length: usize) -> bool {
        let trimmed = topic.trim();
        !trimmed.is_empty() && trimmed.len() >= min_length && trimmed.len() <= max_length
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_text_truncate() {
        assert_eq!(TextUtils::truncate("Hello world", 20), "Hello world");
        assert_eq!(
            TextUtils::truncate("This is a very long text", 10),
            "This is..."
        );
    }

    #[test]
    fn truncate_respects_char_boundaries() {
        let text = "café résumé naïveté voilà encore";
        let truncated = TextUtils::truncate(text, 12);
        assert!(truncated.ends_with("..."));
        assert!(truncated.len() <= 15);
    }

    #[test]
    fn test_topic_validation() {
        assert!(ValidationUtils::is_valid_topic("fintech", 2, 100));
        assert!(!ValidationUtils::is_valid_topic("", 2, 100));
        assert!(!ValidationUtils::is_valid_topic("a", 2, 100));
    }
}
