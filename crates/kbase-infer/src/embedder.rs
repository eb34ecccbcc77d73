//! Embedding provider trait.
//!
//! Providers receive text exactly as given; callers normalize newlines with
//! [`normalize_newlines`] before submission.

use async_trait::async_trait;
use kbase_core::Result;

#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Embed a single text.
    async fn embed(&self, text: &str) -> Result<Vec<f32>>;

    /// Embed many texts. Output is in input order and of the same length.
    async fn embed_many(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;

    /// Model name, for logging.
    fn model(&self) -> &str;
}

/// Replace every `\n` with a single space.
pub fn normalize_newlines(text: &str) -> String {
    text.replace('\n', " ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_newlines() {
        assert_eq!(normalize_newlines("a\nb\n\nc"), "a b  c");
        assert_eq!(normalize_newlines("plain"), "plain");
    }
}
