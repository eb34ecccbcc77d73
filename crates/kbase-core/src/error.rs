//! Error types for kbase.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("File {0} not found")]
    NotFound(String),

    #[error("Decode error: {0}")]
    Decode(String),

    #[error("File content is empty")]
    EmptyContent,

    #[error("Chunking error: {0}")]
    Chunking(String),

    #[error("Embedding provider error: {0}")]
    EmbeddingProvider(String),

    #[error("Store error: {0}")]
    Store(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_found_mentions_file_id() {
        let err = Error::NotFound("f-42".into());
        assert!(err.to_string().contains("f-42"));
    }

    #[test]
    fn test_empty_content_message() {
        assert_eq!(Error::EmptyContent.to_string(), "File content is empty");
    }
}
