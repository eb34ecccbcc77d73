//! kbase Infer: embedding provider contract and remote embedder.
//!
//! Provides the `EmbeddingProvider` trait for turning text into vectors.
//! `OpenAiEmbedder` calls any OpenAI-compatible `/embeddings` endpoint.

pub mod embedder;
pub mod openai;

pub use embedder::{normalize_newlines, EmbeddingProvider};
pub use openai::OpenAiEmbedder;

use std::sync::Arc;

use kbase_core::EmbeddingSettings;

/// Create the embedder described by the settings.
pub fn create_embedder(
    client: reqwest::Client,
    settings: &EmbeddingSettings,
) -> Arc<dyn EmbeddingProvider> {
    tracing::info!(
        "Using embedding model {} at {}",
        settings.model,
        settings.base_url
    );
    Arc::new(OpenAiEmbedder::new(client, settings))
}
