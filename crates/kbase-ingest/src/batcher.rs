//! Batched embedding requests.

use std::sync::Arc;

use tracing::debug;

use kbase_core::{Error, Result};
use kbase_infer::{normalize_newlines, EmbeddingProvider};

/// Chunks embedded (and persisted) per request.
pub const EMBED_BATCH_SIZE: usize = 20;

/// Sends chunk texts to the embedding provider in bounded groups.
#[derive(Clone)]
pub struct EmbeddingBatcher {
    provider: Arc<dyn EmbeddingProvider>,
    batch_size: usize,
}

impl EmbeddingBatcher {
    pub fn new(provider: Arc<dyn EmbeddingProvider>) -> Self {
        Self::with_batch_size(provider, EMBED_BATCH_SIZE)
    }

    pub fn with_batch_size(provider: Arc<dyn EmbeddingProvider>, batch_size: usize) -> Self {
        Self {
            provider,
            batch_size: batch_size.max(1),
        }
    }

    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    /// Embed `texts`, one vector per text in input order.
    ///
    /// Newlines are replaced by spaces before submission. Inputs longer than
    /// the batch size go out as several consecutive requests.
    pub async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let mut vectors = Vec::with_capacity(texts.len());

        for group in texts.chunks(self.batch_size) {
            let normalized: Vec<String> = group.iter().map(|t| normalize_newlines(t)).collect();
            let embedded = self.provider.embed_many(&normalized).await?;
            if embedded.len() != group.len() {
                return Err(Error::EmbeddingProvider(format!(
                    "Expected {} embeddings, got {}",
                    group.len(),
                    embedded.len()
                )));
            }
            vectors.extend(embedded);
        }

        debug!(
            "Embedded {} texts with {}",
            texts.len(),
            self.provider.model()
        );
        Ok(vectors)
    }
}
