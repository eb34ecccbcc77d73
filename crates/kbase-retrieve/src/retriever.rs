//! Query → embedding → nearest stored chunks for one user.

use std::sync::Arc;

use tracing::debug;

use kbase_core::Result;
use kbase_infer::{normalize_newlines, EmbeddingProvider};
use kbase_store::{RecordStore, RetrievedChunk};

pub const DEFAULT_LIMIT: usize = 5;
pub const DEFAULT_THRESHOLD: f64 = 0.1;

pub struct Retriever {
    records: Arc<dyn RecordStore>,
    embedder: Arc<dyn EmbeddingProvider>,
}

impl Retriever {
    pub fn new(records: Arc<dyn RecordStore>, embedder: Arc<dyn EmbeddingProvider>) -> Self {
        Self { records, embedder }
    }

    /// Up to `limit` of the user's chunks scoring above `threshold`, best first.
    /// No match is an empty list, not an error.
    pub async fn retrieve(
        &self,
        query: &str,
        user_id: &str,
        limit: usize,
        threshold: f64,
    ) -> Result<Vec<RetrievedChunk>> {
        let query_vector = self.embedder.embed(&normalize_newlines(query)).await?;
        let hits = self
            .records
            .nearest_neighbors(&query_vector, user_id, limit, threshold)
            .await?;
        debug!(
            "Retrieved {} chunks for user {} (limit {}, threshold {})",
            hits.len(),
            user_id,
            limit,
            threshold
        );
        Ok(hits)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use kbase_core::Error;
    use kbase_store::{ChunkMetadata, ChunkRecord, MemoryStore};
    use parking_lot::Mutex;

    /// Maps text to a fixed 2-d vector by keyword.
    #[derive(Default)]
    struct KeywordEmbedder {
        queries: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl EmbeddingProvider for KeywordEmbedder {
        async fn embed(&self, text: &str) -> Result<Vec<f32>> {
            self.queries.lock().push(text.to_string());
            if text.contains("cat") {
                Ok(vec![1.0, 0.0])
            } else {
                Ok(vec![0.0, 1.0])
            }
        }

        async fn embed_many(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
            let mut out = Vec::with_capacity(texts.len());
            for text in texts {
                out.push(self.embed(text).await?);
            }
            Ok(out)
        }

        fn model(&self) -> &str {
            "keyword"
        }
    }

    struct DownEmbedder;

    #[async_trait]
    impl EmbeddingProvider for DownEmbedder {
        async fn embed(&self, _text: &str) -> Result<Vec<f32>> {
            Err(Error::EmbeddingProvider("connection refused".into()))
        }

        async fn embed_many(&self, _texts: &[String]) -> Result<Vec<Vec<f32>>> {
            Err(Error::EmbeddingProvider("connection refused".into()))
        }

        fn model(&self) -> &str {
            "down"
        }
    }

    fn row(user_id: &str, content: &str, embedding: Vec<f32>) -> ChunkRecord {
        ChunkRecord {
            content: content.into(),
            metadata: ChunkMetadata {
                filename: "pets.txt".into(),
                file_type: "text/plain".into(),
                user_id: user_id.into(),
                source_file_id: "f1".into(),
            },
            file_id: "f1".into(),
            embedding,
        }
    }

    async fn seeded_store() -> Arc<MemoryStore> {
        let store = Arc::new(MemoryStore::new());
        store
            .insert_chunks(&[
                row("1", "cats purr", vec![1.0, 0.0]),
                row("1", "cats and dogs", vec![0.7, 0.7]),
                row("1", "dogs bark", vec![0.0, 1.0]),
                row("2", "someone else's cat", vec![1.0, 0.0]),
            ])
            .await
            .unwrap();
        store
    }

    #[tokio::test]
    async fn test_ranked_and_scoped_to_user() {
        let store = seeded_store().await;
        let retriever = Retriever::new(store, Arc::new(KeywordEmbedder::default()));

        let hits = retriever
            .retrieve("tell me about cats", "1", DEFAULT_LIMIT, DEFAULT_THRESHOLD)
            .await
            .unwrap();

        let contents: Vec<&str> = hits.iter().map(|h| h.content.as_str()).collect();
        assert_eq!(contents, vec!["cats purr", "cats and dogs"]);
        assert!(hits[0].score >= hits[1].score);
        assert_eq!(hits[0].metadata["user_id"], serde_json::json!(1));
    }

    #[tokio::test]
    async fn test_limit_applied() {
        let store = seeded_store().await;
        let retriever = Retriever::new(store, Arc::new(KeywordEmbedder::default()));

        let hits = retriever.retrieve("cat", "1", 1, 0.0).await.unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].content, "cats purr");
    }

    #[tokio::test]
    async fn test_no_match_is_empty() {
        let store = seeded_store().await;
        let retriever = Retriever::new(store, Arc::new(KeywordEmbedder::default()));

        let hits = retriever.retrieve("cat", "unknown", 5, 0.1).await.unwrap();
        assert!(hits.is_empty());
    }

    #[tokio::test]
    async fn test_query_newlines_normalized() {
        let store = Arc::new(MemoryStore::new());
        let embedder = Arc::new(KeywordEmbedder::default());
        let retriever = Retriever::new(store, embedder.clone());

        retriever.retrieve("two\nlines", "1", 5, 0.1).await.unwrap();
        assert_eq!(*embedder.queries.lock(), vec!["two lines".to_string()]);
    }

    #[tokio::test]
    async fn test_embedding_failure_propagates() {
        let store = Arc::new(MemoryStore::new());
        let retriever = Retriever::new(store, Arc::new(DownEmbedder));

        let err = retriever.retrieve("cat", "1", 5, 0.1).await.unwrap_err();
        assert!(matches!(err, Error::EmbeddingProvider(_)));
    }
}
