//! Shared application state.

use std::sync::Arc;

use kbase_infer::EmbeddingProvider;
use kbase_ingest::Ingester;
use kbase_retrieve::Retriever;
use kbase_store::{BlobStore, RecordStore};

use crate::indexing::IndexingQueue;

/// Shared application state accessible from all route handlers.
pub struct AppState {
    pub records: Arc<dyn RecordStore>,
    pub ingester: Ingester,
    pub retriever: Retriever,
    pub queue: IndexingQueue,
}

impl AppState {
    pub fn new(
        records: Arc<dyn RecordStore>,
        blobs: Arc<dyn BlobStore>,
        embedder: Arc<dyn EmbeddingProvider>,
    ) -> Self {
        Self {
            ingester: Ingester::new(records.clone(), blobs, embedder.clone()),
            retriever: Retriever::new(records.clone(), embedder),
            records,
            queue: IndexingQueue::new(),
        }
    }
}
