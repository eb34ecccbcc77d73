//! Store contracts the ingestion and retrieval paths depend on.

use async_trait::async_trait;
use kbase_core::Result;

use crate::types::{ChunkRecord, FileRecord, FileUpdate, RetrievedChunk};

/// File and chunk record operations.
///
/// Implementations:
/// - `SupabaseStore`: PostgREST tables + `match_documents` RPC
/// - `MemoryStore`: in-process maps, for tests
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Apply a partial update to the file record.
    async fn update_file(&self, file_id: &str, update: &FileUpdate) -> Result<()>;

    /// Fetch a file record. `Ok(None)` when no record has this id.
    async fn get_file(&self, file_id: &str) -> Result<Option<FileRecord>>;

    /// Oldest `pending` files first, at most `limit`.
    async fn pending_files(&self, limit: usize) -> Result<Vec<FileRecord>>;

    /// Delete every chunk record owned by the file.
    async fn delete_chunks(&self, file_id: &str) -> Result<()>;

    /// Insert chunk records in one call.
    async fn insert_chunks(&self, records: &[ChunkRecord]) -> Result<()>;

    /// Chunks owned by `user_id` ranked by similarity to `query_vector`,
    /// keeping only scores above `threshold`.
    async fn nearest_neighbors(
        &self,
        query_vector: &[f32],
        user_id: &str,
        limit: usize,
        threshold: f64,
    ) -> Result<Vec<RetrievedChunk>>;
}

/// Raw file blob access.
#[async_trait]
pub trait BlobStore: Send + Sync {
    async fn download(&self, storage_path: &str) -> Result<Vec<u8>>;
}
