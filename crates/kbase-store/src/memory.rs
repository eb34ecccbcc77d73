//! In-memory [`RecordStore`] + [`BlobStore`] for tests.
//!
//! Every file update is appended to a log (including updates addressed to
//! unknown ids, which PostgREST also accepts as a no-op) so tests can assert
//! on the exact sequence of status and progress writes.
//! Neighbor search is brute-force cosine similarity.

use std::collections::HashMap;

use async_trait::async_trait;
use parking_lot::Mutex;

use crate::traits::{BlobStore, RecordStore};
use crate::types::{ChunkRecord, FileRecord, FileStatus, FileUpdate, RetrievedChunk};
use kbase_core::{Error, Result};

#[derive(Default)]
struct Inner {
    files: HashMap<String, FileRecord>,
    blobs: HashMap<String, Vec<u8>>,
    chunks: Vec<ChunkRecord>,
    updates: Vec<(String, FileUpdate)>,
    insert_calls: usize,
    fail_inserts_from: Option<usize>,
}

/// In-memory store for tests.
#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn put_file(&self, record: FileRecord) {
        self.inner.lock().files.insert(record.id.clone(), record);
    }

    pub fn put_blob(&self, storage_path: impl Into<String>, bytes: impl Into<Vec<u8>>) {
        self.inner
            .lock()
            .blobs
            .insert(storage_path.into(), bytes.into());
    }

    pub fn file(&self, file_id: &str) -> Option<FileRecord> {
        self.inner.lock().files.get(file_id).cloned()
    }

    /// All chunk records currently stored for the file, in insertion order.
    pub fn chunks_for(&self, file_id: &str) -> Vec<ChunkRecord> {
        self.inner
            .lock()
            .chunks
            .iter()
            .filter(|c| c.file_id == file_id)
            .cloned()
            .collect()
    }

    /// Every update addressed to the file id, in write order.
    pub fn updates_for(&self, file_id: &str) -> Vec<FileUpdate> {
        self.inner
            .lock()
            .updates
            .iter()
            .filter(|(id, _)| id == file_id)
            .map(|(_, u)| u.clone())
            .collect()
    }

    /// Progress values written for the file, in write order.
    pub fn progress_history(&self, file_id: &str) -> Vec<u8> {
        self.updates_for(file_id)
            .into_iter()
            .filter_map(|u| u.progress)
            .collect()
    }

    /// Make `insert_chunks` fail starting with the `n`-th call (0-based).
    pub fn fail_inserts_from(&self, n: usize) {
        self.inner.lock().fail_inserts_from = Some(n);
    }
}

fn cosine_sim(a: &[f32], b: &[f32]) -> f64 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }
    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let mag_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let mag_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if mag_a < f32::EPSILON || mag_b < f32::EPSILON {
        0.0
    } else {
        (dot / (mag_a * mag_b)) as f64
    }
}

#[async_trait]
impl RecordStore for MemoryStore {
    async fn update_file(&self, file_id: &str, update: &FileUpdate) -> Result<()> {
        let mut inner = self.inner.lock();
        inner.updates.push((file_id.to_string(), update.clone()));
        if let Some(record) = inner.files.get_mut(file_id) {
            update.apply_to(record);
        }
        Ok(())
    }

    async fn get_file(&self, file_id: &str) -> Result<Option<FileRecord>> {
        Ok(self.inner.lock().files.get(file_id).cloned())
    }

    async fn pending_files(&self, limit: usize) -> Result<Vec<FileRecord>> {
        let inner = self.inner.lock();
        let mut pending: Vec<FileRecord> = inner
            .files
            .values()
            .filter(|f| f.status == FileStatus::Pending)
            .cloned()
            .collect();
        pending.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
        pending.truncate(limit);
        Ok(pending)
    }

    async fn delete_chunks(&self, file_id: &str) -> Result<()> {
        self.inner.lock().chunks.retain(|c| c.file_id != file_id);
        Ok(())
    }

    async fn insert_chunks(&self, records: &[ChunkRecord]) -> Result<()> {
        let mut inner = self.inner.lock();
        let call = inner.insert_calls;
        inner.insert_calls += 1;
        if inner.fail_inserts_from.is_some_and(|n| call >= n) {
            return Err(Error::Store(format!("insert rejected (call {})", call)));
        }
        inner.chunks.extend_from_slice(records);
        Ok(())
    }

    async fn nearest_neighbors(
        &self,
        query_vector: &[f32],
        user_id: &str,
        limit: usize,
        threshold: f64,
    ) -> Result<Vec<RetrievedChunk>> {
        let inner = self.inner.lock();
        let mut hits: Vec<RetrievedChunk> = inner
            .chunks
            .iter()
            .filter(|c| c.metadata.user_id == user_id)
            .map(|c| RetrievedChunk {
                content: c.content.clone(),
                metadata: serde_json::to_value(&c.metadata).unwrap_or_default(),
                score: cosine_sim(query_vector, &c.embedding),
            })
            .filter(|hit| hit.score > threshold)
            .collect();
        hits.sort_by(|a, b| b.score.total_cmp(&a.score));
        hits.truncate(limit);
        Ok(hits)
    }
}

#[async_trait]
impl BlobStore for MemoryStore {
    async fn download(&self, storage_path: &str) -> Result<Vec<u8>> {
        self.inner
            .lock()
            .blobs
            .get(storage_path)
            .cloned()
            .ok_or_else(|| Error::Store(format!("Object not found: {}", storage_path)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ChunkMetadata;

    fn chunk(file_id: &str, user_id: &str, content: &str, embedding: Vec<f32>) -> ChunkRecord {
        ChunkRecord {
            content: content.into(),
            metadata: ChunkMetadata {
                filename: "f.txt".into(),
                file_type: "text/plain".into(),
                user_id: user_id.into(),
                source_file_id: file_id.into(),
            },
            file_id: file_id.into(),
            embedding,
        }
    }

    #[tokio::test]
    async fn test_delete_only_touches_one_file() {
        let store = MemoryStore::new();
        store
            .insert_chunks(&[
                chunk("a", "u1", "one", vec![1.0, 0.0]),
                chunk("b", "u1", "two", vec![0.0, 1.0]),
            ])
            .await
            .unwrap();
        store.delete_chunks("a").await.unwrap();
        assert!(store.chunks_for("a").is_empty());
        assert_eq!(store.chunks_for("b").len(), 1);
    }

    #[tokio::test]
    async fn test_nearest_neighbors_scoped_and_ranked() {
        let store = MemoryStore::new();
        store
            .insert_chunks(&[
                chunk("a", "u1", "close", vec![1.0, 0.1]),
                chunk("a", "u1", "far", vec![0.0, 1.0]),
                chunk("b", "u2", "other user", vec![1.0, 0.0]),
            ])
            .await
            .unwrap();

        let hits = store
            .nearest_neighbors(&[1.0, 0.0], "u1", 5, 0.1)
            .await
            .unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].content, "close");

        let none = store
            .nearest_neighbors(&[1.0, 0.0], "u3", 5, 0.1)
            .await
            .unwrap();
        assert!(none.is_empty());
    }

    #[tokio::test]
    async fn test_updates_logged_for_unknown_ids() {
        let store = MemoryStore::new();
        store
            .update_file("ghost", &FileUpdate::processing())
            .await
            .unwrap();
        assert_eq!(store.updates_for("ghost").len(), 1);
        assert!(store.file("ghost").is_none());
    }

    #[tokio::test]
    async fn test_missing_blob_is_store_error() {
        let store = MemoryStore::new();
        let err = store.download("nope.pdf").await.unwrap_err();
        assert!(matches!(err, Error::Store(_)));
    }
}
