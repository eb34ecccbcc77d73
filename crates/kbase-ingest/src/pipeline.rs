//! Ingestion orchestration: file record → blob → text → chunks → vectors → rows.
//!
//! Status is written back to the file record as the run advances:
//! `processing` at 0%, progress after every persisted batch, then either
//! `completed` at 100% or `failed` with the error message. Batches persisted
//! before a failure are left in place.

use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, error, info};

use crate::batcher::EmbeddingBatcher;
use crate::chunking::Chunker;
use crate::extract::extract_text;
use kbase_core::{Error, Result};
use kbase_infer::EmbeddingProvider;
use kbase_store::{BlobStore, ChunkMetadata, ChunkRecord, FileUpdate, RecordStore};

/// Result of a successful ingestion run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IngestOutcome {
    pub file_id: String,
    pub chunks: usize,
}

/// Runs one file through the pipeline.
#[derive(Clone)]
pub struct Ingester {
    records: Arc<dyn RecordStore>,
    blobs: Arc<dyn BlobStore>,
    batcher: EmbeddingBatcher,
    chunker: Chunker,
}

impl Ingester {
    pub fn new(
        records: Arc<dyn RecordStore>,
        blobs: Arc<dyn BlobStore>,
        provider: Arc<dyn EmbeddingProvider>,
    ) -> Self {
        Self::with_parts(records, blobs, EmbeddingBatcher::new(provider), Chunker::default())
    }

    pub fn with_parts(
        records: Arc<dyn RecordStore>,
        blobs: Arc<dyn BlobStore>,
        batcher: EmbeddingBatcher,
        chunker: Chunker,
    ) -> Self {
        Self {
            records,
            blobs,
            batcher,
            chunker,
        }
    }

    /// Ingest a file by id, recording the outcome on its file record.
    ///
    /// If the initial `processing` write fails, the error is returned as is.
    /// Any later error marks the file `failed` with the error's message and is
    /// then returned.
    pub async fn ingest_file(&self, file_id: &str) -> Result<IngestOutcome> {
        self.records
            .update_file(file_id, &FileUpdate::processing())
            .await?;
        info!("Processing file {}", file_id);

        match self.run(file_id).await {
            Ok(outcome) => {
                info!(
                    "Ingested file {} with {} chunks",
                    outcome.file_id, outcome.chunks
                );
                Ok(outcome)
            }
            Err(e) => {
                error!("Ingestion of file {} failed: {}", file_id, e);
                let update = FileUpdate::failed(e.to_string(), Utc::now());
                if let Err(write_err) = self.records.update_file(file_id, &update).await {
                    error!(
                        "Could not mark file {} as failed: {}",
                        file_id, write_err
                    );
                }
                Err(e)
            }
        }
    }

    async fn run(&self, file_id: &str) -> Result<IngestOutcome> {
        let file = self
            .records
            .get_file(file_id)
            .await?
            .ok_or_else(|| Error::NotFound(file_id.to_string()))?;

        let bytes = self.blobs.download(&file.storage_path).await?;
        let extracted = extract_text(&bytes, &file.file_type, &file.storage_path)?;
        let chunks = self.chunker.chunk(&extracted.text, extracted.is_markdown)?;
        info!(
            "Split {} ({}) into {} chunks",
            file.filename,
            file_id,
            chunks.len()
        );

        // Re-ingestion replaces whatever an earlier run stored.
        self.records.delete_chunks(file_id).await?;

        let metadata = ChunkMetadata::for_file(&file);
        let total = chunks.len();
        let mut processed = 0usize;

        for batch in chunks.chunks(self.batcher.batch_size()) {
            let vectors = self.batcher.embed_batch(batch).await?;
            let rows: Vec<ChunkRecord> = batch
                .iter()
                .zip(vectors)
                .map(|(content, embedding)| ChunkRecord {
                    content: content.clone(),
                    metadata: metadata.clone(),
                    file_id: file.id.clone(),
                    embedding,
                })
                .collect();
            self.records.insert_chunks(&rows).await?;

            processed += batch.len();
            let progress = progress_percent(processed, total);
            self.records
                .update_file(file_id, &FileUpdate::progress(progress))
                .await?;
            debug!(
                "Stored {}/{} chunks for file {} ({}%)",
                processed, total, file_id, progress
            );
        }

        self.records
            .update_file(file_id, &FileUpdate::completed(Utc::now()))
            .await?;

        Ok(IngestOutcome {
            file_id: file.id,
            chunks: total,
        })
    }
}

/// Integer percentage, rounded down.
fn progress_percent(processed: usize, total: usize) -> u8 {
    if total == 0 {
        return 100;
    }
    (processed.min(total) * 100 / total) as u8
}
