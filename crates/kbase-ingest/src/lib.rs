//! kbase Ingest: file → text → chunks → embeddings → stored rows.

pub mod batcher;
pub mod chunking;
pub mod extract;
pub mod pipeline;

pub use batcher::{EmbeddingBatcher, EMBED_BATCH_SIZE};
pub use chunking::{
    split_markdown_sections, Chunker, MarkdownSection, RecursiveChunker, CHUNK_OVERLAP, CHUNK_SIZE,
};
pub use extract::{extract_text, ExtractedText, FileType};
pub use pipeline::{IngestOutcome, Ingester};
