//! kbase Store: file/chunk record store and blob store contracts.
//!
//! `SupabaseStore` talks to PostgREST + Storage over HTTP.
//! `MemoryStore` keeps everything in process and is used as a test double.

pub mod memory;
pub mod supabase;
pub mod traits;
pub mod types;

pub use memory::MemoryStore;
pub use supabase::SupabaseStore;
pub use traits::{BlobStore, RecordStore};
pub use types::*;
