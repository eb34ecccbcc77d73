//! kbase Server: HTTP surface over the ingestion pipeline and retrieval.

pub mod indexing;
pub mod routes;
pub mod state;

pub use indexing::{start_indexing_worker, start_pending_poller, IndexingQueue};
pub use routes::build_router;
pub use state::AppState;
