//! kbase Retrieve: similarity search for a user's query.

pub mod retriever;

pub use retriever::{Retriever, DEFAULT_LIMIT, DEFAULT_THRESHOLD};
