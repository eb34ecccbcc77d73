//! kbase Core: error taxonomy and service configuration.

pub mod config;
pub mod error;

pub use config::{EmbeddingSettings, KbaseConfig, StoreSettings};
pub use error::{Error, Result};
