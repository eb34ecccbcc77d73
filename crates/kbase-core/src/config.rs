//! Service configuration, read from the environment.

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

pub const DEFAULT_PORT: u16 = 8000;
pub const DEFAULT_BUCKET: &str = "documents";
pub const DEFAULT_EMBEDDING_BASE_URL: &str = "https://api.openai.com/v1";
pub const DEFAULT_EMBEDDING_MODEL: &str = "embedding-2";

/// Connection settings for the record/blob store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreSettings {
    /// Base URL of the store (e.g., `https://xyz.supabase.co`).
    pub url: String,
    /// Service key, sent as both `apikey` and bearer token.
    #[serde(skip_serializing)]
    pub key: String,
    /// Storage bucket that holds uploaded blobs.
    pub bucket: String,
}

/// Settings for the OpenAI-compatible embedding endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingSettings {
    #[serde(skip_serializing)]
    pub api_key: String,
    pub base_url: String,
    pub model: String,
}

/// Top-level kbase configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KbaseConfig {
    /// HTTP server port.
    pub port: u16,
    pub store: StoreSettings,
    pub embedding: EmbeddingSettings,
    /// Seconds between sweeps for `pending` files. 0 disables the sweep.
    pub poll_interval_secs: u64,
}

impl KbaseConfig {
    /// Create configuration from process environment variables.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Create configuration from an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let required = |key: &str| -> Result<String> {
            lookup(key)
                .filter(|v| !v.trim().is_empty())
                .ok_or_else(|| Error::Config(format!("{} is not set", key)))
        };

        let port = match lookup("PORT") {
            Some(p) => p
                .parse()
                .map_err(|_| Error::Config(format!("PORT is not a valid port: {}", p)))?,
            None => DEFAULT_PORT,
        };

        let poll_interval_secs = match lookup("INGEST_POLL_INTERVAL_SECS") {
            Some(s) => s.parse().map_err(|_| {
                Error::Config(format!("INGEST_POLL_INTERVAL_SECS is not a number: {}", s))
            })?,
            None => 0,
        };

        let store = StoreSettings {
            url: required("SUPABASE_URL")?.trim_end_matches('/').to_string(),
            key: required("SUPABASE_KEY")?,
            bucket: lookup("STORAGE_BUCKET").unwrap_or_else(|| DEFAULT_BUCKET.into()),
        };

        let embedding = EmbeddingSettings {
            api_key: required("EMBEDDING_API_KEY")?,
            base_url: lookup("EMBEDDING_BASE_URL")
                .unwrap_or_else(|| DEFAULT_EMBEDDING_BASE_URL.into())
                .trim_end_matches('/')
                .to_string(),
            model: lookup("EMBEDDING_MODEL").unwrap_or_else(|| DEFAULT_EMBEDDING_MODEL.into()),
        };

        Ok(Self {
            port,
            store,
            embedding,
            poll_interval_secs,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key: &str| map.get(key).cloned()
    }

    const REQUIRED: &[(&str, &str)] = &[
        ("SUPABASE_URL", "https://example.supabase.co/"),
        ("SUPABASE_KEY", "service-key"),
        ("EMBEDDING_API_KEY", "sk-test"),
    ];

    #[test]
    fn test_defaults_applied() {
        let config = KbaseConfig::from_lookup(lookup_from(REQUIRED)).unwrap();
        assert_eq!(config.port, DEFAULT_PORT);
        assert_eq!(config.store.url, "https://example.supabase.co");
        assert_eq!(config.store.bucket, "documents");
        assert_eq!(config.embedding.base_url, DEFAULT_EMBEDDING_BASE_URL);
        assert_eq!(config.embedding.model, "embedding-2");
        assert_eq!(config.poll_interval_secs, 0);
    }

    #[test]
    fn test_overrides() {
        let mut pairs = REQUIRED.to_vec();
        pairs.extend_from_slice(&[
            ("PORT", "9100"),
            ("STORAGE_BUCKET", "uploads"),
            ("EMBEDDING_BASE_URL", "https://open.bigmodel.cn/api/paas/v4/"),
            ("EMBEDDING_MODEL", "embedding-3"),
            ("INGEST_POLL_INTERVAL_SECS", "5"),
        ]);
        let config = KbaseConfig::from_lookup(lookup_from(&pairs)).unwrap();
        assert_eq!(config.port, 9100);
        assert_eq!(config.store.bucket, "uploads");
        assert_eq!(config.embedding.base_url, "https://open.bigmodel.cn/api/paas/v4");
        assert_eq!(config.embedding.model, "embedding-3");
        assert_eq!(config.poll_interval_secs, 5);
    }

    #[test]
    fn test_missing_required_key() {
        let err = KbaseConfig::from_lookup(lookup_from(&REQUIRED[..2])).unwrap_err();
        assert!(matches!(err, Error::Config(ref m) if m.contains("EMBEDDING_API_KEY")));
    }

    #[test]
    fn test_invalid_port() {
        let mut pairs = REQUIRED.to_vec();
        pairs.push(("PORT", "not-a-port"));
        assert!(KbaseConfig::from_lookup(lookup_from(&pairs)).is_err());
    }
}
