//! OpenAI-compatible embeddings over HTTP.
//!
//! `POST {base_url}/embeddings` with `{"model", "input": [...]}`. Works with
//! OpenAI and with providers that mirror its API (Zhipu, Groq, vLLM, ...).

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;
use tracing::debug;

use crate::embedder::EmbeddingProvider;
use kbase_core::{EmbeddingSettings, Error, Result};

#[derive(Debug, Deserialize)]
struct EmbeddingsResponse {
    data: Vec<EmbeddingItem>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingItem {
    embedding: Vec<f32>,
    #[serde(default)]
    index: Option<usize>,
}

pub struct OpenAiEmbedder {
    client: Client,
    url: String,
    api_key: String,
    model: String,
}

impl OpenAiEmbedder {
    pub fn new(client: Client, settings: &EmbeddingSettings) -> Self {
        Self {
            client,
            url: format!("{}/embeddings", settings.base_url.trim_end_matches('/')),
            api_key: settings.api_key.clone(),
            model: settings.model.clone(),
        }
    }

    async fn request(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let body = json!({
            "model": self.model,
            "input": texts,
        });

        debug!("Embedding {} texts with {}", texts.len(), self.model);

        let response = self
            .client
            .post(&self.url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(&body)
            .send()
            .await
            .map_err(|e| Error::EmbeddingProvider(format!("Request failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(Error::EmbeddingProvider(format!(
                "API error {}: {}",
                status, body
            )));
        }

        let parsed: EmbeddingsResponse = response
            .json()
            .await
            .map_err(|e| Error::EmbeddingProvider(format!("Invalid response: {}", e)))?;

        into_ordered_vectors(parsed, texts.len())
    }
}

/// Order vectors by their `index` field and check the count.
fn into_ordered_vectors(response: EmbeddingsResponse, expected: usize) -> Result<Vec<Vec<f32>>> {
    let mut items = response.data;
    if items.len() != expected {
        return Err(Error::EmbeddingProvider(format!(
            "Expected {} embeddings, got {}",
            expected,
            items.len()
        )));
    }
    if items.iter().all(|item| item.index.is_some()) {
        items.sort_by_key(|item| item.index);
    }
    Ok(items.into_iter().map(|item| item.embedding).collect())
}

#[async_trait]
impl EmbeddingProvider for OpenAiEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let mut vectors = self.request(&[text.to_string()]).await?;
        vectors
            .pop()
            .ok_or_else(|| Error::EmbeddingProvider("Empty embedding response".into()))
    }

    async fn embed_many(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        self.request(texts).await
    }

    fn model(&self) -> &str {
        &self.model
    }
}
