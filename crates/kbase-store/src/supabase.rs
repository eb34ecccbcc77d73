//! Supabase-backed store: PostgREST for `files`/`documents`, Storage for blobs.

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response};
use serde_json::json;
use tracing::debug;

use crate::traits::{BlobStore, RecordStore};
use crate::types::{id_value, ChunkRecord, FileRecord, FileUpdate, RetrievedChunk};
use kbase_core::{Error, Result, StoreSettings};

const FILES_TABLE: &str = "files";
const CHUNKS_TABLE: &str = "documents";
const MATCH_RPC: &str = "match_documents";

/// Record + blob store over the Supabase HTTP APIs.
pub struct SupabaseStore {
    client: Client,
    base_url: String,
    key: String,
    bucket: String,
}

impl SupabaseStore {
    pub fn new(client: Client, settings: &StoreSettings) -> Self {
        Self {
            client,
            base_url: settings.url.trim_end_matches('/').to_string(),
            key: settings.key.clone(),
            bucket: settings.bucket.clone(),
        }
    }

    fn rest_url(&self, path: &str) -> String {
        format!("{}/rest/v1/{}", self.base_url, path)
    }

    fn authorized(&self, request: RequestBuilder) -> RequestBuilder {
        request
            .header("apikey", &self.key)
            .header("Authorization", format!("Bearer {}", self.key))
    }

    async fn send(&self, request: RequestBuilder, what: &str) -> Result<Response> {
        let response = self
            .authorized(request)
            .send()
            .await
            .map_err(|e| Error::Store(format!("{} request failed: {}", what, e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Store(format!("{} failed ({}): {}", what, status, body)));
        }
        Ok(response)
    }
}

/// PostgREST equality filter value.
fn eq(value: &str) -> String {
    format!("eq.{}", value)
}

/// PATCH body for the `files` row: only the fields the update sets.
fn file_patch_body(update: &FileUpdate) -> Result<serde_json::Value> {
    Ok(serde_json::to_value(update)?)
}

/// Arguments of the `match_documents` RPC.
fn match_params(
    query_vector: &[f32],
    user_id: &str,
    limit: usize,
    threshold: f64,
) -> serde_json::Value {
    json!({
        "query_embedding": query_vector,
        "match_threshold": threshold,
        "match_count": limit,
        "filter": { "user_id": id_value(user_id) },
    })
}

#[async_trait]
impl RecordStore for SupabaseStore {
    async fn update_file(&self, file_id: &str, update: &FileUpdate) -> Result<()> {
        let request = self
            .client
            .patch(self.rest_url(FILES_TABLE))
            .query(&[("id", eq(file_id))])
            .json(&file_patch_body(update)?);
        self.send(request, "update file").await?;
        debug!("Updated file {}: {:?}", file_id, update);
        Ok(())
    }

    async fn get_file(&self, file_id: &str) -> Result<Option<FileRecord>> {
        let request = self
            .client
            .get(self.rest_url(FILES_TABLE))
            .query(&[("select", "*".to_string()), ("id", eq(file_id))]);
        let rows: Vec<FileRecord> = self
            .send(request, "get file")
            .await?
            .json()
            .await
            .map_err(|e| Error::Store(format!("Invalid file row: {}", e)))?;
        Ok(rows.into_iter().next())
    }

    async fn pending_files(&self, limit: usize) -> Result<Vec<FileRecord>> {
        let request = self.client.get(self.rest_url(FILES_TABLE)).query(&[
            ("select", "*".to_string()),
            ("status", eq("pending")),
            ("order", "created_at.asc".to_string()),
            ("limit", limit.to_string()),
        ]);
        self.send(request, "list pending files")
            .await?
            .json()
            .await
            .map_err(|e| Error::Store(format!("Invalid file rows: {}", e)))
    }

    async fn delete_chunks(&self, file_id: &str) -> Result<()> {
        let request = self
            .client
            .delete(self.rest_url(CHUNKS_TABLE))
            .query(&[("file_id", eq(file_id))]);
        self.send(request, "delete chunks").await?;
        Ok(())
    }

    async fn insert_chunks(&self, records: &[ChunkRecord]) -> Result<()> {
        if records.is_empty() {
            return Ok(());
        }
        let request = self
            .client
            .post(self.rest_url(CHUNKS_TABLE))
            .header("Prefer", "return=minimal")
            .json(records);
        self.send(request, "insert chunks").await?;
        Ok(())
    }

    async fn nearest_neighbors(
        &self,
        query_vector: &[f32],
        user_id: &str,
        limit: usize,
        threshold: f64,
    ) -> Result<Vec<RetrievedChunk>> {
        let params = match_params(query_vector, user_id, limit, threshold);
        let request = self
            .client
            .post(self.rest_url(&format!("rpc/{}", MATCH_RPC)))
            .json(&params);
        let rows: Option<Vec<RetrievedChunk>> = self
            .send(request, "match documents")
            .await?
            .json()
            .await
            .map_err(|e| Error::Store(format!("Invalid match rows: {}", e)))?;
        Ok(rows.unwrap_or_default())
    }
}

#[async_trait]
impl BlobStore for SupabaseStore {
    async fn download(&self, storage_path: &str) -> Result<Vec<u8>> {
        let url = format!(
            "{}/storage/v1/object/{}/{}",
            self.base_url,
            self.bucket,
            storage_path.trim_start_matches('/')
        );
        let bytes = self
            .send(self.client.get(url), "download blob")
            .await?
            .bytes()
            .await
            .map_err(|e| Error::Store(format!("Blob read failed: {}", e)))?;
        debug!("Downloaded {} ({} bytes)", storage_path, bytes.len());
        Ok(bytes.to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> SupabaseStore {
        SupabaseStore::new(
            Client::new(),
            &StoreSettings {
                url: "https://example.supabase.co/".into(),
                key: "service-key".into(),
                bucket: "documents".into(),
            },
        )
    }

    #[test]
    fn test_rest_url() {
        let store = store();
        assert_eq!(
            store.rest_url("files"),
            "https://example.supabase.co/rest/v1/files"
        );
        assert_eq!(
            store.rest_url("rpc/match_documents"),
            "https://example.supabase.co/rest/v1/rpc/match_documents"
        );
    }

    #[test]
    fn test_match_filter_uses_numeric_user_id() {
        assert_eq!(id_value("42"), json!(42));
        assert_eq!(id_value("a1b2"), json!("a1b2"));
    }

    #[test]
    fn test_match_params_body() {
        let params = match_params(&[0.5, -1.0], "7", 5, 0.1);
        assert_eq!(
            params,
            json!({
                "query_embedding": [0.5, -1.0],
                "match_threshold": 0.1,
                "match_count": 5,
                "filter": { "user_id": 7 },
            })
        );

        let params = match_params(&[1.0], "user-a", 3, 0.25);
        assert_eq!(params["filter"]["user_id"], json!("user-a"));
    }

    #[test]
    fn test_file_patch_bodies() {
        let at = chrono::DateTime::parse_from_rfc3339("2024-05-01T12:00:00Z")
            .unwrap()
            .with_timezone(&chrono::Utc);

        assert_eq!(
            file_patch_body(&FileUpdate::processing()).unwrap(),
            json!({ "status": "processing", "progress": 0 })
        );
        assert_eq!(
            file_patch_body(&FileUpdate::progress(40)).unwrap(),
            json!({ "progress": 40 })
        );
        assert_eq!(
            file_patch_body(&FileUpdate::completed(at)).unwrap(),
            json!({
                "status": "completed",
                "progress": 100,
                "updated_at": "2024-05-01T12:00:00Z",
            })
        );
        assert_eq!(
            file_patch_body(&FileUpdate::failed("File 9 not found", at)).unwrap(),
            json!({
                "status": "failed",
                "error_message": "File 9 not found",
                "updated_at": "2024-05-01T12:00:00Z",
            })
        );
    }

    #[test]
    fn test_eq_filter() {
        assert_eq!(eq("abc"), "eq.abc");
    }
}
