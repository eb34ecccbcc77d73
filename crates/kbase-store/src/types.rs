//! Data types for file records, chunk records, and retrieval results.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Lifecycle status of an uploaded file.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum FileStatus {
    Pending,
    Processing,
    Completed,
    Failed,
}

impl FileStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Processing => "processing",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }

    /// Whether the status ends an ingestion run.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }
}

impl std::fmt::Display for FileStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A row from the `files` table.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileRecord {
    #[serde(deserialize_with = "string_or_number")]
    pub id: String,
    #[serde(default)]
    pub filename: String,
    pub storage_path: String,
    #[serde(default)]
    pub file_type: String,
    #[serde(deserialize_with = "string_or_number")]
    pub user_id: String,
    pub status: FileStatus,
    #[serde(default)]
    pub progress: u8,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

/// Partial update of a file record. Only `Some` fields are written.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FileUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<FileStatus>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub progress: Option<u8>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

impl FileUpdate {
    /// First write of a run: `processing` at 0%.
    pub fn processing() -> Self {
        Self {
            status: Some(FileStatus::Processing),
            progress: Some(0),
            ..Default::default()
        }
    }

    pub fn progress(progress: u8) -> Self {
        Self {
            progress: Some(progress),
            ..Default::default()
        }
    }

    pub fn completed(at: DateTime<Utc>) -> Self {
        Self {
            status: Some(FileStatus::Completed),
            progress: Some(100),
            updated_at: Some(at),
            ..Default::default()
        }
    }

    pub fn failed(message: impl Into<String>, at: DateTime<Utc>) -> Self {
        Self {
            status: Some(FileStatus::Failed),
            error_message: Some(message.into()),
            updated_at: Some(at),
            ..Default::default()
        }
    }

    /// Apply this update onto a record.
    pub fn apply_to(&self, record: &mut FileRecord) {
        if let Some(status) = self.status {
            record.status = status;
        }
        if let Some(progress) = self.progress {
            record.progress = progress;
        }
        if let Some(message) = &self.error_message {
            record.error_message = Some(message.clone());
        }
        if let Some(at) = self.updated_at {
            record.updated_at = Some(at);
        }
    }
}

/// Metadata stored alongside every chunk of a file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkMetadata {
    pub filename: String,
    pub file_type: String,
    /// Written as a number when numeric so the match filter can compare it.
    #[serde(
        serialize_with = "number_if_numeric",
        deserialize_with = "string_or_number"
    )]
    pub user_id: String,
    pub source_file_id: String,
}

impl ChunkMetadata {
    pub fn for_file(file: &FileRecord) -> Self {
        Self {
            filename: file.filename.clone(),
            file_type: file.file_type.clone(),
            user_id: file.user_id.clone(),
            source_file_id: file.id.clone(),
        }
    }
}

/// A row to insert into the `documents` table.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChunkRecord {
    pub content: String,
    pub metadata: ChunkMetadata,
    pub file_id: String,
    pub embedding: Vec<f32>,
}

/// A chunk returned by nearest-neighbor search.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrievedChunk {
    pub content: String,
    #[serde(default)]
    pub metadata: serde_json::Value,
    #[serde(rename = "similarity", alias = "score")]
    pub score: f64,
}

/// The JSON form of an id: a number when it parses as one, else a string.
pub fn id_value(id: &str) -> serde_json::Value {
    match id.parse::<i64>() {
        Ok(n) => serde_json::Value::from(n),
        Err(_) => serde_json::Value::from(id),
    }
}

fn number_if_numeric<S>(id: &str, serializer: S) -> Result<S::Ok, S::Error>
where
    S: serde::Serializer,
{
    id_value(id).serialize(serializer)
}

/// Ids may be stored as integers or strings; both are carried as `String`.
pub fn string_or_number<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: serde::Deserializer<'de>,
{
    match serde_json::Value::deserialize(deserializer)? {
        serde_json::Value::String(s) => Ok(s),
        serde_json::Value::Number(n) => Ok(n.to_string()),
        other => Err(serde::de::Error::custom(format!(
            "expected string or number id, got {}",
            other
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_serializes_lowercase() {
        let json = serde_json::to_string(&FileStatus::Processing).unwrap();
        assert_eq!(json, "\"processing\"");
        assert!(FileStatus::Failed.is_terminal());
        assert!(!FileStatus::Pending.is_terminal());
    }

    #[test]
    fn test_update_skips_unset_fields() {
        let json = serde_json::to_value(FileUpdate::progress(40)).unwrap();
        assert_eq!(json, serde_json::json!({ "progress": 40 }));

        let json = serde_json::to_value(FileUpdate::processing()).unwrap();
        assert_eq!(json, serde_json::json!({ "status": "processing", "progress": 0 }));
    }

    #[test]
    fn test_file_record_accepts_numeric_ids() {
        let row = serde_json::json!({
            "id": 17,
            "filename": "notes.md",
            "storage_path": "7/notes.md",
            "file_type": "text/markdown",
            "user_id": 7,
            "status": "pending",
            "progress": 0,
            "created_at": "2024-03-01T10:00:00Z",
        });
        let record: FileRecord = serde_json::from_value(row).unwrap();
        assert_eq!(record.id, "17");
        assert_eq!(record.user_id, "7");
        assert_eq!(record.status, FileStatus::Pending);
        assert!(record.updated_at.is_none());
    }

    #[test]
    fn test_chunk_metadata_numeric_user_id() {
        let metadata = ChunkMetadata {
            filename: "a.txt".into(),
            file_type: "text/plain".into(),
            user_id: "7".into(),
            source_file_id: "17".into(),
        };
        let json = serde_json::to_value(&metadata).unwrap();
        assert_eq!(json["user_id"], serde_json::json!(7));
        assert_eq!(json["source_file_id"], serde_json::json!("17"));

        let back: ChunkMetadata = serde_json::from_value(json).unwrap();
        assert_eq!(back, metadata);

        assert_eq!(id_value("u-1"), serde_json::json!("u-1"));
    }

    #[test]
    fn test_retrieved_chunk_accepts_similarity() {
        let row = serde_json::json!({
            "id": 3,
            "content": "hello",
            "metadata": { "filename": "a.txt" },
            "similarity": 0.72,
        });
        let chunk: RetrievedChunk = serde_json::from_value(row).unwrap();
        assert_eq!(chunk.content, "hello");
        assert!((chunk.score - 0.72).abs() < 1e-9);
    }
}
