//! Ingestion trigger.

use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::post;
use axum::{Json, Router};
use serde::Deserialize;
use tracing::warn;

use kbase_store::string_or_number;

use crate::state::AppState;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new().route("/ingest", post(ingest))
}

#[derive(Debug, Deserialize)]
pub struct IngestRequest {
    #[serde(deserialize_with = "string_or_number")]
    pub file_id: String,
}

/// POST /ingest: queue a file and return immediately.
async fn ingest(
    State(state): State<Arc<AppState>>,
    Json(req): Json<IngestRequest>,
) -> (StatusCode, Json<serde_json::Value>) {
    if state.queue.enqueue(&req.file_id) {
        (
            StatusCode::OK,
            Json(serde_json::json!({
                "status": "processing_started",
                "file_id": req.file_id,
            })),
        )
    } else {
        warn!("Rejected ingest for file {}: already processing", req.file_id);
        (
            StatusCode::CONFLICT,
            Json(serde_json::json!({
                "status": "already_processing",
                "file_id": req.file_id,
            })),
        )
    }
}
