//! Similarity search over a user's chunks.

use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::post;
use axum::{Json, Router};
use serde::Deserialize;
use tracing::error;

use kbase_retrieve::{DEFAULT_LIMIT, DEFAULT_THRESHOLD};
use kbase_store::string_or_number;

use crate::state::AppState;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new().route("/retrieve", post(retrieve))
}

fn default_limit() -> usize {
    DEFAULT_LIMIT
}

fn default_threshold() -> f64 {
    DEFAULT_THRESHOLD
}

#[derive(Debug, Deserialize)]
pub struct RetrieveRequest {
    pub query: String,
    #[serde(deserialize_with = "string_or_number")]
    pub user_id: String,
    #[serde(default = "default_limit")]
    pub limit: usize,
    #[serde(default = "default_threshold")]
    pub threshold: f64,
}

/// POST /retrieve: `{"results": [...]}` best match first.
async fn retrieve(
    State(state): State<Arc<AppState>>,
    Json(req): Json<RetrieveRequest>,
) -> (StatusCode, Json<serde_json::Value>) {
    match state
        .retriever
        .retrieve(&req.query, &req.user_id, req.limit, req.threshold)
        .await
    {
        Ok(results) => (
            StatusCode::OK,
            Json(serde_json::json!({ "results": results })),
        ),
        Err(e) => {
            error!("Retrieval for user {} failed: {}", req.user_id, e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(serde_json::json!({ "detail": e.to_string() })),
            )
        }
    }
}
