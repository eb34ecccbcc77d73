//! HTTP route handlers.

pub mod health;
pub mod ingest;
pub mod retrieve;

use std::sync::Arc;

use axum::Router;
use tower_http::cors::CorsLayer;

use crate::state::AppState;

/// Build the main Axum router with all routes.
pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .merge(health::routes())
        .merge(ingest::routes())
        .merge(retrieve::routes())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
