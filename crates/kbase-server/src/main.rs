//! kbase: document ingestion and retrieval service.

use std::sync::Arc;
use std::time::Duration;

use tracing::info;
use tracing_subscriber::EnvFilter;

use kbase_core::KbaseConfig;
use kbase_server::{build_router, start_indexing_worker, start_pending_poller, AppState};
use kbase_store::SupabaseStore;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // A missing .env is fine; the real environment still applies.
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = KbaseConfig::from_env()?;
    let port = config.port;

    let client = reqwest::Client::new();
    let store = Arc::new(SupabaseStore::new(client.clone(), &config.store));
    let embedder = kbase_infer::create_embedder(client, &config.embedding);
    info!("Store at {} (bucket {})", config.store.url, config.store.bucket);

    let state = Arc::new(AppState::new(store.clone(), store, embedder));

    start_indexing_worker(state.clone());
    start_pending_poller(
        state.clone(),
        Duration::from_secs(config.poll_interval_secs),
    );

    let app = build_router(state);

    let addr = format!("0.0.0.0:{}", port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("kbase server listening on {}", addr);

    axum::serve(listener, app).await?;

    Ok(())
}
