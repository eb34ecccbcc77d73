//! Background indexing queue: one worker runs ingestions in arrival order.
//!
//! A file id is "in flight" from the moment it is queued until its run
//! finishes; a second request for the same id in that window is rejected.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::mpsc;
use tracing::{error, info, warn};

use crate::state::AppState;

pub struct IndexingQueue {
    tx: mpsc::UnboundedSender<String>,
    rx: Mutex<Option<mpsc::UnboundedReceiver<String>>>,
    in_flight: Mutex<HashSet<String>>,
}

impl IndexingQueue {
    pub fn new() -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self {
            tx,
            rx: Mutex::new(Some(rx)),
            in_flight: Mutex::new(HashSet::new()),
        }
    }

    /// Queue a file for ingestion. Returns `false` if it is already queued or running.
    pub fn enqueue(&self, file_id: &str) -> bool {
        let mut in_flight = self.in_flight.lock();
        if !in_flight.insert(file_id.to_string()) {
            return false;
        }
        if self.tx.send(file_id.to_string()).is_err() {
            in_flight.remove(file_id);
            error!("Indexing worker has stopped; dropping file {}", file_id);
            return false;
        }
        true
    }

    pub fn is_in_flight(&self, file_id: &str) -> bool {
        self.in_flight.lock().contains(file_id)
    }

    fn release(&self, file_id: &str) {
        self.in_flight.lock().remove(file_id);
    }

    /// Take the receiver (can only be called once, by the worker).
    fn take_receiver(&self) -> Option<mpsc::UnboundedReceiver<String>> {
        self.rx.lock().take()
    }
}

impl Default for IndexingQueue {
    fn default() -> Self {
        Self::new()
    }
}

/// Start the background indexing worker task.
pub fn start_indexing_worker(state: Arc<AppState>) {
    let mut rx = match state.queue.take_receiver() {
        Some(rx) => rx,
        None => {
            error!("Indexing worker already started");
            return;
        }
    };

    tokio::spawn(async move {
        info!("Background indexing worker started");
        while let Some(file_id) = rx.recv().await {
            process_file(&state, &file_id).await;
        }
    });
}

async fn process_file(state: &AppState, file_id: &str) {
    match state.ingester.ingest_file(file_id).await {
        Ok(outcome) => info!("Indexed file {} ({} chunks)", file_id, outcome.chunks),
        Err(e) => error!("Failed to index file {}: {}", file_id, e),
    }
    state.queue.release(file_id);
}

/// Periodically queue the oldest `pending` file. A zero interval disables polling.
pub fn start_pending_poller(state: Arc<AppState>, interval: Duration) {
    if interval.is_zero() {
        info!("Pending-file poller disabled");
        return;
    }

    tokio::spawn(async move {
        info!("Polling for pending files every {:?}", interval);
        let mut ticker = tokio::time::interval(interval);
        loop {
            ticker.tick().await;
            poll_pending(&state).await;
        }
    });
}

/// One poll: queue the oldest pending file unless it is already in flight.
/// Returns how many files were queued.
pub async fn poll_pending(state: &AppState) -> usize {
    let files = match state.records.pending_files(1).await {
        Ok(files) => files,
        Err(e) => {
            warn!("Failed to list pending files: {}", e);
            return 0;
        }
    };

    let mut queued = 0;
    for file in files {
        if state.queue.enqueue(&file.id) {
            info!("Picked up pending file {} ({})", file.id, file.filename);
            queued += 1;
        }
    }
    queued
}
