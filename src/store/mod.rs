//! Durable store interface and the worker draining the persistence queue

mod json_lines;
mod log;
mod memory;

pub use json_lines::JsonLinesStore;
pub use log::LogStore;
pub use memory::MemoryStore;

use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::Result;
use crate::config::StoreConfig;
use crate::hub::QueueReceiver;
use crate::types::TelemetryPayload;

/// A destination for flushed session batches
#[async_trait::async_trait]
pub trait Store: Send + Sync + 'static {
    /// Persist one batch. Failures are logged by the worker and not retried.
    async fn persist(&self, batch: &TelemetryPayload) -> Result<()>;
}

#[async_trait::async_trait]
impl<S: Store + ?Sized> Store for Box<S> {
    async fn persist(&self, batch: &TelemetryPayload) -> Result<()> {
        (**self).persist(batch).await
    }
}

#[async_trait::async_trait]
impl<S: Store + ?Sized> Store for std::sync::Arc<S> {
    async fn persist(&self, batch: &TelemetryPayload) -> Result<()> {
        (**self).persist(batch).await
    }
}

/// Build the store named by the configuration
pub fn from_config(config: &StoreConfig) -> Box<dyn Store> {
    match config {
        StoreConfig::Log => Box::new(LogStore),
        StoreConfig::JsonLines { path } => Box::new(JsonLinesStore::new(path)),
    }
}

/// Totals reported when the worker stops
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WorkerReport {
    pub persisted: u64,
    pub failed: u64,
}

/// Drains the persistence queue into a store, strictly in FIFO order
pub struct PersistenceWorker;

impl PersistenceWorker {
    /// Spawn the worker; it ends once every queue producer is gone
    pub fn spawn<S: Store>(receiver: QueueReceiver, store: S) -> JoinHandle<WorkerReport> {
        tokio::spawn(Self::run(receiver, store))
    }

    pub async fn run<S: Store>(mut receiver: QueueReceiver, store: S) -> WorkerReport {
        info!("Persistence worker started");
        let mut report = WorkerReport::default();

        while let Some(batch) = receiver.recv().await {
            match store.persist(&batch).await {
                Ok(()) => {
                    report.persisted += 1;
                    debug!(
                        session = %batch.session_id,
                        frames = batch.len(),
                        backlog = receiver.len(),
                        "Batch persisted"
                    );
                }
                Err(e) => {
                    // No re-enqueue: the batch is lost
                    report.failed += 1;
                    warn!(session = %batch.session_id, frames = batch.len(), error = %e, "Failed to persist batch");
                }
            }
        }

        info!(persisted = report.persisted, failed = report.failed, "Persistence worker stopped");
        report
    }
}
