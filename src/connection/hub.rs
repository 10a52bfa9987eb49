//! Running hub: control loop, persistence worker and HTTP surface

use std::future::Future;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tracing::{error, info};

use crate::Result;
use crate::config::HubConfig;
use crate::hub::{Hub, HubChannels, HubHandle, HubStats, PersistenceQueue};
use crate::server::{self, AppState};
use crate::store::{PersistenceWorker, Store, WorkerReport};

/// A started hub and its background tasks
pub struct HubService {
    handle: HubHandle,
    default_session: String,
    hub_task: JoinHandle<HubStats>,
    worker_task: JoinHandle<WorkerReport>,
}

/// Final counters of a stopped hub
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HubReport {
    pub hub: HubStats,
    pub worker: WorkerReport,
}

impl HubService {
    /// Spawn the control loop and a persistence worker draining into `store`
    pub fn start<S: Store>(config: &HubConfig, store: S) -> Self {
        let (queue, receiver) = PersistenceQueue::bounded(config.queue_capacity);
        let worker_task = PersistenceWorker::spawn(receiver, store);
        let HubChannels { handle, task } = Hub::spawn(config, queue);

        info!(
            flush_threshold = config.flush_threshold,
            queue_capacity = config.queue_capacity,
            overflow = ?config.overflow,
            drain = ?config.drain,
            "Hub started"
        );

        Self {
            handle,
            default_session: config.default_session.clone(),
            hub_task: task,
            worker_task,
        }
    }

    pub fn handle(&self) -> &HubHandle {
        &self.handle
    }

    pub fn state(&self) -> AppState {
        AppState::new(self.handle.clone(), self.default_session.as_str())
    }

    /// Serve HTTP on `listener` until `shutdown` resolves
    pub async fn serve<F>(&self, listener: TcpListener, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        server::serve(listener, self.state(), shutdown).await
    }

    /// Stop the control loop, let it drain, then wait for the worker to
    /// empty the persistence queue.
    pub async fn shutdown(self) -> HubReport {
        self.handle.shutdown();
        drop(self.handle);

        let hub = match self.hub_task.await {
            Ok(stats) => stats,
            Err(e) => {
                error!(error = %e, "Hub task failed");
                HubStats::default()
            }
        };
        // The queue's only sender lived in the control loop, so the worker
        // finishes once the backlog is persisted
        let worker = match self.worker_task.await {
            Ok(report) => report,
            Err(e) => {
                error!(error = %e, "Persistence worker failed");
                WorkerReport::default()
            }
        };

        info!(
            payloads = hub.payloads,
            flushes = hub.flushes,
            persisted = worker.persisted,
            "Hub shut down"
        );
        HubReport { hub, worker }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use crate::test_utils::frames;
    use crate::types::TelemetryPayload;
    use std::sync::Arc;

    #[tokio::test]
    async fn shutdown_persists_partial_buffer() {
        let store = Arc::new(MemoryStore::new());
        let service = HubService::start(&HubConfig::default(), Arc::clone(&store));

        service
            .handle()
            .publish(TelemetryPayload::new("s1", frames(0, 7)))
            .await
            .expect("hub running");

        let report = service.shutdown().await;
        assert_eq!(report.hub.flushes, 1);
        assert_eq!(report.worker.persisted, 1);
        assert_eq!(store.batches()[0].frames, frames(0, 7));
    }

    #[tokio::test]
    async fn state_carries_default_session() {
        let config = HubConfig { default_session: "practice".into(), ..HubConfig::default() };
        let service = HubService::start(&config, MemoryStore::new());
        assert_eq!(&*service.state().default_session, "practice");
        service.shutdown().await;
    }
}
