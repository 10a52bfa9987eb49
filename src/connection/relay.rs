//! Running producer relay

use futures::Stream;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_stream::wrappers::WatchStream;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use crate::Result;
use crate::config::RelayConfig;
use crate::driver::{Driver, DriverChannels, RelayStats};
use crate::producer::{self, BatchSink, FrameSource, IngestClient};

/// Relay sampling a source and pushing batches to a hub
pub struct RelayConnection {
    stats: watch::Receiver<RelayStats>,
    cancel: CancellationToken,
    task: JoinHandle<RelayStats>,
}

impl RelayConnection {
    /// Open the configured source and start pushing to the configured hub.
    ///
    /// Failing to open the source is fatal here; once running, source errors
    /// are retried with backoff by the driver.
    pub fn connect(config: &RelayConfig) -> Result<Self> {
        let source = producer::open_source(&config.source)?;
        let client = IngestClient::new(config)?;

        info!(
            source = source.name(),
            endpoint = client.endpoint(),
            session = %config.session_id,
            batch_size = config.batch_size,
            "Relay connecting"
        );
        Ok(Self::with_parts(source, client, config))
    }

    /// Start a relay over an arbitrary source and sink
    pub fn with_parts<S, K>(source: S, sink: K, config: &RelayConfig) -> Self
    where
        S: FrameSource,
        K: BatchSink,
    {
        let DriverChannels { stats, cancel, task } = Driver::spawn(source, sink, config);
        Self { stats, cancel, task }
    }

    pub fn stats(&self) -> RelayStats {
        *self.stats.borrow()
    }

    /// Counters as a stream, starting with the current value
    pub fn stats_updates(&self) -> impl Stream<Item = RelayStats> + 'static {
        WatchStream::new(self.stats.clone())
    }

    /// Token that stops sampling when cancelled
    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Resolves when the source ends, the relay gives up, or it is cancelled
    pub async fn finished(self) -> RelayStats {
        Self::join(self.task).await
    }

    /// Stop sampling and wait for in-flight pushes
    pub async fn stop(self) -> RelayStats {
        self.cancel.cancel();
        Self::join(self.task).await
    }

    async fn join(task: JoinHandle<RelayStats>) -> RelayStats {
        match task.await {
            Ok(stats) => stats,
            Err(e) => {
                error!(error = %e, "Relay task failed");
                RelayStats::default()
            }
        }
    }
}
