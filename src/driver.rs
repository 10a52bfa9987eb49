//! Driver spawns and manages the relay's sampling and push tasks

use futures::StreamExt;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::task::{JoinHandle, JoinSet};
use tokio::time::{MissedTickBehavior, interval};
use tokio_stream::wrappers::ReceiverStream;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, trace, warn};

use crate::config::RelayConfig;
use crate::producer::{BatchSink, FrameSource};
use crate::stream::DedupExt;
use crate::types::TelemetryFrame;

/// Consecutive source errors tolerated before the relay gives up
const MAX_ERRORS: u32 = 10;

/// Relay counters, published as they change
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RelayStats {
    /// Samples read from the source, duplicates included
    pub samples: u64,
    /// Frames forwarded into batches after de-duplication
    pub frames: u64,
    pub batches_sent: u64,
    pub batches_failed: u64,
    pub source_errors: u64,
}

/// Result of spawning driver tasks
pub struct DriverChannels {
    /// Live counters
    pub stats: watch::Receiver<RelayStats>,
    /// Cancellation token for graceful shutdown
    pub cancel: CancellationToken,
    /// Completes once sampling has stopped and every in-flight push settled
    pub task: JoinHandle<RelayStats>,
}

/// Driver spawns and manages relay tasks
///
/// A sampler task owns the source and reads it once per sample interval. A
/// batcher task de-duplicates samples by packet id, groups them into batches
/// and hands every batch to the sink on its own task, so a slow hub never
/// delays the next sample.
pub struct Driver;

impl Driver {
    /// Spawn driver tasks for the given source and sink
    pub fn spawn<S, K>(source: S, sink: K, config: &RelayConfig) -> DriverChannels
    where
        S: FrameSource,
        K: BatchSink,
    {
        let batch_size = config.batch_size.max(1);
        let (frame_tx, frame_rx) = mpsc::channel(batch_size * 2);
        let (stats_tx, stats_rx) = watch::channel(RelayStats::default());
        let stats_tx = Arc::new(stats_tx);
        let cancel = CancellationToken::new();

        tokio::spawn(Self::sampler_task(
            source,
            frame_tx,
            config.sample_interval(),
            cancel.clone(),
            Arc::clone(&stats_tx),
        ));
        let task = tokio::spawn(Self::batcher_task(frame_rx, Arc::new(sink), batch_size, stats_tx));

        DriverChannels { stats: stats_rx, cancel, task }
    }

    /// Sampler task - reads the source on a fixed cadence
    async fn sampler_task<S: FrameSource>(
        mut source: S,
        frame_tx: mpsc::Sender<TelemetryFrame>,
        period: Duration,
        cancel: CancellationToken,
        stats: Arc<watch::Sender<RelayStats>>,
    ) {
        info!(source = source.name(), period_ms = period.as_millis() as u64, "Sampler task started");
        let mut ticker = interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut error_count = 0u32;

        loop {
            let result = tokio::select! {
                _ = cancel.cancelled() => {
                    info!("Sampler cancelled");
                    break;
                }
                result = async {
                    ticker.tick().await;
                    source.sample().await
                } => result,
            };

            match result {
                Ok(Some(frame)) => {
                    error_count = 0;
                    stats.send_modify(|s| s.samples += 1);
                    trace!(packet_id = frame.packet_id, "Sampled frame");

                    if frame_tx.send(frame).await.is_err() {
                        debug!("Batcher dropped, shutting down");
                        break;
                    }
                }
                Ok(None) => {
                    info!(source = source.name(), "Source ended");
                    break;
                }
                Err(e) => {
                    // Don't crash on transient failures
                    error_count += 1;
                    stats.send_modify(|s| s.source_errors += 1);
                    error!(error = %e, attempt = error_count, max = MAX_ERRORS, "Source error");

                    if error_count >= MAX_ERRORS {
                        error!("Too many source errors, shutting down");
                        break;
                    }

                    // Exponential backoff: 100ms, 200ms, 400ms, ...
                    let backoff = Duration::from_millis(50 * (1 << error_count.min(5)));
                    tokio::select! {
                        _ = cancel.cancelled() => break,
                        _ = tokio::time::sleep(backoff) => {}
                    }
                }
            }
        }

        info!(samples = stats.borrow().samples, "Sampler task ended");
    }

    /// Batcher task - de-duplicates, batches and pushes
    async fn batcher_task<K: BatchSink>(
        frame_rx: mpsc::Receiver<TelemetryFrame>,
        sink: Arc<K>,
        batch_size: usize,
        stats: Arc<watch::Sender<RelayStats>>,
    ) -> RelayStats {
        // A partial batch left when sampling stops is still pushed
        let mut batches = ReceiverStream::new(frame_rx).dedup_by_packet().chunks(batch_size);
        let mut pushes = JoinSet::new();

        while let Some(batch) = batches.next().await {
            let frames = batch.len();
            stats.send_modify(|s| s.frames += frames as u64);

            let sink = Arc::clone(&sink);
            let stats = Arc::clone(&stats);
            pushes.spawn(async move {
                match sink.push(batch).await {
                    Ok(()) => stats.send_modify(|s| s.batches_sent += 1),
                    Err(e) => {
                        stats.send_modify(|s| s.batches_failed += 1);
                        warn!(frames, error = %e, "Failed to push batch");
                    }
                }
            });

            // Reap finished pushes so the set stays small
            while pushes.try_join_next().is_some() {}
        }

        while pushes.join_next().await.is_some() {}

        let totals = *stats.borrow();
        info!(
            samples = totals.samples,
            frames = totals.frames,
            batches_sent = totals.batches_sent,
            batches_failed = totals.batches_failed,
            "Relay stopped"
        );
        totals
    }
}
