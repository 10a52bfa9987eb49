//! Control loop serializing registry mutation, fan-out and buffering

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use futures::Stream;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio_stream::wrappers::WatchStream;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::broadcast::{Broadcaster, Subscriber};
use super::buffer::SessionBuffer;
use super::queue::{Offer, PersistenceQueue};
use super::registry::ClientRegistry;
use crate::config::{DrainPolicy, HubConfig, OverflowPolicy};
use crate::types::{ClientId, TelemetryPayload};
use crate::{HubError, Result};

/// Events consumed by the control loop, one at a time
pub(crate) enum HubEvent {
    Register { id: ClientId, subscriber: Box<dyn Subscriber> },
    Unregister { id: ClientId },
    Payload(TelemetryPayload),
}

/// Running counters published by the control loop
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HubStats {
    pub payloads: u64,
    pub frames: u64,
    pub flushes: u64,
    pub dropped_batches: u64,
    pub pruned_subscribers: u64,
    pub subscribers: usize,
    pub buffered_frames: usize,
}

/// Result of spawning the control loop
pub struct HubChannels {
    /// Cloneable handle for ingest and subscriber transports
    pub handle: HubHandle,
    /// Control loop task; resolves to the final counters after shutdown
    pub task: JoinHandle<HubStats>,
}

/// The distribution hub's control loop.
///
/// Owns the session buffer outright and is the only writer of registry
/// membership outside of fan-out pruning, so neither needs coordination beyond
/// the loop itself. Runs until cancelled or until every [`HubHandle`] is gone.
pub struct Hub {
    events: mpsc::Receiver<HubEvent>,
    registry: Arc<ClientRegistry>,
    broadcaster: Broadcaster,
    buffer: SessionBuffer,
    queue: PersistenceQueue,
    overflow: OverflowPolicy,
    drain: DrainPolicy,
    stats: HubStats,
    stats_tx: watch::Sender<HubStats>,
    cancel: CancellationToken,
}

impl Hub {
    /// Build the control loop and its handle without spawning it
    pub fn new(config: &HubConfig, queue: PersistenceQueue) -> (Self, HubHandle) {
        let (events_tx, events_rx) = mpsc::channel(config.event_capacity.max(1));
        let (stats_tx, stats_rx) = watch::channel(HubStats::default());
        let registry = Arc::new(ClientRegistry::new());
        let cancel = CancellationToken::new();

        let hub = Self {
            events: events_rx,
            registry: Arc::clone(&registry),
            broadcaster: Broadcaster::new(config.delivery_timeout()),
            buffer: SessionBuffer::new(config.flush_threshold),
            queue,
            overflow: config.overflow,
            drain: config.drain,
            stats: HubStats::default(),
            stats_tx,
            cancel: cancel.clone(),
        };

        let handle = HubHandle {
            events: events_tx,
            registry,
            stats: stats_rx,
            next_id: Arc::new(AtomicU64::new(1)),
            cancel,
        };

        (hub, handle)
    }

    /// Spawn the control loop on the current runtime
    pub fn spawn(config: &HubConfig, queue: PersistenceQueue) -> HubChannels {
        let (hub, handle) = Self::new(config, queue);
        let task = tokio::spawn(hub.run());
        HubChannels { handle, task }
    }

    /// Process events until shutdown, then drain
    pub async fn run(mut self) -> HubStats {
        info!(
            flush_threshold = self.buffer.threshold(),
            queue_capacity = self.queue.capacity(),
            overflow = ?self.overflow,
            "Hub control loop started"
        );

        loop {
            let event = tokio::select! {
                biased;
                _ = self.cancel.cancelled() => {
                    info!("Hub shutdown requested");
                    break;
                }
                event = self.events.recv() => match event {
                    Some(event) => event,
                    None => {
                        info!("All hub handles dropped");
                        break;
                    }
                },
            };

            self.handle_event(event).await;
        }

        self.shutdown().await
    }

    async fn handle_event(&mut self, event: HubEvent) {
        match event {
            HubEvent::Register { id, subscriber } => {
                if self.registry.register(id, subscriber).await {
                    info!(client = %id, "Dashboard connected");
                }
            }
            HubEvent::Unregister { id } => {
                if self.registry.unregister(id).await {
                    info!(client = %id, "Dashboard disconnected");
                }
            }
            HubEvent::Payload(payload) => self.on_payload(payload).await,
        }
        self.publish_stats().await;
    }

    async fn on_payload(&mut self, payload: TelemetryPayload) {
        let fan_out = self.broadcaster.broadcast(&self.registry, &payload).await;
        self.stats.pruned_subscribers += fan_out.pruned as u64;
        self.stats.payloads += 1;
        self.stats.frames += payload.len() as u64;

        debug!(
            session = %payload.session_id,
            lap = ?payload.lap,
            frames = payload.len(),
            delivered = fan_out.delivered,
            "Payload processed"
        );

        for batch in self.buffer.ingest(payload) {
            self.persist(batch).await;
        }
    }

    async fn persist(&mut self, batch: TelemetryPayload) {
        info!(session = %batch.session_id, frames = batch.len(), "Flushing session buffer");
        self.stats.flushes += 1;

        let outcome = match self.overflow {
            OverflowPolicy::Drop => self.queue.offer(batch),
            // Once shutdown is requested a stuck worker must not hold the loop
            OverflowPolicy::Wait => self.queue.enqueue(batch, &self.cancel).await,
        };

        if outcome != Offer::Enqueued {
            self.stats.dropped_batches += 1;
        }
    }

    async fn publish_stats(&mut self) {
        self.stats.subscribers = self.registry.len().await;
        self.stats.buffered_frames = self.buffer.len();
        self.stats_tx.send_replace(self.stats.clone());
    }

    async fn shutdown(mut self) -> HubStats {
        // Refuse new events, then finish the ones already accepted
        self.events.close();
        while let Some(event) = self.events.recv().await {
            self.handle_event(event).await;
        }

        match self.drain {
            DrainPolicy::Flush => {
                if let Some(batch) = self.buffer.take() {
                    self.persist(batch).await;
                }
            }
            DrainPolicy::Discard => {
                if let Some(batch) = self.buffer.take() {
                    warn!(
                        session = %batch.session_id,
                        frames = batch.len(),
                        "Discarding buffered frames at shutdown"
                    );
                }
            }
        }

        let released = self.registry.close_all().await;
        self.publish_stats().await;

        info!(
            payloads = self.stats.payloads,
            flushes = self.stats.flushes,
            dropped_batches = self.stats.dropped_batches,
            released_subscribers = released,
            "Hub control loop stopped"
        );

        self.stats
    }
}

/// Cloneable handle used by transports to talk to the control loop
#[derive(Clone)]
pub struct HubHandle {
    events: mpsc::Sender<HubEvent>,
    registry: Arc<ClientRegistry>,
    stats: watch::Receiver<HubStats>,
    next_id: Arc<AtomicU64>,
    cancel: CancellationToken,
}

impl HubHandle {
    /// Register a subscriber, returning the id it is known by
    pub async fn register(&self, subscriber: Box<dyn Subscriber>) -> Result<ClientId> {
        let id = ClientId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.send(HubEvent::Register { id, subscriber }).await?;
        Ok(id)
    }

    /// Unregister a subscriber; unknown ids are ignored by the loop
    pub async fn unregister(&self, id: ClientId) -> Result<()> {
        self.send(HubEvent::Unregister { id }).await
    }

    /// Hand an ingested payload to the control loop
    pub async fn publish(&self, payload: TelemetryPayload) -> Result<()> {
        self.send(HubEvent::Payload(payload)).await
    }

    async fn send(&self, event: HubEvent) -> Result<()> {
        if self.cancel.is_cancelled() {
            return Err(HubError::HubClosed);
        }
        self.events.send(event).await.map_err(|_| HubError::HubClosed)
    }

    /// Live subscriber count, read directly from the registry
    pub async fn subscriber_count(&self) -> usize {
        self.registry.len().await
    }

    /// Latest counters published by the control loop
    pub fn stats(&self) -> HubStats {
        self.stats.borrow().clone()
    }

    /// Counters as a stream, starting with the current value
    pub fn stats_updates(&self) -> impl Stream<Item = HubStats> + 'static {
        WatchStream::new(self.stats.clone())
    }

    /// Ask the control loop to drain and stop
    pub fn shutdown(&self) {
        self.cancel.cancel();
    }

    pub fn is_closed(&self) -> bool {
        self.cancel.is_cancelled() || self.events.is_closed()
    }
}
