//! Bounded hand-off between the control loop and the store worker

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio_stream::wrappers::ReceiverStream;
use tokio_util::sync::CancellationToken;
use tracing::{trace, warn};

use crate::types::TelemetryPayload;

/// Result of handing a batch to the queue
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Offer {
    Enqueued,
    /// Queue full; the batch was discarded
    Dropped,
    /// Store worker is gone; the batch was discarded
    Closed,
}

/// Producer side of the persistence queue.
///
/// FIFO with a fixed capacity. [`offer`](Self::offer) never blocks: a full
/// queue drops the newest batch, logs a warning and counts it. There is no
/// path for a batch to re-enter the queue once dequeued.
#[derive(Debug, Clone)]
pub struct PersistenceQueue {
    tx: mpsc::Sender<TelemetryPayload>,
    dropped: Arc<AtomicU64>,
}

/// Consumer side of the persistence queue, owned by the store worker
#[derive(Debug)]
pub struct QueueReceiver {
    rx: mpsc::Receiver<TelemetryPayload>,
}

impl PersistenceQueue {
    /// Create a queue holding at most `capacity` pending batches
    pub fn bounded(capacity: usize) -> (Self, QueueReceiver) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        (Self { tx, dropped: Arc::new(AtomicU64::new(0)) }, QueueReceiver { rx })
    }

    /// Hand off a batch without waiting
    pub fn offer(&self, payload: TelemetryPayload) -> Offer {
        match self.tx.try_send(payload) {
            Ok(()) => {
                trace!(pending = self.pending(), "Batch enqueued");
                Offer::Enqueued
            }
            Err(TrySendError::Full(payload)) => {
                self.dropped.fetch_add(1, Ordering::Relaxed);
                warn!(
                    session = %payload.session_id,
                    frames = payload.len(),
                    capacity = self.capacity(),
                    "Persistence queue full, dropping batch"
                );
                Offer::Dropped
            }
            Err(TrySendError::Closed(payload)) => {
                self.dropped.fetch_add(1, Ordering::Relaxed);
                warn!(
                    session = %payload.session_id,
                    frames = payload.len(),
                    "Persistence queue closed, dropping batch"
                );
                Offer::Closed
            }
        }
    }

    /// Hand off a batch, waiting for a free slot.
    ///
    /// Gives up when `cancel` fires while the queue is still full; the batch is
    /// then dropped and counted like an overflow.
    pub async fn enqueue(&self, payload: TelemetryPayload, cancel: &CancellationToken) -> Offer {
        let permit = tokio::select! {
            biased;
            permit = self.tx.reserve() => permit,
            _ = cancel.cancelled() => {
                self.dropped.fetch_add(1, Ordering::Relaxed);
                warn!(
                    session = %payload.session_id,
                    frames = payload.len(),
                    "Shutdown while waiting for queue space, dropping batch"
                );
                return Offer::Dropped;
            }
        };

        match permit {
            Ok(permit) => {
                permit.send(payload);
                Offer::Enqueued
            }
            Err(_) => {
                self.dropped.fetch_add(1, Ordering::Relaxed);
                warn!(
                    session = %payload.session_id,
                    frames = payload.len(),
                    "Persistence queue closed, dropping batch"
                );
                Offer::Closed
            }
        }
    }

    /// Batches waiting for the store worker
    pub fn pending(&self) -> usize {
        self.tx.max_capacity() - self.tx.capacity()
    }

    pub fn capacity(&self) -> usize {
        self.tx.max_capacity()
    }

    /// Batches discarded since the queue was created
    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }

    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

impl QueueReceiver {
    /// Next batch in enqueue order; `None` once every producer is gone
    pub async fn recv(&mut self) -> Option<TelemetryPayload> {
        self.rx.recv().await
    }

    pub fn try_recv(&mut self) -> Option<TelemetryPayload> {
        self.rx.try_recv().ok()
    }

    pub fn len(&self) -> usize {
        self.rx.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rx.is_empty()
    }

    pub fn into_stream(self) -> ReceiverStream<TelemetryPayload> {
        ReceiverStream::new(self.rx)
    }
}
