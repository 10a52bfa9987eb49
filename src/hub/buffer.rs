//! Session-scoped frame aggregation and flush policy

use tracing::debug;

use crate::types::{TelemetryFrame, TelemetryPayload};

/// Conceptual state of the session buffer
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BufferState<'a> {
    /// No buffered frames
    Idle,
    /// Frames buffered for one session
    Accumulating { session: &'a str, len: usize },
}

/// Accumulates frames for the current session and decides when to flush.
///
/// Owned exclusively by the control loop. At any instant the buffer holds
/// frames of exactly one session, and every flush leaves it empty.
#[derive(Debug, Clone)]
pub struct SessionBuffer {
    session: Option<String>,
    frames: Vec<TelemetryFrame>,
    threshold: usize,
}

impl SessionBuffer {
    /// Create a buffer that flushes once `threshold` frames have accumulated
    pub fn new(threshold: usize) -> Self {
        let threshold = threshold.max(1);
        Self { session: None, frames: Vec::with_capacity(threshold), threshold }
    }

    /// Absorb a payload, returning the batches to persist in flush order.
    ///
    /// 1. A session change flushes the buffered frames under the old session.
    /// 2. The payload's frames are appended and its session adopted.
    /// 3. Reaching the threshold flushes under the current session.
    ///
    /// A payload larger than the threshold is flushed whole.
    pub fn ingest(&mut self, payload: TelemetryPayload) -> Vec<TelemetryPayload> {
        let mut flushed = Vec::new();

        let switching = self.session.as_deref().is_some_and(|s| s != payload.session_id);
        if switching && !self.frames.is_empty() {
            debug!(
                from = self.session.as_deref().unwrap_or_default(),
                to = %payload.session_id,
                "Session changed, flushing buffer"
            );
            flushed.extend(self.take());
        }

        self.frames.extend(payload.frames);
        self.session = Some(payload.session_id);

        if self.frames.len() >= self.threshold {
            flushed.extend(self.take());
        }

        flushed
    }

    /// Empty the buffer into a payload; `None` when nothing is buffered.
    ///
    /// The session id is retained so a later payload of the same session does
    /// not count as a session change.
    pub fn take(&mut self) -> Option<TelemetryPayload> {
        if self.frames.is_empty() {
            return None;
        }

        let session = self.session.clone().unwrap_or_default();
        let frames = std::mem::replace(&mut self.frames, Vec::with_capacity(self.threshold));
        Some(TelemetryPayload::new(session, frames))
    }

    pub fn state(&self) -> BufferState<'_> {
        match (&self.session, self.frames.len()) {
            (Some(session), len) if len > 0 => {
                BufferState::Accumulating { session: session.as_str(), len }
            }
            _ => BufferState::Idle,
        }
    }

    pub fn session(&self) -> Option<&str> {
        self.session.as_deref()
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    pub fn threshold(&self) -> usize {
        self.threshold
    }
}
