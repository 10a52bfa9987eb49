//! Test utilities shared by unit tests, integration tests and benchmarks
//!
//! Provides frame fixtures and in-process [`Subscriber`] implementations that
//! record, fail, or stall, so hub behaviour can be exercised without sockets.

#![cfg(any(test, feature = "benchmark"))]

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use crate::hub::{DeliveryError, Subscriber};
use crate::types::{TelemetryFrame, TelemetryPayload};

/// `count` distinct frames with consecutive packet ids starting at `start`
pub fn frames(start: i32, count: usize) -> Vec<TelemetryFrame> {
    (0..count)
        .map(|i| {
            let packet_id = start + i as i32;
            TelemetryFrame {
                packet_id,
                gas: 0.8,
                brake: 0.0,
                fuel: 42.0,
                gear: 4,
                rpm: 6500 + packet_id % 100,
                steer_angle: 0.05,
                speed_kmh: 180.0,
                current_lap_time: packet_id as f32 / 10.0,
                current_position: 3,
            }
        })
        .collect()
}

/// Records every message it is sent
#[derive(Debug, Clone, Default)]
pub struct RecordingSubscriber {
    messages: Arc<Mutex<Vec<String>>>,
    closed: Arc<AtomicBool>,
}

impl RecordingSubscriber {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn messages(&self) -> Vec<String> {
        self.messages.lock().expect("recording lock poisoned").clone()
    }

    /// Received messages decoded back into payloads
    pub fn payloads(&self) -> Vec<TelemetryPayload> {
        self.messages()
            .iter()
            .map(|m| serde_json::from_str(m).expect("subscriber received invalid JSON"))
            .collect()
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl Subscriber for RecordingSubscriber {
    async fn deliver(&self, message: &str) -> Result<(), DeliveryError> {
        self.messages.lock().expect("recording lock poisoned").push(message.to_string());
        Ok(())
    }

    async fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
    }
}

/// Fails every delivery with the same error
#[derive(Debug, Clone)]
pub struct FailingSubscriber {
    error: DeliveryError,
    attempts: Arc<AtomicUsize>,
    closed: Arc<AtomicBool>,
}

impl FailingSubscriber {
    pub fn new(error: DeliveryError) -> Self {
        Self { error, attempts: Arc::default(), closed: Arc::default() }
    }

    pub fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl Subscriber for FailingSubscriber {
    async fn deliver(&self, _message: &str) -> Result<(), DeliveryError> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        Err(self.error.clone())
    }

    async fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
    }
}

/// Never completes a delivery
#[derive(Debug, Clone, Copy)]
pub struct StalledSubscriber;

#[async_trait::async_trait]
impl Subscriber for StalledSubscriber {
    async fn deliver(&self, _message: &str) -> Result<(), DeliveryError> {
        std::future::pending().await
    }
}
