//! Helpers shared by the integration tests

#![allow(dead_code)]

use futures::StreamExt;
use paddock::hub::{DeliveryError, HubHandle, HubStats, Subscriber};
use paddock::{TelemetryFrame, TelemetryPayload};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing::subscriber::DefaultGuard;

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
}

/// Formatted log lines recorded by a thread-local subscriber
#[derive(Clone, Default)]
pub struct LogCapture {
    buf: Arc<Mutex<Vec<u8>>>,
}

struct CaptureWriter(Arc<Mutex<Vec<u8>>>);

impl std::io::Write for CaptureWriter {
    fn write(&mut self, bytes: &[u8]) -> std::io::Result<usize> {
        self.0.lock().expect("capture lock").extend_from_slice(bytes);
        Ok(bytes.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

impl LogCapture {
    /// Record every event on this thread until the guard drops.
    ///
    /// Tests using it must run on a current-thread runtime so spawned tasks
    /// log through the same subscriber.
    pub fn install() -> (Self, DefaultGuard) {
        let capture = Self::default();
        let buf = Arc::clone(&capture.buf);
        let subscriber = tracing_subscriber::fmt()
            .with_max_level(tracing::Level::DEBUG)
            .with_ansi(false)
            .with_writer(move || CaptureWriter(Arc::clone(&buf)))
            .finish();
        let guard = tracing::subscriber::set_default(subscriber);
        (capture, guard)
    }

    pub fn lines(&self) -> Vec<String> {
        let buf = self.buf.lock().expect("capture lock");
        String::from_utf8_lossy(&buf).lines().map(str::to_owned).collect()
    }

    pub fn warnings(&self) -> Vec<String> {
        self.lines().into_iter().filter(|line| line.contains(" WARN ")).collect()
    }
}

pub fn frames(start: i32, count: usize) -> Vec<TelemetryFrame> {
    (0..count)
        .map(|i| TelemetryFrame {
            packet_id: start + i as i32,
            gas: 1.0,
            gear: 3,
            rpm: 7000,
            speed_kmh: 150.0,
            ..TelemetryFrame::default()
        })
        .collect()
}

#[derive(Clone, Default)]
pub struct Recorder {
    messages: Arc<Mutex<Vec<String>>>,
    closed: Arc<AtomicBool>,
}

impl Recorder {
    pub fn payloads(&self) -> Vec<TelemetryPayload> {
        self.messages
            .lock()
            .expect("recorder lock")
            .iter()
            .map(|m| serde_json::from_str(m).expect("subscriber message is a payload"))
            .collect()
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl Subscriber for Recorder {
    async fn deliver(&self, message: &str) -> Result<(), DeliveryError> {
        self.messages.lock().expect("recorder lock").push(message.to_owned());
        Ok(())
    }

    async fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
    }
}

/// Fails like a socket whose peer vanished mid-write
pub struct Disconnected;

#[async_trait::async_trait]
impl Subscriber for Disconnected {
    async fn deliver(&self, _message: &str) -> Result<(), DeliveryError> {
        Err(DeliveryError::classify_message(
            "An established connection was aborted by the software in your host machine",
        ))
    }
}

/// Fails with a write error that is not a disconnect
pub struct Broken;

#[async_trait::async_trait]
impl Subscriber for Broken {
    async fn deliver(&self, _message: &str) -> Result<(), DeliveryError> {
        Err(DeliveryError::classify_message("invalid frame header"))
    }
}

/// Peer that closed its socket normally; writes fail after the close handshake
pub struct ClosedByPeer;

#[async_trait::async_trait]
impl Subscriber for ClosedByPeer {
    async fn deliver(&self, _message: &str) -> Result<(), DeliveryError> {
        Err(DeliveryError::classify_message(
            "WebSocket protocol error: Sending after closing is not allowed",
        ))
    }
}

/// Never finishes a delivery
pub struct Stalled;

#[async_trait::async_trait]
impl Subscriber for Stalled {
    async fn deliver(&self, _message: &str) -> Result<(), DeliveryError> {
        std::future::pending().await
    }
}

/// Wait until the control loop has processed `payloads` payloads
pub async fn settled(handle: &HubHandle, payloads: u64) -> HubStats {
    let mut updates = Box::pin(handle.stats_updates());
    let wait = async {
        while let Some(stats) = updates.next().await {
            if stats.payloads >= payloads {
                return stats;
            }
        }
        panic!("hub stopped before processing {payloads} payloads");
    };
    tokio::time::timeout(Duration::from_secs(5), wait).await.expect("hub did not settle")
}
