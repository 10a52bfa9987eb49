//! Fan-out of payloads to every registered subscriber

use futures::future::join_all;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, trace, warn};

use super::registry::ClientRegistry;
use crate::types::{ClientId, TelemetryPayload};

/// A live subscriber connection.
///
/// The hub only ever pushes: one self-describing JSON message per processed
/// payload. Implementations must be shareable because delivery attempts for
/// different subscribers run concurrently under a shared registry guard.
#[async_trait::async_trait]
pub trait Subscriber: Send + Sync + 'static {
    /// Deliver one message.
    async fn deliver(&self, message: &str) -> Result<(), DeliveryError>;

    /// Release the underlying connection. Called exactly once when the
    /// connection leaves the registry.
    async fn close(&self) {}
}

/// Why a delivery attempt failed
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum DeliveryError {
    /// Peer closed the connection (normal, going away, or abnormal closure)
    #[error("connection closed by peer{}", .code.map(|c| format!(" (code {c})")).unwrap_or_default())]
    Closed { code: Option<u16> },

    /// Transport write failed in a way consistent with an abrupt disconnect
    #[error("write aborted: {0}")]
    Aborted(String),

    /// Delivery did not finish within the configured timeout
    #[error("delivery timed out after {0:?}")]
    TimedOut(Duration),

    /// Any other transport failure
    #[error("transport error: {0}")]
    Transport(String),
}

/// Message fragments of transport errors raised when a peer disappears
const DISCONNECT_SIGNATURES: &[&str] = &[
    "connection was aborted",
    "wsasend",
    "broken pipe",
    "connection reset",
    "send failed",
    "write aborted",
];

/// Fragments raised once a close handshake has started on either side
const CLOSED_SIGNATURES: &[&str] = &[
    "connection closed",
    "closed connection",
    "already closed",
    "close frame",
    "going away",
    "sending after closing",
    "after having closed",
];

impl DeliveryError {
    /// Expected failures are routine disconnects and are pruned silently
    pub fn is_expected(&self) -> bool {
        matches!(self, DeliveryError::Closed { .. } | DeliveryError::Aborted(_))
    }

    /// Classify a transport error by its message
    pub fn classify(err: &(dyn std::error::Error + 'static)) -> Self {
        let mut message = err.to_string();
        let mut source = err.source();
        while let Some(inner) = source {
            // Wrappers such as axum::Error already display their inner error
            let text = inner.to_string();
            if !message.contains(&text) {
                message.push_str(": ");
                message.push_str(&text);
            }
            source = inner.source();
        }
        Self::classify_message(message)
    }

    pub fn classify_message(message: impl Into<String>) -> Self {
        let message = message.into();
        let lowered = message.to_lowercase();

        if CLOSED_SIGNATURES.iter().any(|sig| lowered.contains(sig)) {
            DeliveryError::Closed { code: None }
        } else if DISCONNECT_SIGNATURES.iter().any(|sig| lowered.contains(sig)) {
            DeliveryError::Aborted(message)
        } else {
            DeliveryError::Transport(message)
        }
    }
}

/// Outcome of one fan-out pass
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FanOut {
    /// Subscribers registered when the pass started
    pub attempted: usize,
    pub delivered: usize,
    /// Failed subscribers removed from the registry
    pub pruned: usize,
}

/// Delivers payloads to every registered subscriber and prunes failures.
///
/// Each subscriber registered at the start of a pass gets exactly one delivery
/// attempt. Attempts run concurrently, so one slow socket delays the pass by at
/// most the delivery timeout rather than stalling the subscribers behind it.
#[derive(Debug, Clone, Default)]
pub struct Broadcaster {
    delivery_timeout: Option<Duration>,
}

impl Broadcaster {
    pub fn new(delivery_timeout: Option<Duration>) -> Self {
        Self { delivery_timeout }
    }

    /// Serialize the payload once and fan it out
    pub async fn broadcast(&self, registry: &ClientRegistry, payload: &TelemetryPayload) -> FanOut {
        let message = match serde_json::to_string(payload) {
            Ok(message) => message,
            Err(e) => {
                warn!(session = %payload.session_id, error = %e, "Failed to encode payload for fan-out");
                return FanOut::default();
            }
        };

        self.broadcast_message(registry, &message).await
    }

    /// Fan out an already-encoded message
    pub async fn broadcast_message(&self, registry: &ClientRegistry, message: &str) -> FanOut {
        // Read pass: collect failures without touching membership
        let (attempted, failures) = {
            let clients = registry.read_view().await;
            if clients.is_empty() {
                return FanOut::default();
            }

            let attempts = clients.iter().map(|(id, subscriber)| async move {
                (*id, self.attempt(subscriber.as_ref(), message).await)
            });
            let results = join_all(attempts).await;

            let attempted = results.len();
            let failures: Vec<(ClientId, DeliveryError)> =
                results.into_iter().filter_map(|(id, result)| result.err().map(|e| (id, e))).collect();
            (attempted, failures)
        };

        for (id, error) in &failures {
            if error.is_expected() {
                debug!(client = %id, error = %error, "Subscriber disconnected");
            } else {
                warn!(client = %id, error = %error, "Subscriber delivery failed");
            }
        }

        // Commit pass: exclusive access, after the read guard is gone
        let pruned = if failures.is_empty() {
            0
        } else {
            let ids: Vec<ClientId> = failures.iter().map(|(id, _)| *id).collect();
            registry.prune(&ids).await
        };

        trace!(attempted, failed = failures.len(), pruned, "Fan-out complete");

        FanOut { attempted, delivered: attempted - failures.len(), pruned }
    }

    async fn attempt(&self, subscriber: &dyn Subscriber, message: &str) -> Result<(), DeliveryError> {
        match self.delivery_timeout {
            Some(limit) => match tokio::time::timeout(limit, subscriber.deliver(message)).await {
                Ok(result) => result,
                Err(_) => Err(DeliveryError::TimedOut(limit)),
            },
            None => subscriber.deliver(message).await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{FailingSubscriber, RecordingSubscriber, StalledSubscriber, frames};

    #[test]
    fn classifies_disconnect_signatures() {
        let cases = [
            ("Trying to work with closed connection", true),
            ("Connection reset by peer (os error 104)", true),
            ("wsasend: An existing connection was aborted by the software", true),
            ("Broken pipe (os error 32)", true),
            ("WebSocket protocol error: Sending after closing is not allowed", true),
            ("Trying to work with closed connection after having closed", true),
            ("invalid UTF-8 in frame", false),
            ("message too large", false),
        ];

        for (message, expected) in cases {
            let error = DeliveryError::classify_message(message);
            assert_eq!(error.is_expected(), expected, "misclassified: {message}");
        }
    }

    #[test]
    fn classify_walks_source_chain() {
        let inner = std::io::Error::new(std::io::ErrorKind::BrokenPipe, "Broken pipe");
        let outer = crate::HubError::transport_failed_with_source("websocket send", Box::new(inner));

        assert!(matches!(DeliveryError::classify(&outer), DeliveryError::Aborted(_)));
    }

    #[derive(Debug, Error)]
    #[error("{0}")]
    struct Wrapper(#[source] std::io::Error);

    #[test]
    fn classify_skips_sources_already_in_the_message() {
        // Displays like axum::Error: the outer message already carries the inner one
        let inner = std::io::Error::other("Sending after closing is not allowed");
        let outer = Wrapper(inner);

        match DeliveryError::classify(&outer) {
            DeliveryError::Closed { .. } => {}
            other => panic!("expected closed, got {other:?}"),
        }
        let transport = DeliveryError::classify(&Wrapper(std::io::Error::other("bad frame")));
        assert_eq!(transport, DeliveryError::Transport("bad frame".into()));
    }

    #[test]
    fn timeouts_are_unexpected() {
        assert!(!DeliveryError::TimedOut(Duration::from_secs(1)).is_expected());
        assert!(DeliveryError::Closed { code: Some(1001) }.to_string().contains("1001"));
    }

    #[tokio::test]
    async fn delivers_identical_message_to_all() {
        let registry = ClientRegistry::new();
        let subscribers: Vec<_> = (0..3).map(|_| RecordingSubscriber::new()).collect();
        for (i, subscriber) in subscribers.iter().enumerate() {
            registry.register(ClientId(i as u64), Box::new(subscriber.clone())).await;
        }

        let payload = TelemetryPayload::new("s1", frames(0, 5));
        let fan_out = Broadcaster::default().broadcast(&registry, &payload).await;

        assert_eq!(fan_out, FanOut { attempted: 3, delivered: 3, pruned: 0 });
        for subscriber in &subscribers {
            assert_eq!(subscriber.payloads(), vec![payload.clone()]);
        }
    }

    #[tokio::test]
    async fn prunes_failures_and_keeps_delivering() {
        let registry = ClientRegistry::new();
        let healthy = RecordingSubscriber::new();
        let aborted = FailingSubscriber::new(DeliveryError::classify_message("Broken pipe"));
        let broken = FailingSubscriber::new(DeliveryError::Transport("protocol violation".into()));

        registry.register(ClientId(1), Box::new(aborted.clone())).await;
        registry.register(ClientId(2), Box::new(healthy.clone())).await;
        registry.register(ClientId(3), Box::new(broken.clone())).await;

        let payload = TelemetryPayload::new("s1", frames(0, 2));
        let fan_out = Broadcaster::default().broadcast(&registry, &payload).await;

        assert_eq!(fan_out, FanOut { attempted: 3, delivered: 1, pruned: 2 });
        assert_eq!(registry.len().await, 1);
        assert!(registry.contains(ClientId(2)).await);
        assert_eq!(healthy.payloads().len(), 1);
        assert_eq!(aborted.attempts(), 1);
        assert_eq!(broken.attempts(), 1);
        assert!(aborted.is_closed() && broken.is_closed());
    }

    #[tokio::test(start_paused = true)]
    async fn stalled_subscriber_times_out_without_blocking_others() {
        let registry = ClientRegistry::new();
        let healthy = RecordingSubscriber::new();
        registry.register(ClientId(1), Box::new(StalledSubscriber)).await;
        registry.register(ClientId(2), Box::new(healthy.clone())).await;

        let broadcaster = Broadcaster::new(Some(Duration::from_millis(50)));
        let payload = TelemetryPayload::new("s1", frames(0, 1));
        let fan_out = broadcaster.broadcast(&registry, &payload).await;

        assert_eq!(fan_out.pruned, 1);
        assert_eq!(healthy.payloads().len(), 1);
        assert!(!registry.contains(ClientId(1)).await);
    }

    #[tokio::test]
    async fn empty_registry_is_a_noop() {
        let registry = ClientRegistry::new();
        let fan_out = Broadcaster::default()
            .broadcast(&registry, &TelemetryPayload::new("s1", frames(0, 1)))
            .await;
        assert_eq!(fan_out, FanOut::default());
    }
}
