//! Websocket subscribers

use axum::extract::ws::{Message, WebSocket};
use axum::extract::{Path, State, WebSocketUpgrade};
use axum::response::IntoResponse;
use futures::stream::SplitSink;
use futures::{SinkExt, StreamExt};
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{debug, warn};

use super::AppState;
use crate::hub::{DeliveryError, HubHandle, Subscriber};

/// Inbound frames from dashboards are never meaningful; keep them tiny
const MAX_INBOUND_MESSAGE: usize = 4 * 1024;

const CLOSE_TIMEOUT: Duration = Duration::from_millis(500);

/// The sending half of a dashboard's websocket
pub struct WebSocketSubscriber {
    sink: Mutex<SplitSink<WebSocket, Message>>,
}

impl WebSocketSubscriber {
    pub fn new(sink: SplitSink<WebSocket, Message>) -> Self {
        Self { sink: Mutex::new(sink) }
    }
}

#[async_trait::async_trait]
impl Subscriber for WebSocketSubscriber {
    async fn deliver(&self, message: &str) -> Result<(), DeliveryError> {
        let mut sink = self.sink.lock().await;
        sink.send(Message::Text(message.to_owned().into()))
            .await
            .map_err(|e| DeliveryError::classify(&e))
    }

    async fn close(&self) {
        // Runs on the control loop; a peer that stopped reading must not hold it
        let closing = async {
            let mut sink = self.sink.lock().await;
            sink.close().await
        };
        match tokio::time::timeout(CLOSE_TIMEOUT, closing).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => debug!(error = %e, "Websocket already gone at close"),
            Err(_) => debug!("Websocket close frame not flushed in time"),
        }
    }
}

/// `GET /ws`
pub async fn subscribe(State(state): State<AppState>, ws: WebSocketUpgrade) -> impl IntoResponse {
    upgrade(ws, state.handle, None)
}

/// `GET /ws/{session}`; the label only tags log lines, every subscriber sees every payload
pub async fn subscribe_session(
    State(state): State<AppState>,
    Path(session): Path<String>,
    ws: WebSocketUpgrade,
) -> impl IntoResponse {
    upgrade(ws, state.handle, Some(session))
}

fn upgrade(ws: WebSocketUpgrade, handle: HubHandle, label: Option<String>) -> impl IntoResponse {
    ws.max_message_size(MAX_INBOUND_MESSAGE)
        .on_upgrade(move |socket| handle_socket(socket, handle, label))
}

async fn handle_socket(socket: WebSocket, handle: HubHandle, label: Option<String>) {
    let (sink, mut inbound) = socket.split();

    let id = match handle.register(Box::new(WebSocketSubscriber::new(sink))).await {
        Ok(id) => id,
        Err(e) => {
            warn!(error = %e, "Refusing subscriber, hub is closed");
            return;
        }
    };
    debug!(client = %id, label = ?label, "Subscriber socket open");

    // Server-push only: drain inbound frames until the peer goes away
    while let Some(message) = inbound.next().await {
        match message {
            Ok(Message::Close(frame)) => {
                debug!(client = %id, code = ?frame.map(|f| f.code), "Subscriber sent close");
                break;
            }
            Ok(_) => {}
            Err(e) => {
                debug!(client = %id, error = %e, "Subscriber read failed");
                break;
            }
        }
    }

    // A socket already pruned by fan-out is an unknown id and ignored
    let _ = handle.unregister(id).await;
    debug!(client = %id, "Subscriber socket closed");
}
