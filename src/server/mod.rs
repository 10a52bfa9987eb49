//! HTTP surface of the hub
//!
//! | Route               | Purpose                                        |
//! |---------------------|------------------------------------------------|
//! | `GET /health`       | Liveness probe, always `OK`                    |
//! | `POST /ingest`      | Frame batch from the producer relay            |
//! | `GET /ws`           | Websocket subscriber, one JSON text per payload|
//! | `GET /ws/{session}` | Same, with a label for logs                    |

mod ingest;
mod ws;

pub use ingest::{IngestError, IngestQuery, ingest};
pub use ws::{WebSocketSubscriber, subscribe, subscribe_session};

use axum::Router;
use axum::routing::{get, post};
use std::future::Future;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::info;

use crate::hub::HubHandle;
use crate::{HubError, Result};

/// Shared state handed to every route
#[derive(Clone)]
pub struct AppState {
    pub handle: HubHandle,
    /// Session used when an ingest request names none
    pub default_session: Arc<str>,
}

impl AppState {
    pub fn new(handle: HubHandle, default_session: impl Into<Arc<str>>) -> Self {
        Self { handle, default_session: default_session.into() }
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/ingest", post(ingest))
        .route("/ws", get(subscribe))
        .route("/ws/{session}", get(subscribe_session))
        .with_state(state)
}

async fn health() -> &'static str {
    "OK"
}

/// Serve until `shutdown` resolves, then finish in-flight requests
pub async fn serve<F>(listener: TcpListener, state: AppState, shutdown: F) -> Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let addr = listener.local_addr()?;
    info!(%addr, "Hub listening");

    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown)
        .await
        .map_err(|e| HubError::transport_failed_with_source("HTTP server failed", Box::new(e)))?;

    info!("HTTP server stopped");
    Ok(())
}
