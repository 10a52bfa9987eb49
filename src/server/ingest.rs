//! `POST /ingest`

use axum::body::Bytes;
use axum::extract::rejection::QueryRejection;
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Deserialize;
use thiserror::Error;
use tracing::{debug, warn};

use super::AppState;
use crate::types::{TelemetryFrame, TelemetryPayload};

#[derive(Debug, Deserialize)]
pub struct IngestQuery {
    pub session_id: Option<String>,
    pub lap: Option<i32>,
}

/// Rejections are all-or-nothing: nothing reaches the hub
#[derive(Debug, Error)]
pub enum IngestError {
    #[error("invalid query parameters: {0}")]
    Query(String),

    #[error("invalid frame batch: {0}")]
    Body(String),

    #[error("hub is shutting down")]
    Unavailable,
}

impl IntoResponse for IngestError {
    fn into_response(self) -> Response {
        let status = match self {
            IngestError::Query(_) | IngestError::Body(_) => StatusCode::BAD_REQUEST,
            IngestError::Unavailable => StatusCode::SERVICE_UNAVAILABLE,
        };
        (status, self.to_string()).into_response()
    }
}

/// Decode a batch of frames and hand it to the control loop
pub async fn ingest(
    State(state): State<AppState>,
    query: Result<Query<IngestQuery>, QueryRejection>,
    body: Bytes,
) -> Result<StatusCode, IngestError> {
    let Query(query) = query.map_err(|e| {
        debug!(error = %e, "Rejected ingest query");
        IngestError::Query(e.body_text())
    })?;

    let frames: Vec<TelemetryFrame> = serde_json::from_slice(&body).map_err(|e| {
        debug!(error = %e, bytes = body.len(), "Rejected ingest body");
        IngestError::Body(e.to_string())
    })?;

    let session_id = query
        .session_id
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| state.default_session.to_string());
    let payload = TelemetryPayload::new(session_id, frames).with_lap(query.lap);

    debug!(session = %payload.session_id, lap = ?payload.lap, frames = payload.len(), "Ingested batch");

    state.handle.publish(payload).await.map_err(|e| {
        warn!(error = %e, "Ingest while hub is closed");
        IngestError::Unavailable
    })?;

    Ok(StatusCode::OK)
}
