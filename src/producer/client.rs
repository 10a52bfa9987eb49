//! HTTP push of frame batches to the hub

use reqwest::Client;
use tracing::{debug, trace};

use crate::config::RelayConfig;
use crate::types::TelemetryFrame;
use crate::{HubError, Result};

/// Destination for relay batches
#[async_trait::async_trait]
pub trait BatchSink: Send + Sync + 'static {
    async fn push(&self, batch: Vec<TelemetryFrame>) -> Result<()>;
}

#[async_trait::async_trait]
impl<S: BatchSink + ?Sized> BatchSink for std::sync::Arc<S> {
    async fn push(&self, batch: Vec<TelemetryFrame>) -> Result<()> {
        (**self).push(batch).await
    }
}

/// POSTs batches to the hub's ingest endpoint
#[derive(Debug, Clone)]
pub struct IngestClient {
    http: Client,
    endpoint: String,
    session_id: String,
    lap: Option<i32>,
}

impl IngestClient {
    pub fn new(config: &RelayConfig) -> Result<Self> {
        let http = Client::builder().timeout(config.request_timeout()).build()?;
        let endpoint = format!("{}/ingest", config.hub_url.trim_end_matches('/'));

        Ok(Self { http, endpoint, session_id: config.session_id.clone(), lap: config.lap })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    fn query(&self) -> Vec<(&'static str, String)> {
        let mut query = vec![("session_id", self.session_id.clone())];
        if let Some(lap) = self.lap {
            query.push(("lap", lap.to_string()));
        }
        query
    }
}

#[async_trait::async_trait]
impl BatchSink for IngestClient {
    async fn push(&self, batch: Vec<TelemetryFrame>) -> Result<()> {
        trace!(endpoint = %self.endpoint, frames = batch.len(), "Pushing batch");

        let response =
            self.http.post(&self.endpoint).query(&self.query()).json(&batch).send().await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(HubError::transport_failed(format!(
                "hub answered {status}: {}",
                body.trim()
            )));
        }

        debug!(frames = batch.len(), "Batch accepted by hub");
        Ok(())
    }
}
