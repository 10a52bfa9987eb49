//! Store that only logs batches

use tracing::info;

use super::Store;
use crate::Result;
use crate::types::TelemetryPayload;

/// Logs a summary of every batch and keeps nothing.
///
/// Useful during development and as the default when no durable backend is
/// configured.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogStore;

#[async_trait::async_trait]
impl Store for LogStore {
    async fn persist(&self, batch: &TelemetryPayload) -> Result<()> {
        let first = batch.frames.first().map(|f| f.packet_id);
        let last = batch.frames.last().map(|f| f.packet_id);
        info!(
            session = %batch.session_id,
            frames = batch.len(),
            first_packet = ?first,
            last_packet = ?last,
            "Persisted batch"
        );
        Ok(())
    }
}
