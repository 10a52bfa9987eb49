//! In-process store

use std::sync::Mutex;

use super::Store;
use crate::Result;
use crate::types::TelemetryPayload;

/// Keeps persisted batches in memory, in persist order
#[derive(Debug, Default)]
pub struct MemoryStore {
    batches: Mutex<Vec<TelemetryPayload>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn batches(&self) -> Vec<TelemetryPayload> {
        self.batches.lock().map(|b| b.clone()).unwrap_or_default()
    }

    pub fn sessions(&self) -> Vec<String> {
        self.batches().into_iter().map(|b| b.session_id).collect()
    }

    pub fn len(&self) -> usize {
        self.batches.lock().map(|b| b.len()).unwrap_or_default()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait::async_trait]
impl Store for MemoryStore {
    async fn persist(&self, batch: &TelemetryPayload) -> Result<()> {
        if let Ok(mut batches) = self.batches.lock() {
            batches.push(batch.clone());
        }
        Ok(())
    }
}
