//! Append-only JSON lines file store

use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::trace;

use super::Store;
use crate::types::TelemetryPayload;
use crate::{HubError, Result};

/// Appends each batch to a file as one JSON document per line.
///
/// Blocking file I/O runs on the blocking thread pool.
#[derive(Debug, Clone)]
pub struct JsonLinesStore {
    path: Arc<PathBuf>,
}

impl JsonLinesStore {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self { path: Arc::new(path.as_ref().to_path_buf()) }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read every stored batch back, in write order
    pub fn read_all(&self) -> Result<Vec<TelemetryPayload>> {
        let contents = std::fs::read_to_string(self.path.as_ref())
            .map_err(|e| HubError::file_error(self.path.to_path_buf(), e))?;

        contents
            .lines()
            .filter(|line| !line.trim().is_empty())
            .map(|line| serde_json::from_str(line).map_err(HubError::from))
            .collect()
    }
}

#[async_trait::async_trait]
impl Store for JsonLinesStore {
    async fn persist(&self, batch: &TelemetryPayload) -> Result<()> {
        let mut line = serde_json::to_vec(batch)?;
        line.push(b'\n');

        let path = Arc::clone(&self.path);
        tokio::task::spawn_blocking(move || {
            let mut file = std::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(path.as_ref())
                .map_err(|e| HubError::file_error(path.to_path_buf(), e))?;
            file.write_all(&line).map_err(|e| HubError::file_error(path.to_path_buf(), e))?;
            trace!(bytes = line.len(), path = %path.display(), "Appended batch");
            Ok(())
        })
        .await
        .map_err(|e| HubError::store_error(&batch.session_id, format!("writer task failed: {e}")))?
    }
}
