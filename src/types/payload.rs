//! Named batches of frames exchanged at every boundary of the hub

use serde::{Deserialize, Serialize};
use std::fmt;

use super::TelemetryFrame;

/// A session-tagged, ordered batch of frames.
///
/// Frame order is arrival order and is preserved through fan-out and
/// persistence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TelemetryPayload {
    pub session_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lap: Option<i32>,
    #[serde(rename = "data")]
    pub frames: Vec<TelemetryFrame>,
}

impl TelemetryPayload {
    /// Create a payload without a lap number
    pub fn new(session_id: impl Into<String>, frames: Vec<TelemetryFrame>) -> Self {
        Self { session_id: session_id.into(), lap: None, frames }
    }

    /// Attach a lap number
    pub fn with_lap(mut self, lap: Option<i32>) -> Self {
        self.lap = lap;
        self
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }
}

/// Identity of a registered subscriber connection.
///
/// Issued by the hub handle; the registry never interprets it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ClientId(pub u64);

impl fmt::Display for ClientId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "client-{}", self.0)
    }
}
