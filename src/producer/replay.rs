//! Replay source for capture files
//!
//! A capture file is a flat sequence of records, each one physics page
//! followed by one graphics page, laid out exactly as the simulator maps them.
//! Captures work on any platform, which makes them the way to drive a hub
//! without the simulator running.

use std::io::Write;
use std::path::Path;
use tracing::{debug, info};

use super::pages::{GRAPHICS_PAGE_LEN, PHYSICS_PAGE_LEN, pages_from_sample, sample_from_pages};
use super::source::FrameSource;
use crate::types::TelemetryFrame;
use crate::{HubError, Result};

/// Bytes per capture record
pub const RECORD_LEN: usize = PHYSICS_PAGE_LEN + GRAPHICS_PAGE_LEN;

/// Replays the samples of a capture file in order
pub struct ReplaySource {
    frames: Vec<TelemetryFrame>,
    position: usize,
    looped: bool,
}

impl ReplaySource {
    /// Load and decode a capture file
    pub fn open<P: AsRef<Path>>(path: P, looped: bool) -> Result<Self> {
        let path = path.as_ref();
        let bytes = std::fs::read(path).map_err(|e| HubError::file_error(path.to_path_buf(), e))?;
        let frames = decode_capture(&bytes)?;

        info!(path = %path.display(), frames = frames.len(), looped, "Opened capture file");
        Ok(Self::from_frames(frames, looped))
    }

    pub fn from_frames(frames: Vec<TelemetryFrame>, looped: bool) -> Self {
        Self { frames, position: 0, looped }
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    /// Index of the next record to replay
    pub fn position(&self) -> usize {
        self.position
    }
}

#[async_trait::async_trait]
impl FrameSource for ReplaySource {
    async fn sample(&mut self) -> Result<Option<TelemetryFrame>> {
        if self.position >= self.frames.len() {
            if !self.looped || self.frames.is_empty() {
                debug!("Reached end of capture");
                return Ok(None);
            }
            debug!("Capture exhausted, restarting");
            self.position = 0;
        }

        let frame = self.frames[self.position];
        self.position += 1;
        Ok(Some(frame))
    }

    fn name(&self) -> &str {
        "replay"
    }
}

/// Decode every record of a capture; a trailing partial record is an error
pub fn decode_capture(bytes: &[u8]) -> Result<Vec<TelemetryFrame>> {
    if bytes.len() % RECORD_LEN != 0 {
        return Err(HubError::decode_error(
            "capture file",
            format!("{} bytes is not a whole number of {RECORD_LEN}-byte records", bytes.len()),
        ));
    }

    bytes
        .chunks_exact(RECORD_LEN)
        .map(|record| {
            let (physics, graphics) = record.split_at(PHYSICS_PAGE_LEN);
            sample_from_pages(physics, graphics)
        })
        .collect()
}

/// Write frames out as a capture file
pub fn write_capture<P: AsRef<Path>>(path: P, frames: &[TelemetryFrame]) -> Result<()> {
    let path = path.as_ref();
    let mut bytes = Vec::with_capacity(frames.len() * RECORD_LEN);
    for frame in frames {
        let (physics, graphics) = pages_from_sample(frame);
        bytes.extend_from_slice(&physics);
        bytes.extend_from_slice(&graphics);
    }

    let mut file =
        std::fs::File::create(path).map_err(|e| HubError::file_error(path.to_path_buf(), e))?;
    file.write_all(&bytes).map_err(|e| HubError::file_error(path.to_path_buf(), e))
}
