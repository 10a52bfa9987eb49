//! Producer relay: reads simulator samples and pushes them to the hub in batches

pub mod client;
pub mod pages;
pub mod replay;
mod source;

pub use client::{BatchSink, IngestClient};
pub use replay::ReplaySource;
pub use source::FrameSource;

use crate::Result;
use crate::config::SourceConfig;

/// Open the frame source named by the configuration.
///
/// Live shared memory is only available on Windows; elsewhere the relay must
/// replay a capture file.
pub fn open_source(config: &SourceConfig) -> Result<Box<dyn FrameSource>> {
    match config {
        SourceConfig::Replay { path, looped } => Ok(Box::new(ReplaySource::open(path, *looped)?)),
        SourceConfig::SharedMemory => open_shared_memory(),
    }
}

#[cfg(windows)]
fn open_shared_memory() -> Result<Box<dyn FrameSource>> {
    Ok(Box::new(crate::windows::SharedMemorySource::open()?))
}

#[cfg(not(windows))]
fn open_shared_memory() -> Result<Box<dyn FrameSource>> {
    Err(crate::HubError::unsupported_platform("Live shared memory telemetry", "Windows"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::frames;

    #[tokio::test]
    async fn opens_replay_from_config() {
        let dir = tempfile::tempdir().expect("temp dir");
        let path = dir.path().join("stint.cap");
        replay::write_capture(&path, &frames(0, 4)).expect("capture written");

        let mut source =
            open_source(&SourceConfig::Replay { path, looped: false }).expect("replay opens");
        assert_eq!(source.name(), "replay");
        assert_eq!(source.sample().await.expect("sample").map(|f| f.packet_id), Some(0));
    }

    #[cfg(not(windows))]
    #[test]
    fn shared_memory_is_windows_only() {
        let result = open_source(&SourceConfig::SharedMemory);
        assert!(matches!(result, Err(crate::HubError::UnsupportedPlatform { .. })));
    }
}
