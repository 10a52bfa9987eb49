//! Live simulator shared memory access
//!
//! The simulator publishes its physics and graphics pages as named file
//! mappings. Each sample copies both pages out of shared memory and parses the
//! copies, so a torn read can at worst mix two consecutive simulator steps.
//!
//! # Usage
//!
//! ```rust,ignore
//! use paddock::windows::SharedMemorySource;
//! use paddock::producer::FrameSource;
//!
//! let mut source = SharedMemorySource::open()?;
//! if let Some(frame) = source.sample().await? {
//!     println!("packet {} at {} km/h", frame.packet_id, frame.speed_kmh);
//! }
//! ```

mod connection;

pub use connection::{GRAPHICS_MAPPING, PHYSICS_MAPPING, SharedPage};

use tracing::info;

use crate::Result;
use crate::producer::FrameSource;
use crate::producer::pages::{GRAPHICS_PAGE_LEN, PHYSICS_PAGE_LEN, sample_from_pages};
use crate::types::TelemetryFrame;

/// Samples the live physics and graphics pages
pub struct SharedMemorySource {
    physics: SharedPage,
    graphics: SharedPage,
}

impl SharedMemorySource {
    /// Map both pages; fails when the simulator is not running
    pub fn open() -> Result<Self> {
        let physics = SharedPage::open(PHYSICS_MAPPING, PHYSICS_PAGE_LEN)?;
        let graphics = SharedPage::open(GRAPHICS_MAPPING, GRAPHICS_PAGE_LEN)?;
        info!("Connected to simulator shared memory");
        Ok(Self { physics, graphics })
    }
}

#[async_trait::async_trait]
impl FrameSource for SharedMemorySource {
    async fn sample(&mut self) -> Result<Option<TelemetryFrame>> {
        let physics = self.physics.snapshot();
        let graphics = self.graphics.snapshot();
        sample_from_pages(&physics, &graphics).map(Some)
    }

    fn name(&self) -> &str {
        "shared_memory"
    }
}
