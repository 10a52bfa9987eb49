//! Frame source trait for the relay

use crate::Result;
use crate::types::TelemetryFrame;

/// Trait for telemetry sample sources
///
/// Sources abstract over where samples come from (live shared memory, a
/// capture file). Pacing belongs to the relay driver: a source returns the
/// current sample as soon as it is asked.
#[async_trait::async_trait]
pub trait FrameSource: Send + 'static {
    /// Read the current sample
    ///
    /// Returns:
    /// - `Ok(Some(frame))` - Sample read
    /// - `Ok(None)` - Source ended (normal termination)
    /// - `Err(e)` - Read failed; the driver backs off and retries
    async fn sample(&mut self) -> Result<Option<TelemetryFrame>>;

    /// Short label used in log fields
    fn name(&self) -> &str;
}

#[async_trait::async_trait]
impl<S: FrameSource + ?Sized> FrameSource for Box<S> {
    async fn sample(&mut self) -> Result<Option<TelemetryFrame>> {
        (**self).sample().await
    }

    fn name(&self) -> &str {
        (**self).name()
    }
}
