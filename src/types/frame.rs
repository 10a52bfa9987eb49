//! Telemetry frame, the unit sample emitted by the producer

use serde::{Deserialize, Serialize};

/// One simulator sample.
///
/// Frames are plain values: they are copied into subscriber messages and into
/// the session buffer, never shared mutably. Pedal positions are `[0, 1]` by
/// convention but are not range-checked.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TelemetryFrame {
    /// Producer-assigned sequence number, increasing while the simulator runs
    pub packet_id: i32,
    /// Throttle pedal position
    pub gas: f32,
    /// Brake pedal position
    pub brake: f32,
    /// Fuel remaining in litres
    pub fuel: f32,
    /// Raw gear index (0 = reverse, 1 = neutral)
    pub gear: i32,
    /// Engine speed
    pub rpm: i32,
    /// Steering input
    pub steer_angle: f32,
    /// Ground speed in km/h
    pub speed_kmh: f32,
    /// Current lap time in seconds
    #[serde(default)]
    pub current_lap_time: f32,
    /// Race position
    #[serde(default)]
    pub current_position: i32,
}

impl TelemetryFrame {
    /// Gear as displayed to the driver: -1 reverse, 0 neutral, 1.. forward.
    pub fn display_gear(&self) -> i32 {
        self.gear - 1
    }
}
