//! Fixed-offset parsers for the simulator's shared-memory pages.
//!
//! The simulator publishes two pages that matter here: a physics page updated
//! every physics step and a graphics page carrying session state. Both are
//! little-endian C structs; only the leading fields are read, so the page
//! lengths below are the minimum block sizes the parsers accept rather than
//! the full struct sizes.

use tracing::debug;

use crate::types::TelemetryFrame;
use crate::{HubError, Result};

/// Bytes of the physics page read by [`PhysicsPage::parse`]
pub const PHYSICS_PAGE_LEN: usize = 32;

/// Bytes of the graphics page read by [`GraphicsPage::parse`]
pub const GRAPHICS_PAGE_LEN: usize = 144;

mod physics {
    pub const PACKET_ID: usize = 0;
    pub const GAS: usize = 4;
    pub const BRAKE: usize = 8;
    pub const FUEL: usize = 12;
    pub const GEAR: usize = 16;
    pub const RPMS: usize = 20;
    pub const STEER_ANGLE: usize = 24;
    pub const SPEED_KMH: usize = 28;
}

mod graphics {
    pub const PACKET_ID: usize = 0;
    pub const STATUS: usize = 4;
    pub const SESSION: usize = 8;
    pub const COMPLETED_LAPS: usize = 132;
    pub const POSITION: usize = 136;
    pub const CURRENT_TIME_MS: usize = 140;
}

/// Simulator run state from the graphics page
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SimStatus {
    #[default]
    Off,
    Replay,
    Live,
    Pause,
    Unknown(i32),
}

impl From<i32> for SimStatus {
    fn from(value: i32) -> Self {
        match value {
            0 => SimStatus::Off,
            1 => SimStatus::Replay,
            2 => SimStatus::Live,
            3 => SimStatus::Pause,
            other => SimStatus::Unknown(other),
        }
    }
}

impl From<SimStatus> for i32 {
    fn from(status: SimStatus) -> Self {
        match status {
            SimStatus::Off => 0,
            SimStatus::Replay => 1,
            SimStatus::Live => 2,
            SimStatus::Pause => 3,
            SimStatus::Unknown(other) => other,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct PhysicsPage {
    pub packet_id: i32,
    pub gas: f32,
    pub brake: f32,
    pub fuel: f32,
    pub gear: i32,
    pub rpms: i32,
    pub steer_angle: f32,
    pub speed_kmh: f32,
}

impl PhysicsPage {
    pub fn parse(block: &[u8]) -> Result<Self> {
        check_len("physics page", block, PHYSICS_PAGE_LEN)?;
        Ok(Self {
            packet_id: read_i32(block, physics::PACKET_ID),
            gas: read_f32(block, physics::GAS),
            brake: read_f32(block, physics::BRAKE),
            fuel: read_f32(block, physics::FUEL),
            gear: read_i32(block, physics::GEAR),
            rpms: read_i32(block, physics::RPMS),
            steer_angle: read_f32(block, physics::STEER_ANGLE),
            speed_kmh: read_f32(block, physics::SPEED_KMH),
        })
    }

    /// Lay the page out as the simulator would
    pub fn encode(&self) -> [u8; PHYSICS_PAGE_LEN] {
        let mut block = [0u8; PHYSICS_PAGE_LEN];
        write(&mut block, physics::PACKET_ID, self.packet_id.to_le_bytes());
        write(&mut block, physics::GAS, self.gas.to_le_bytes());
        write(&mut block, physics::BRAKE, self.brake.to_le_bytes());
        write(&mut block, physics::FUEL, self.fuel.to_le_bytes());
        write(&mut block, physics::GEAR, self.gear.to_le_bytes());
        write(&mut block, physics::RPMS, self.rpms.to_le_bytes());
        write(&mut block, physics::STEER_ANGLE, self.steer_angle.to_le_bytes());
        write(&mut block, physics::SPEED_KMH, self.speed_kmh.to_le_bytes());
        block
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct GraphicsPage {
    pub packet_id: i32,
    pub status: SimStatus,
    pub session: i32,
    pub completed_laps: i32,
    pub position: i32,
    pub current_time_ms: i32,
}

impl GraphicsPage {
    pub fn parse(block: &[u8]) -> Result<Self> {
        check_len("graphics page", block, GRAPHICS_PAGE_LEN)?;
        Ok(Self {
            packet_id: read_i32(block, graphics::PACKET_ID),
            status: SimStatus::from(read_i32(block, graphics::STATUS)),
            session: read_i32(block, graphics::SESSION),
            completed_laps: read_i32(block, graphics::COMPLETED_LAPS),
            position: read_i32(block, graphics::POSITION),
            current_time_ms: read_i32(block, graphics::CURRENT_TIME_MS),
        })
    }

    pub fn encode(&self) -> [u8; GRAPHICS_PAGE_LEN] {
        let mut block = [0u8; GRAPHICS_PAGE_LEN];
        write(&mut block, graphics::PACKET_ID, self.packet_id.to_le_bytes());
        write(&mut block, graphics::STATUS, i32::from(self.status).to_le_bytes());
        write(&mut block, graphics::SESSION, self.session.to_le_bytes());
        write(&mut block, graphics::COMPLETED_LAPS, self.completed_laps.to_le_bytes());
        write(&mut block, graphics::POSITION, self.position.to_le_bytes());
        write(&mut block, graphics::CURRENT_TIME_MS, self.current_time_ms.to_le_bytes());
        block
    }
}

/// Build one frame from a pair of captured page blocks.
///
/// The physics packet id identifies the sample; lap time is converted from
/// milliseconds to seconds.
pub fn sample_from_pages(physics: &[u8], graphics: &[u8]) -> Result<TelemetryFrame> {
    let physics = PhysicsPage::parse(physics)?;
    let graphics = GraphicsPage::parse(graphics)?;

    // A torn read can yield NaN or infinity, which JSON cannot carry
    let floats = [physics.gas, physics.brake, physics.fuel, physics.steer_angle, physics.speed_kmh];
    if floats.iter().any(|v| !v.is_finite()) {
        debug!(packet_id = physics.packet_id, "Zeroing non-finite physics fields");
    }

    Ok(TelemetryFrame {
        packet_id: physics.packet_id,
        gas: finite(physics.gas),
        brake: finite(physics.brake),
        fuel: finite(physics.fuel),
        gear: physics.gear,
        rpm: physics.rpms,
        steer_angle: finite(physics.steer_angle),
        speed_kmh: finite(physics.speed_kmh),
        current_lap_time: graphics.current_time_ms as f32 / 1000.0,
        current_position: graphics.position,
    })
}

fn finite(value: f32) -> f32 {
    if value.is_finite() { value } else { 0.0 }
}

/// Inverse of [`sample_from_pages`], used to write capture files
pub fn pages_from_sample(frame: &TelemetryFrame) -> ([u8; PHYSICS_PAGE_LEN], [u8; GRAPHICS_PAGE_LEN]) {
    let physics = PhysicsPage {
        packet_id: frame.packet_id,
        gas: frame.gas,
        brake: frame.brake,
        fuel: frame.fuel,
        gear: frame.gear,
        rpms: frame.rpm,
        steer_angle: frame.steer_angle,
        speed_kmh: frame.speed_kmh,
    };
    let graphics = GraphicsPage {
        packet_id: frame.packet_id,
        status: SimStatus::Live,
        position: frame.current_position,
        current_time_ms: (frame.current_lap_time * 1000.0).round() as i32,
        ..GraphicsPage::default()
    };
    (physics.encode(), graphics.encode())
}

fn check_len(context: &str, block: &[u8], required: usize) -> Result<()> {
    if block.len() < required {
        return Err(HubError::decode_error(
            context,
            format!("block is {} bytes, need at least {required}", block.len()),
        ));
    }
    Ok(())
}

fn read_i32(block: &[u8], offset: usize) -> i32 {
    i32::from_le_bytes(word(block, offset))
}

fn read_f32(block: &[u8], offset: usize) -> f32 {
    f32::from_le_bytes(word(block, offset))
}

// Callers have already checked the block length
fn word(block: &[u8], offset: usize) -> [u8; 4] {
    let mut bytes = [0u8; 4];
    bytes.copy_from_slice(&block[offset..offset + 4]);
    bytes
}

fn write(block: &mut [u8], offset: usize, bytes: [u8; 4]) {
    block[offset..offset + 4].copy_from_slice(&bytes);
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn parses_physics_fields_at_fixed_offsets() {
        let mut block = vec![0u8; 800];
        block[0..4].copy_from_slice(&42i32.to_le_bytes());
        block[4..8].copy_from_slice(&0.75f32.to_le_bytes());
        block[8..12].copy_from_slice(&0.1f32.to_le_bytes());
        block[12..16].copy_from_slice(&33.5f32.to_le_bytes());
        block[16..20].copy_from_slice(&4i32.to_le_bytes());
        block[20..24].copy_from_slice(&7200i32.to_le_bytes());
        block[24..28].copy_from_slice(&(-0.2f32).to_le_bytes());
        block[28..32].copy_from_slice(&187.4f32.to_le_bytes());

        let page = PhysicsPage::parse(&block).expect("block is long enough");
        assert_eq!(page.packet_id, 42);
        assert_eq!(page.gas, 0.75);
        assert_eq!(page.brake, 0.1);
        assert_eq!(page.fuel, 33.5);
        assert_eq!(page.gear, 4);
        assert_eq!(page.rpms, 7200);
        assert_eq!(page.steer_angle, -0.2);
        assert_eq!(page.speed_kmh, 187.4);
    }

    #[test]
    fn parses_graphics_fields_at_fixed_offsets() {
        let mut block = vec![0u8; GRAPHICS_PAGE_LEN];
        block[4..8].copy_from_slice(&2i32.to_le_bytes());
        block[132..136].copy_from_slice(&3i32.to_le_bytes());
        block[136..140].copy_from_slice(&5i32.to_le_bytes());
        block[140..144].copy_from_slice(&83_456i32.to_le_bytes());

        let page = GraphicsPage::parse(&block).expect("block is long enough");
        assert_eq!(page.status, SimStatus::Live);
        assert_eq!(page.completed_laps, 3);
        assert_eq!(page.position, 5);
        assert_eq!(page.current_time_ms, 83_456);
    }

    #[test]
    fn short_blocks_are_decode_errors() {
        let physics = PhysicsPage::parse(&[0u8; PHYSICS_PAGE_LEN - 1]);
        assert!(matches!(physics, Err(HubError::Decode { .. })));

        let graphics = GraphicsPage::parse(&[0u8; 16]);
        assert!(matches!(graphics, Err(HubError::Decode { .. })));
    }

    #[test]
    fn sample_converts_lap_time_to_seconds() {
        let (physics, mut graphics) = pages_from_sample(&TelemetryFrame::default());
        graphics[140..144].copy_from_slice(&61_500i32.to_le_bytes());

        let frame = sample_from_pages(&physics, &graphics).expect("valid pages");
        assert_eq!(frame.current_lap_time, 61.5);
    }

    #[test]
    fn non_finite_floats_are_zeroed() {
        let frame = TelemetryFrame { gas: 0.5, speed_kmh: 120.0, ..TelemetryFrame::default() };
        let (mut physics, graphics) = pages_from_sample(&frame);
        physics[8..12].copy_from_slice(&f32::NAN.to_le_bytes());
        physics[28..32].copy_from_slice(&f32::INFINITY.to_le_bytes());

        let parsed = sample_from_pages(&physics, &graphics).expect("valid pages");
        assert_eq!(parsed.brake, 0.0);
        assert_eq!(parsed.speed_kmh, 0.0);
        assert_eq!(parsed.gas, 0.5);

        // The whole batch still serializes and decodes on the hub side
        let json = serde_json::to_string(&vec![parsed]).expect("frames serialize");
        let decoded: Vec<TelemetryFrame> = serde_json::from_str(&json).expect("frames decode");
        assert_eq!(decoded, vec![parsed]);
    }

    #[test]
    fn unknown_status_is_preserved() {
        assert_eq!(SimStatus::from(9), SimStatus::Unknown(9));
        assert_eq!(i32::from(SimStatus::Unknown(9)), 9);
    }

    proptest! {
        #[test]
        fn physics_fields_survive_page_layout(
            packet_id in any::<i32>(),
            gear in 0i32..8,
            rpm in 0i32..20_000,
            gas in 0.0f32..=1.0,
            speed in 0.0f32..400.0,
        ) {
            let frame = TelemetryFrame { packet_id, gear, rpm, gas, speed_kmh: speed, ..TelemetryFrame::default() };
            let (physics, graphics) = pages_from_sample(&frame);
            let parsed = sample_from_pages(&physics, &graphics).expect("encoded pages are valid");
            prop_assert_eq!(parsed, frame);
        }
    }
}
