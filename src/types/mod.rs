//! Core types for telemetry exchange.
//!
//! - [`TelemetryFrame`] is one simulator sample, a plain value type
//! - [`TelemetryPayload`] is a session-tagged batch of frames, the unit of
//!   exchange at ingest, fan-out and persistence
//! - [`ClientId`] identifies a live subscriber connection
//!
//! ## Usage Example
//!
//! ```rust
//! use paddock::types::{TelemetryFrame, TelemetryPayload};
//!
//! let frame = TelemetryFrame { packet_id: 1, speed_kmh: 212.5, gear: 6, ..Default::default() };
//! let payload = TelemetryPayload::new("monza_race", vec![frame]).with_lap(Some(3));
//!
//! let json = serde_json::to_string(&payload).unwrap();
//! assert!(json.contains("\"sessionId\":\"monza_race\""));
//! ```

mod frame;
mod payload;

pub use frame::TelemetryFrame;
pub use payload::{ClientId, TelemetryPayload};
