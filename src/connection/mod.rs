//! Long-running services assembled from the hub and relay parts

pub mod hub;
pub mod relay;

pub use hub::{HubReport, HubService};
pub use relay::RelayConnection;
