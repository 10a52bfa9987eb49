//! Live telemetry distribution for racing simulators.
//!
//! Paddock moves simulator samples from a producer relay to live dashboards and
//! to a durable store. Dashboards see every payload as soon as it is ingested;
//! the store receives session-scoped batches of up to a thousand frames.
//!
//! # Features
//!
//! - **Hub**: one control loop serializes subscriber churn and ingest
//! - **Fan-out**: a slow or dead dashboard is pruned, never waited on forever
//! - **Bounded persistence**: a full store queue drops batches instead of
//!   stalling live delivery
//! - **Relay**: shared memory sampling on Windows, capture replay anywhere
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use paddock::{HubConfig, LogStore, Paddock};
//!
//! #[tokio::main]
//! async fn main() -> paddock::Result<()> {
//!     let config = HubConfig::default();
//!     let hub = Paddock::hub(&config, LogStore);
//!
//!     let listener = tokio::net::TcpListener::bind(&config.listen_addr).await?;
//!     hub.serve(listener, async {
//!         let _ = tokio::signal::ctrl_c().await;
//!     })
//!     .await?;
//!
//!     let report = hub.shutdown().await;
//!     println!("persisted {} batches", report.worker.persisted);
//!     Ok(())
//! }
//! ```

// Core types and error handling
mod error;
#[cfg_attr(any(test, feature = "benchmark"), path = "test_utils.rs")]
#[cfg(any(test, feature = "benchmark"))]
pub mod test_utils;
pub mod config;
pub mod types;

// Distribution hub and its surfaces
pub mod hub;
pub mod server;
pub mod store;

// Producer relay
pub mod connection;
pub mod driver;
pub mod producer;
pub mod stream;

// Platform-specific modules
#[cfg(windows)]
pub mod windows;

// Core exports
pub use config::{DrainPolicy, HubConfig, OverflowPolicy, PaddockConfig, RelayConfig};
pub use error::*;
pub use types::*;

// Hub exports
pub use connection::{HubReport, HubService, RelayConnection};
pub use hub::{HubHandle, HubStats, Subscriber};
pub use store::{JsonLinesStore, LogStore, MemoryStore, Store};

/// Unified entry point for hub and relay services.
///
/// # Examples
///
/// ## Hub with a JSON lines store
/// ```rust,no_run
/// use paddock::{HubConfig, JsonLinesStore, Paddock};
///
/// # #[tokio::main]
/// # async fn main() -> paddock::Result<()> {
/// let hub = Paddock::hub(&HubConfig::default(), JsonLinesStore::new("batches.jsonl"));
/// let report = hub.shutdown().await;
/// # Ok(())
/// # }
/// ```
///
/// ## Relay replaying a capture
/// ```rust,no_run
/// use paddock::{Paddock, RelayConfig};
/// use paddock::config::SourceConfig;
///
/// # #[tokio::main]
/// # async fn main() -> paddock::Result<()> {
/// let config = RelayConfig {
///     source: SourceConfig::Replay { path: "stint.cap".into(), looped: false },
///     ..RelayConfig::default()
/// };
/// let relay = Paddock::relay(&config)?;
/// let stats = relay.finished().await;
/// println!("pushed {} batches", stats.batches_sent);
/// # Ok(())
/// # }
/// ```
pub struct Paddock;

impl Paddock {
    /// Start a hub persisting into `store`.
    ///
    /// Spawns the control loop and the persistence worker on the current
    /// runtime. Call [`HubService::serve`] to expose it over HTTP.
    pub fn hub<S: Store>(config: &HubConfig, store: S) -> HubService {
        HubService::start(config, store)
    }

    /// Start a relay from configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - Live shared memory is requested off Windows
    /// - The simulator is not running
    /// - A replay capture cannot be read or decoded
    /// - The HTTP client cannot be built
    pub fn relay(config: &RelayConfig) -> Result<RelayConnection> {
        RelayConnection::connect(config)
    }
}
