//! Hub and relay configuration.
//!
//! Configuration is read from a YAML document. Every field has a default, so an
//! empty document (or no file at all) yields a working hub listening on port
//! 5000 with the reference tuning: flush every 1000 frames, at most 100 pending
//! batches, 20-frame producer batches sampled every 100 ms.
//!
//! ```yaml
//! hub:
//!   listen_addr: 0.0.0.0:5000
//!   flush_threshold: 1000
//!   queue_capacity: 100
//!   overflow: drop        # or: wait
//!   drain: flush          # or: discard
//!   delivery_timeout_ms: 2000
//!   store:
//!     kind: json_lines
//!     path: /var/lib/paddock/batches.jsonl
//! relay:
//!   hub_url: http://localhost:5000
//!   session_id: live_session_1
//!   batch_size: 20
//!   sample_interval_ms: 100
//!   source:
//!     kind: replay
//!     path: captures/monza.bin
//! ```

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::{HubError, Result};

/// Environment variable naming the configuration file
pub const CONFIG_ENV_VAR: &str = "PADDOCK_CONFIG";

/// Top-level configuration document
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PaddockConfig {
    pub hub: HubConfig,
    pub relay: RelayConfig,
}

impl PaddockConfig {
    /// Parse and validate a YAML configuration document
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        // An empty document deserializes to unit, not to an empty mapping
        if yaml.trim().is_empty() {
            return Ok(Self::default());
        }

        let config: PaddockConfig = serde_yaml_ng::from_str(yaml).map_err(|e| {
            HubError::config_error_with_source("failed to parse configuration YAML", Box::new(e))
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a YAML file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let yaml = std::fs::read_to_string(path)
            .map_err(|e| HubError::file_error(path.to_path_buf(), e))?;
        Self::from_yaml(&yaml)
    }

    /// Load from the file named by `PADDOCK_CONFIG`, or defaults when unset
    pub fn from_env() -> Result<Self> {
        match std::env::var_os(CONFIG_ENV_VAR) {
            Some(path) => Self::load(PathBuf::from(path)),
            None => Ok(Self::default()),
        }
    }

    pub fn validate(&self) -> Result<()> {
        self.hub.validate()?;
        self.relay.validate()
    }
}

/// What the control loop does when the persistence queue is full
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OverflowPolicy {
    /// Drop the flushed batch and log a warning; ingest is never delayed
    #[default]
    Drop,
    /// Wait for the store worker to free a slot, delaying ingest
    Wait,
}

/// What happens to a non-empty session buffer when the hub shuts down
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DrainPolicy {
    /// Hand the partial buffer to the persistence queue
    #[default]
    Flush,
    /// Discard the partial buffer
    Discard,
}

/// Durable store backend
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum StoreConfig {
    /// Log each batch and discard it
    #[default]
    Log,
    /// Append each batch as one JSON line
    JsonLines { path: PathBuf },
}

/// Hub tuning
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HubConfig {
    pub listen_addr: String,
    /// Buffered frames that trigger a flush
    pub flush_threshold: usize,
    /// Pending batches the persistence queue holds
    pub queue_capacity: usize,
    /// Pending control-loop events before ingest callers wait
    pub event_capacity: usize,
    pub overflow: OverflowPolicy,
    pub drain: DrainPolicy,
    /// Per-subscriber delivery timeout; `None` waits indefinitely
    pub delivery_timeout_ms: Option<u64>,
    /// Session used when an ingest request names none
    pub default_session: String,
    pub store: StoreConfig,
}

impl Default for HubConfig {
    fn default() -> Self {
        Self {
            listen_addr: "0.0.0.0:5000".to_string(),
            flush_threshold: 1000,
            queue_capacity: 100,
            event_capacity: 256,
            overflow: OverflowPolicy::Drop,
            drain: DrainPolicy::Flush,
            delivery_timeout_ms: Some(2000),
            default_session: "default_session".to_string(),
            store: StoreConfig::Log,
        }
    }
}

impl HubConfig {
    pub fn delivery_timeout(&self) -> Option<Duration> {
        self.delivery_timeout_ms.map(Duration::from_millis)
    }

    pub fn validate(&self) -> Result<()> {
        if self.flush_threshold == 0 {
            return Err(HubError::config_error("hub.flush_threshold must be positive"));
        }
        if self.queue_capacity == 0 {
            return Err(HubError::config_error("hub.queue_capacity must be positive"));
        }
        if self.event_capacity == 0 {
            return Err(HubError::config_error("hub.event_capacity must be positive"));
        }
        if self.delivery_timeout_ms == Some(0) {
            return Err(HubError::config_error("hub.delivery_timeout_ms must be positive"));
        }
        if self.default_session.is_empty() {
            return Err(HubError::config_error("hub.default_session must not be empty"));
        }
        Ok(())
    }
}

/// Where the relay reads frames from
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SourceConfig {
    /// The simulator's live shared memory pages (Windows only)
    #[default]
    SharedMemory,
    /// A capture file of recorded pages
    Replay {
        path: PathBuf,
        #[serde(default)]
        looped: bool,
    },
}

/// Producer relay tuning
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RelayConfig {
    pub hub_url: String,
    pub session_id: String,
    pub lap: Option<i32>,
    /// Frames per network push
    pub batch_size: usize,
    pub sample_interval_ms: u64,
    pub request_timeout_ms: u64,
    pub source: SourceConfig,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            hub_url: "http://localhost:5000".to_string(),
            session_id: "live_session_1".to_string(),
            lap: None,
            batch_size: 20,
            sample_interval_ms: 100,
            request_timeout_ms: 5000,
            source: SourceConfig::SharedMemory,
        }
    }
}

impl RelayConfig {
    pub fn sample_interval(&self) -> Duration {
        Duration::from_millis(self.sample_interval_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    pub fn validate(&self) -> Result<()> {
        if self.batch_size == 0 {
            return Err(HubError::config_error("relay.batch_size must be positive"));
        }
        if self.sample_interval_ms == 0 {
            return Err(HubError::config_error("relay.sample_interval_ms must be positive"));
        }
        if self.request_timeout_ms == 0 {
            return Err(HubError::config_error("relay.request_timeout_ms must be positive"));
        }
        if self.session_id.is_empty() {
            return Err(HubError::config_error("relay.session_id must not be empty"));
        }
        if !self.hub_url.starts_with("http://") && !self.hub_url.starts_with("https://") {
            return Err(HubError::config_error(format!(
                "relay.hub_url must be an http(s) URL, got '{}'",
                self.hub_url
            )));
        }
        Ok(())
    }
}
