//! Error types for the telemetry hub and producer relay.
//!
//! All errors implement `std::error::Error` and carry enough structured context
//! to decide whether the failing operation is worth retrying.
//!
//! ## Error Categories
//!
//! - **Decode Errors**: Malformed ingest batches, short shared-memory pages
//! - **Configuration Errors**: Invalid or unreadable configuration files
//! - **Channel Errors**: The hub or the persistence worker has shut down
//! - **Transport Errors**: HTTP push or subscriber socket failures
//! - **Store Errors**: The durable store rejected a batch
//! - **Platform Errors**: Shared memory and Windows API failures
//!
//! Failures inside the hub's control loop are never surfaced through this type;
//! the loop logs and carries on. `HubError` is what callers *around* the hub see.
//!
//! ```rust
//! use paddock::HubError;
//!
//! let error = HubError::transport_failed("hub returned 502 Bad Gateway");
//! if error.is_retryable() {
//!     for suggestion in error.recovery_suggestions() {
//!         println!("  - {}", suggestion);
//!     }
//! }
//! ```

use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

#[cfg(windows)]
use windows_core as core;

/// Result type alias for hub operations.
pub type Result<T, E = HubError> = std::result::Result<T, E>;

/// Main error type for hub and relay operations.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum HubError {
    #[error("Decode error in {context}: {details}")]
    Decode { context: String, details: String },

    #[error("Invalid configuration: {reason}")]
    Config {
        reason: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    #[error("File error: {path}")]
    File {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Hub control loop is no longer running")]
    HubClosed,

    #[error("Persistence queue is closed")]
    QueueClosed,

    #[error("Transport failure: {reason}")]
    Transport {
        reason: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    #[error("Store rejected batch for session '{session_id}': {reason}")]
    Store { session_id: String, reason: String },

    #[error("Shared memory segment '{name}' unavailable")]
    SharedMemory { name: String },

    #[error("Operation timed out after {duration:?}")]
    Timeout { duration: Duration },

    #[error("{feature} is only available on {required_platform}")]
    UnsupportedPlatform { feature: String, required_platform: String },

    #[error("Windows API error: {operation}")]
    #[cfg(windows)]
    WindowsApi {
        operation: String,
        #[source]
        source: core::Error,
    },
}

impl HubError {
    /// Returns whether this error is potentially recoverable through retry.
    pub fn is_retryable(&self) -> bool {
        match self {
            HubError::Transport { .. } => true,
            HubError::Timeout { .. } => true,
            HubError::Store { .. } => true,
            HubError::SharedMemory { .. } => true,
            HubError::Decode { .. } => false,
            HubError::Config { .. } => false,
            HubError::File { .. } => false,
            HubError::HubClosed => false,
            HubError::QueueClosed => false,
            HubError::UnsupportedPlatform { .. } => false,
            #[cfg(windows)]
            HubError::WindowsApi { .. } => true,
        }
    }

    /// Returns suggested recovery actions for this error.
    pub fn recovery_suggestions(&self) -> Vec<&'static str> {
        match self {
            HubError::Decode { .. } => vec![
                "Send the batch as a JSON array of frames",
                "Check the frame field names and numeric types",
                "Pass the lap number as an integer query parameter",
            ],
            HubError::Config { .. } => vec![
                "Check the YAML syntax of the configuration file",
                "Use positive values for thresholds, capacities and intervals",
            ],
            HubError::File { .. } => vec![
                "Check the file exists and is readable",
                "Check file permissions",
                "Ensure sufficient disk space",
            ],
            HubError::HubClosed => vec![
                "The hub has shut down; restart the process",
                "Check the logs for the shutdown reason",
            ],
            HubError::QueueClosed => vec![
                "The persistence worker has stopped; restart the hub",
                "Check the store configuration",
            ],
            HubError::Transport { .. } => vec![
                "Check the hub is running and reachable",
                "Verify the configured hub URL",
                "Check network connectivity",
            ],
            HubError::Store { .. } => vec![
                "Check the durable store is reachable",
                "Verify store credentials and disk space",
            ],
            HubError::SharedMemory { .. } => vec![
                "Ensure the simulator is running",
                "Start a session so the shared memory pages are created",
            ],
            HubError::Timeout { .. } => vec![
                "Increase the timeout duration",
                "Check system and network performance",
            ],
            HubError::UnsupportedPlatform { .. } => vec![
                "Use the replay source on this platform",
                "Run the relay on the simulator machine",
            ],
            #[cfg(windows)]
            HubError::WindowsApi { .. } => vec![
                "Check Windows API permissions",
                "Verify the simulator is running under the same user",
            ],
        }
    }

    /// Helper constructor for decode errors.
    pub fn decode_error(context: impl Into<String>, details: impl Into<String>) -> Self {
        HubError::Decode { context: context.into(), details: details.into() }
    }

    /// Helper constructor for configuration errors.
    pub fn config_error(reason: impl Into<String>) -> Self {
        HubError::Config { reason: reason.into(), source: None }
    }

    /// Helper constructor for configuration errors with source.
    pub fn config_error_with_source(
        reason: impl Into<String>,
        source: Box<dyn std::error::Error + Send + Sync>,
    ) -> Self {
        HubError::Config { reason: reason.into(), source: Some(source) }
    }

    /// Helper constructor for file errors with path context.
    pub fn file_error(path: PathBuf, source: std::io::Error) -> Self {
        HubError::File { path, source }
    }

    /// Helper constructor for transport errors.
    pub fn transport_failed(reason: impl Into<String>) -> Self {
        HubError::Transport { reason: reason.into(), source: None }
    }

    /// Helper constructor for transport errors with source.
    pub fn transport_failed_with_source(
        reason: impl Into<String>,
        source: Box<dyn std::error::Error + Send + Sync>,
    ) -> Self {
        HubError::Transport { reason: reason.into(), source: Some(source) }
    }

    /// Helper constructor for store errors.
    pub fn store_error(session_id: impl Into<String>, reason: impl Into<String>) -> Self {
        HubError::Store { session_id: session_id.into(), reason: reason.into() }
    }

    /// Helper constructor for Windows API errors.
    #[cfg(windows)]
    pub fn windows_api_error(operation: impl Into<String>, source: core::Error) -> Self {
        HubError::WindowsApi { operation: operation.into(), source }
    }

    /// Helper constructor for unsupported platform errors.
    pub fn unsupported_platform(
        feature: impl Into<String>,
        required_platform: impl Into<String>,
    ) -> Self {
        HubError::UnsupportedPlatform {
            feature: feature.into(),
            required_platform: required_platform.into(),
        }
    }
}

impl From<std::io::Error> for HubError {
    fn from(err: std::io::Error) -> Self {
        HubError::File { path: PathBuf::from("<unknown>"), source: err }
    }
}

impl From<serde_json::Error> for HubError {
    fn from(err: serde_json::Error) -> Self {
        HubError::Decode { context: "JSON".to_string(), details: err.to_string() }
    }
}

impl From<reqwest::Error> for HubError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            return HubError::transport_failed_with_source("request timed out", Box::new(err));
        }
        HubError::transport_failed_with_source("HTTP request failed", Box::new(err))
    }
}

#[cfg(windows)]
impl From<core::Error> for HubError {
    fn from(err: core::Error) -> Self {
        HubError::WindowsApi { operation: "Unknown Windows operation".to_string(), source: err }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        #[test]
        fn error_messages_carry_their_context(
            reason in ".*",
            session in "\\w+",
            context in "\\w+",
            details in ".*",
            duration_ms in 1u64..60000u64
        ) {
            let transport = HubError::transport_failed(reason.clone());
            let store = HubError::store_error(session.clone(), reason.clone());
            let decode = HubError::decode_error(context.clone(), details.clone());
            let timeout = HubError::Timeout { duration: Duration::from_millis(duration_ms) };

            prop_assert!(transport.to_string().contains(&reason));
            prop_assert!(store.to_string().contains(&session));
            prop_assert!(decode.to_string().contains(&context));
            prop_assert!(decode.to_string().contains(&details));
            prop_assert!(!timeout.to_string().is_empty());
        }

        #[test]
        fn source_chain_preserves_base_message(base_message in ".*") {
            let inner: Box<dyn std::error::Error + Send + Sync> =
                Box::new(std::io::Error::other(base_message.clone()));
            let top = HubError::transport_failed_with_source("push failed", inner);

            let source = std::error::Error::source(&top);
            prop_assert!(source.is_some());
            prop_assert_eq!(source.map(|s| s.to_string()), Some(base_message));
        }
    }

    #[test]
    fn error_traits_validation() {
        fn assert_send_sync_static<T: Send + Sync + 'static>() {}
        assert_send_sync_static::<HubError>();

        let error = HubError::HubClosed;
        let _: &dyn std::error::Error = &error;
    }

    #[test]
    fn retry_classification() {
        assert!(HubError::transport_failed("down").is_retryable());
        assert!(HubError::store_error("s1", "disk full").is_retryable());
        assert!(!HubError::decode_error("ingest", "bad json").is_retryable());
        assert!(!HubError::HubClosed.is_retryable());
        assert!(!HubError::config_error("zero threshold").is_retryable());

        for error in [
            HubError::transport_failed("down"),
            HubError::QueueClosed,
            HubError::SharedMemory { name: "Local\\acpmf_physics".to_string() },
        ] {
            let suggestions = error.recovery_suggestions();
            assert!(!suggestions.is_empty());
            assert!(suggestions.iter().all(|s| s.len() > 5));
        }
    }

    #[test]
    fn from_conversions_work() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "capture.bin");
        match HubError::from(io_err) {
            HubError::File { source, .. } => assert_eq!(source.to_string(), "capture.bin"),
            other => panic!("Expected File error variant, got {other:?}"),
        }

        let json_err = serde_json::from_str::<Vec<i32>>("{").unwrap_err();
        assert!(matches!(HubError::from(json_err), HubError::Decode { .. }));
    }
}
