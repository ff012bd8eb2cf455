//! Error types for the lpec-monitor crate.

use std::path::PathBuf;

/// Fatal monitor errors.
///
/// All of these abort the run before any session starts; runtime failures
/// on individual devices are handled inside the sessions and never surface
/// here.
#[derive(Debug, thiserror::Error)]
pub enum MonitorError {
    /// The device directory resolved to zero monitorable devices
    #[error("no monitorable devices configured in the device directory")]
    NoDevices,

    /// The device directory file could not be read
    #[error("failed to read device directory {path}: {source}")]
    DirectoryIo {
        /// The directory file
        path: PathBuf,
        /// The underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// A device entry in the directory was malformed
    #[error("invalid device entry '{key}': {reason}")]
    InvalidDevice {
        /// The offending directory key
        key: String,
        /// What was wrong with it
        reason: String,
    },

    /// The scenario file could not be read
    #[error("failed to read scenario {path}: {source}")]
    ScenarioIo {
        /// The scenario file
        path: PathBuf,
        /// The underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// The scenario file was not valid JSON of the expected shape
    #[error("invalid scenario JSON: {0}")]
    ScenarioFormat(#[from] serde_json::Error),

    /// The scenario parsed but failed schema validation
    #[error("invalid scenario: {0}")]
    ScenarioValidation(String),

    /// Invalid session configuration
    #[error("configuration error: {0}")]
    Configuration(String),
}

/// Convenience type alias for Results using MonitorError.
pub type Result<T> = std::result::Result<T, MonitorError>;
