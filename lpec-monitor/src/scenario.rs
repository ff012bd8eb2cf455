//! Declarative test scenarios.
//!
//! A scenario is a JSON document describing the state changes a test run
//! must observe:
//!
//! ```json
//! {
//!   "name": "receivers follow the sender",
//!   "description": "issued after songcast grouping",
//!   "assertions": [
//!     { "device": "DEVICE_2", "variable": "TransportState",
//!       "value": "Playing", "within_seconds": 10.0 }
//!   ]
//! }
//! ```
//!
//! Scenarios are validated in full at load time so a malformed assertion
//! fails the run before any session starts.

use std::path::Path;

use serde::Deserialize;

use crate::directory::DeviceDirectory;
use crate::error::{MonitorError, Result};

/// A named set of assertions to evaluate against the event stream.
#[derive(Debug, Clone, Deserialize)]
pub struct Scenario {
    /// Scenario name, shown in the report header
    pub name: String,

    /// Optional free-form description
    #[serde(default)]
    pub description: Option<String>,

    /// The expectations to check
    pub assertions: Vec<AssertionSpec>,
}

/// One expected state change, as written in the scenario file.
#[derive(Debug, Clone, Deserialize)]
pub struct AssertionSpec {
    /// Device identifier from the device directory
    pub device: String,

    /// Variable name to watch, e.g. `TransportState`
    pub variable: String,

    /// Expected value (exact string equality)
    pub value: String,

    /// Relative timeout in seconds
    #[serde(default = "default_within_seconds")]
    pub within_seconds: f64,
}

fn default_within_seconds() -> f64 {
    10.0
}

/// Upper bound for assertion timeouts. Large enough for any real device
/// interaction, small enough that deadline arithmetic can never overflow.
const MAX_WITHIN_SECONDS: f64 = 3600.0;

impl Scenario {
    /// Load a scenario from a JSON file.
    pub fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path).map_err(|source| MonitorError::ScenarioIo {
            path: path.to_path_buf(),
            source,
        })?;
        let scenario: Scenario = serde_json::from_str(&contents)?;
        Ok(scenario)
    }

    /// Validate the scenario against the device directory.
    ///
    /// Checks: at least one assertion, no empty fields, timeouts strictly
    /// positive and at most `MAX_WITHIN_SECONDS`, and every referenced
    /// device present in the directory.
    pub fn validate(&self, directory: &DeviceDirectory) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(MonitorError::ScenarioValidation(
                "scenario name must not be empty".to_string(),
            ));
        }
        if self.assertions.is_empty() {
            return Err(MonitorError::ScenarioValidation(
                "scenario defines no assertions".to_string(),
            ));
        }
        for (index, assertion) in self.assertions.iter().enumerate() {
            let context = format!("assertion #{}", index + 1);
            if assertion.device.trim().is_empty() {
                return Err(MonitorError::ScenarioValidation(format!(
                    "{context}: device must not be empty"
                )));
            }
            if assertion.variable.trim().is_empty() {
                return Err(MonitorError::ScenarioValidation(format!(
                    "{context}: variable must not be empty"
                )));
            }
            if !assertion.within_seconds.is_finite() || assertion.within_seconds <= 0.0 {
                return Err(MonitorError::ScenarioValidation(format!(
                    "{context}: within_seconds must be a positive number, got {}",
                    assertion.within_seconds
                )));
            }
            if assertion.within_seconds > MAX_WITHIN_SECONDS {
                return Err(MonitorError::ScenarioValidation(format!(
                    "{context}: within_seconds must be at most {MAX_WITHIN_SECONDS}, got {}",
                    assertion.within_seconds
                )));
            }
            if !directory.contains(&assertion.device.as_str().into()) {
                return Err(MonitorError::ScenarioValidation(format!(
                    "{context}: device '{}' is not in the device directory",
                    assertion.device
                )));
            }
        }
        Ok(())
    }
}
