//! # lpec-monitor
//!
//! Real-time monitoring of Linn DS/DSM devices over LPEC, with an optional
//! declarative assertion engine for closing the loop against real hardware.
//!
//! The monitor opens one persistent subscription session per configured
//! device, fans every state-change event into a single ordered report sink,
//! and, when a test scenario is supplied, checks each event against a set
//! of `(device, variable, expected value, deadline)` assertions. The run
//! terminates once every assertion has passed or timed out (exit code 0 iff
//! all passed), or on an external stop signal.
//!
//! ## Usage
//!
//! ```text
//! # observe all configured devices
//! lpec-monitor --env .env
//!
//! # run a scenario and report pass/fail
//! lpec-monitor --env .env --scenario tests/play.json
//! ```

pub mod assertions;
pub mod directory;
pub mod error;
pub mod orchestrator;
pub mod scenario;
pub mod sink;

pub use assertions::{Assertion, AssertionEngine, AssertionStatus};
pub use directory::{DeviceDirectory, DeviceRole, DeviceTarget};
pub use error::{MonitorError, Result};
pub use orchestrator::{MonitorOutcome, Orchestrator};
pub use scenario::{AssertionSpec, Scenario};
pub use sink::{ConsoleSink, ReportSink};
