//! State change event types.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::types::DeviceId;

/// One variable transition inside a [`StateChangeEvent`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VariableChange {
    /// The variable that changed
    pub variable: String,
    /// The previous value, or `None` if the variable was not yet known
    pub old: Option<String>,
    /// The new value
    pub new: String,
}

/// A state change detected while applying an event record to a device's
/// snapshot.
///
/// The change set contains exactly the variables whose value differs between
/// the snapshot before and after the triggering record. Events are immutable
/// once created; they fan in to the output sink and the assertion engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StateChangeEvent {
    /// The device whose state changed
    pub device: DeviceId,
    /// When the change was applied
    pub timestamp: DateTime<Utc>,
    /// Sequence number of the triggering event record
    pub seq: u64,
    /// Whether this is the informational initial-state event (the first
    /// full-state record, diffed against an empty snapshot)
    pub initial: bool,
    /// The variables that changed, in wire order
    pub changes: Vec<VariableChange>,
}

impl StateChangeEvent {
    /// Look up the new value this event carries for a variable, if any.
    pub fn new_value(&self, variable: &str) -> Option<&str> {
        self.changes
            .iter()
            .rev()
            .find(|change| change.variable == variable)
            .map(|change| change.new.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> StateChangeEvent {
        StateChangeEvent {
            device: DeviceId::new("DEVICE_2"),
            timestamp: Utc::now(),
            seq: 2,
            initial: false,
            changes: vec![VariableChange {
                variable: "TransportState".to_string(),
                old: Some("Buffering".to_string()),
                new: "Playing".to_string(),
            }],
        }
    }

    #[test]
    fn test_new_value_lookup() {
        let event = sample();
        assert_eq!(event.new_value("TransportState"), Some("Playing"));
        assert_eq!(event.new_value("Status"), None);
    }

    #[test]
    fn test_serializes_to_json() {
        let event = sample();
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["device"], "DEVICE_2");
        assert_eq!(json["seq"], 2);
        assert_eq!(json["changes"][0]["new"], "Playing");
    }
}
