//! Snapshot storage and diff computation.

use std::collections::HashMap;

use chrono::Utc;
use lpec_protocol::EventRecord;
use tracing::{debug, warn};

use crate::event::{StateChangeEvent, VariableChange};
use crate::snapshot::VariableSnapshot;
use crate::types::DeviceId;

/// Maintains the last known variable snapshot per device and computes diffs
/// from incoming event records.
///
/// Applying a record never fails: devices are not fully trusted, so the
/// store prefers robustness over strictness. Sequence numbers that do not
/// advance are flagged as an anomaly and applied last-value-wins rather
/// than rejected.
///
/// # Example
///
/// ```
/// use lpec_protocol::parse_line;
/// use lpec_state::{DeviceId, StateStore};
///
/// let mut store = StateStore::new();
/// let device = DeviceId::new("DEVICE_2");
///
/// let lpec_protocol::Line::Event(full) =
///     parse_line(r#"EVENT 0 Ds/Receiver TransportState="Stopped""#).unwrap()
/// else { unreachable!() };
///
/// let event = store.apply(&device, &full).unwrap();
/// assert!(event.initial);
/// assert_eq!(event.new_value("TransportState"), Some("Stopped"));
/// ```
#[derive(Debug, Default)]
pub struct StateStore {
    devices: HashMap<DeviceId, VariableSnapshot>,
}

impl StateStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Get the current snapshot for a device, if one has been applied.
    pub fn snapshot(&self, device: &DeviceId) -> Option<&VariableSnapshot> {
        self.devices.get(device)
    }

    /// Number of devices with a snapshot.
    pub fn device_count(&self) -> usize {
        self.devices.len()
    }

    /// Apply an event record to a device's snapshot.
    ///
    /// A full-state record (sequence 0) replaces the snapshot wholesale; a
    /// partial record merges only the supplied variables. Returns a
    /// [`StateChangeEvent`] when at least one value differed, and always for
    /// the first full-state record (the informational initial-state event,
    /// diffed against an empty snapshot).
    pub fn apply(&mut self, device: &DeviceId, record: &EventRecord) -> Option<StateChangeEvent> {
        if let Some(snapshot) = self.devices.get(device) {
            if record.seq <= snapshot.last_seq() {
                warn!(
                    device = %device,
                    seq = record.seq,
                    last_seq = snapshot.last_seq(),
                    "sequence number did not advance, applying last-value-wins"
                );
            }
        }

        // Collapse duplicate keys within the record up front: last
        // occurrence wins, first-seen order is preserved.
        let updates = last_wins(&record.changes);

        if record.is_full_state() {
            self.apply_full(device, record.seq, updates)
        } else {
            self.apply_partial(device, record.seq, updates)
        }
    }

    fn apply_full(
        &mut self,
        device: &DeviceId,
        seq: u64,
        updates: Vec<(String, String)>,
    ) -> Option<StateChangeEvent> {
        let new_values: HashMap<String, String> = updates.iter().cloned().collect();

        if let Some(snapshot) = self.devices.get_mut(device) {
            let mut changes = Vec::new();
            for (variable, new) in updates {
                match snapshot.get(&variable) {
                    Some(old) if old == new => {}
                    old => changes.push(VariableChange {
                        old: old.map(str::to_string),
                        variable,
                        new,
                    }),
                }
            }
            for dropped in snapshot.values().keys() {
                if !new_values.contains_key(dropped) {
                    debug!(device = %device, variable = %dropped, "variable absent from full-state record, dropping");
                }
            }
            snapshot.replace(new_values, seq);

            return if changes.is_empty() {
                None
            } else {
                Some(StateChangeEvent {
                    device: device.clone(),
                    timestamp: Utc::now(),
                    seq,
                    initial: false,
                    changes,
                })
            };
        }

        // First full-state record for this device: every variable is new.
        let changes = updates
            .into_iter()
            .map(|(variable, new)| VariableChange {
                variable,
                old: None,
                new,
            })
            .collect();
        self.devices
            .insert(device.clone(), VariableSnapshot::new(new_values, seq));
        Some(StateChangeEvent {
            device: device.clone(),
            timestamp: Utc::now(),
            seq,
            initial: true,
            changes,
        })
    }

    fn apply_partial(
        &mut self,
        device: &DeviceId,
        seq: u64,
        updates: Vec<(String, String)>,
    ) -> Option<StateChangeEvent> {
        let snapshot = self
            .devices
            .entry(device.clone())
            .or_insert_with(|| VariableSnapshot::new(HashMap::new(), 0));

        let mut changes = Vec::new();
        for (variable, new) in updates {
            let old = snapshot.get(&variable).map(str::to_string);
            if old.as_deref() != Some(new.as_str()) {
                snapshot.insert(variable.clone(), new.clone());
                changes.push(VariableChange { variable, old, new });
            }
        }
        snapshot.touch(seq);

        if changes.is_empty() {
            None
        } else {
            Some(StateChangeEvent {
                device: device.clone(),
                timestamp: Utc::now(),
                seq,
                initial: false,
                changes,
            })
        }
    }
}

/// Collapse duplicate keys, keeping the last value for each and the order
/// in which keys first appeared.
fn last_wins(pairs: &[(String, String)]) -> Vec<(String, String)> {
    let mut order: Vec<&str> = Vec::new();
    let mut latest: HashMap<&str, &str> = HashMap::new();
    for (name, value) in pairs {
        if latest.insert(name.as_str(), value.as_str()).is_none() {
            order.push(name.as_str());
        }
    }
    order
        .into_iter()
        .map(|name| (name.to_string(), latest[name].to_string()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(seq: u64, pairs: &[(&str, &str)]) -> EventRecord {
        EventRecord {
            seq,
            service: "Ds/Receiver".to_string(),
            changes: pairs
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        }
    }

    fn device() -> DeviceId {
        DeviceId::new("DEVICE_2")
    }

    #[test]
    fn test_initial_full_state_emits_all_new() {
        let mut store = StateStore::new();
        let event = store
            .apply(
                &device(),
                &record(0, &[("TransportState", "Stopped"), ("Status", "Enabled")]),
            )
            .expect("initial event");

        assert!(event.initial);
        assert_eq!(event.seq, 0);
        assert_eq!(event.changes.len(), 2);
        assert!(event.changes.iter().all(|c| c.old.is_none()));
        assert_eq!(event.new_value("TransportState"), Some("Stopped"));
    }

    #[test]
    fn test_partial_merge_diffs_only_changed() {
        let mut store = StateStore::new();
        store.apply(
            &device(),
            &record(0, &[("TransportState", "Stopped"), ("Status", "Enabled")]),
        );

        let event = store
            .apply(
                &device(),
                &record(1, &[("TransportState", "Playing"), ("Status", "Enabled")]),
            )
            .expect("change event");

        assert!(!event.initial);
        assert_eq!(event.changes.len(), 1);
        assert_eq!(event.changes[0].variable, "TransportState");
        assert_eq!(event.changes[0].old.as_deref(), Some("Stopped"));
        assert_eq!(event.changes[0].new, "Playing");

        // Untouched variable survives the merge
        let snapshot = store.snapshot(&device()).unwrap();
        assert_eq!(snapshot.get("Status"), Some("Enabled"));
        assert_eq!(snapshot.last_seq(), 1);
    }

    #[test]
    fn test_partial_with_no_actual_change_emits_nothing() {
        let mut store = StateStore::new();
        store.apply(&device(), &record(0, &[("TransportState", "Stopped")]));

        let event = store.apply(&device(), &record(1, &[("TransportState", "Stopped")]));
        assert!(event.is_none());

        // But the sequence number still advances
        assert_eq!(store.snapshot(&device()).unwrap().last_seq(), 1);
    }

    #[test]
    fn test_sequential_merge_matches_final_snapshot() {
        // Applying full + partials in sequence order must equal the
        // successive merge of all updates.
        let mut store = StateStore::new();
        store.apply(&device(), &record(0, &[("A", "1"), ("B", "1")]));
        store.apply(&device(), &record(1, &[("A", "2")]));
        store.apply(&device(), &record(2, &[("B", "2"), ("C", "1")]));
        store.apply(&device(), &record(3, &[("A", "3")]));

        let snapshot = store.snapshot(&device()).unwrap();
        assert_eq!(snapshot.get("A"), Some("3"));
        assert_eq!(snapshot.get("B"), Some("2"));
        assert_eq!(snapshot.get("C"), Some("1"));
        assert_eq!(snapshot.len(), 3);
        assert_eq!(snapshot.last_seq(), 3);
    }

    #[test]
    fn test_duplicate_key_in_one_record_last_wins() {
        let mut store = StateStore::new();
        store.apply(&device(), &record(0, &[("TransportState", "Stopped")]));

        let event = store
            .apply(
                &device(),
                &record(
                    1,
                    &[
                        ("TransportState", "Buffering"),
                        ("TransportState", "Playing"),
                    ],
                ),
            )
            .expect("change event");

        // One change entry, old -> final value
        assert_eq!(event.changes.len(), 1);
        assert_eq!(event.changes[0].old.as_deref(), Some("Stopped"));
        assert_eq!(event.changes[0].new, "Playing");
        assert_eq!(
            store.snapshot(&device()).unwrap().get("TransportState"),
            Some("Playing")
        );
    }

    #[test]
    fn test_regressed_sequence_is_applied_anyway() {
        let mut store = StateStore::new();
        store.apply(&device(), &record(0, &[("A", "1")]));
        store.apply(&device(), &record(5, &[("A", "2")]));

        // seq goes backwards: anomaly, but last-value-wins
        let event = store.apply(&device(), &record(3, &[("A", "3")]));
        assert!(event.is_some());
        assert_eq!(store.snapshot(&device()).unwrap().get("A"), Some("3"));
        assert_eq!(store.snapshot(&device()).unwrap().last_seq(), 3);
    }

    #[test]
    fn test_full_state_replaces_wholesale() {
        let mut store = StateStore::new();
        store.apply(&device(), &record(0, &[("A", "1"), ("B", "1")]));
        store.apply(&device(), &record(1, &[("C", "1")]));

        // A second full-state record (device restarted its counter)
        let event = store
            .apply(&device(), &record(0, &[("A", "2")]))
            .expect("change event");

        assert!(!event.initial);
        assert_eq!(event.changes.len(), 1);
        assert_eq!(event.changes[0].old.as_deref(), Some("1"));

        let snapshot = store.snapshot(&device()).unwrap();
        assert_eq!(snapshot.get("A"), Some("2"));
        assert_eq!(snapshot.get("B"), None);
        assert_eq!(snapshot.get("C"), None);
    }

    #[test]
    fn test_initial_event_emitted_even_when_empty() {
        let mut store = StateStore::new();
        let event = store.apply(&device(), &record(0, &[]));
        let event = event.expect("initial event");
        assert!(event.initial);
        assert!(event.changes.is_empty());
    }

    #[test]
    fn test_devices_are_independent() {
        let mut store = StateStore::new();
        let d1 = DeviceId::new("DEVICE_1");
        let d2 = DeviceId::new("DEVICE_2");

        store.apply(&d1, &record(0, &[("A", "1")]));
        store.apply(&d2, &record(0, &[("A", "other")]));
        store.apply(&d1, &record(1, &[("A", "2")]));

        assert_eq!(store.snapshot(&d1).unwrap().get("A"), Some("2"));
        assert_eq!(store.snapshot(&d2).unwrap().get("A"), Some("other"));
        assert_eq!(store.device_count(), 2);
    }
}
