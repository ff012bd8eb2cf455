//! The last known full variable state of one device.

use std::collections::HashMap;

use chrono::{DateTime, Utc};

/// The last known complete set of tracked variables for one device.
///
/// Mutated only by [`StateStore::apply`], in sequence-number order as
/// records arrive from the device's connection.
///
/// [`StateStore::apply`]: crate::StateStore::apply
#[derive(Debug, Clone)]
pub struct VariableSnapshot {
    values: HashMap<String, String>,
    last_seq: u64,
    updated_at: DateTime<Utc>,
}

impl VariableSnapshot {
    pub(crate) fn new(values: HashMap<String, String>, seq: u64) -> Self {
        Self {
            values,
            last_seq: seq,
            updated_at: Utc::now(),
        }
    }

    /// Get the current value of a variable.
    pub fn get(&self, variable: &str) -> Option<&str> {
        self.values.get(variable).map(String::as_str)
    }

    /// The sequence number of the last applied event record.
    pub fn last_seq(&self) -> u64 {
        self.last_seq
    }

    /// When the snapshot was last modified.
    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    /// Number of tracked variables.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Whether the snapshot tracks no variables.
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Iterate over all tracked variables and their values.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.values.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub(crate) fn values(&self) -> &HashMap<String, String> {
        &self.values
    }

    pub(crate) fn replace(&mut self, values: HashMap<String, String>, seq: u64) {
        self.values = values;
        self.touch(seq);
    }

    pub(crate) fn insert(&mut self, variable: String, value: String) {
        self.values.insert(variable, value);
    }

    pub(crate) fn touch(&mut self, seq: u64) {
        self.last_seq = seq;
        self.updated_at = Utc::now();
    }
}
