//! Structured representations of LPEC lines.

/// A single parsed line from an LPEC connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Line {
    /// `ALIVE <service>`: banner line announcing an available service.
    ///
    /// Devices emit one per service right after the TCP connection opens.
    Alive {
        /// The announced service path, e.g. `Ds/Receiver`
        service: String,
    },

    /// `SUBSCRIBE <service>`: echo of a subscribe command, confirming
    /// that the device accepted the subscription.
    SubscriptionAck {
        /// The acknowledged service path
        service: String,
    },

    /// `EVENT <seq> <service> <var>="<value>" ...`: a state notification.
    Event(EventRecord),
}

/// A parsed `EVENT` record.
///
/// The record with sequence number 0 is the full-state record: it enumerates
/// every variable the service currently exposes. Every later record is
/// partial and carries only the variables whose value changed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventRecord {
    /// Sequence number assigned by the device
    pub seq: u64,

    /// Service path the event belongs to, e.g. `Ds/Receiver`
    pub service: String,

    /// Variable/value pairs in wire order.
    ///
    /// The wire format does not forbid a variable appearing twice in one
    /// record; consumers apply pairs in order, so the last occurrence wins.
    pub changes: Vec<(String, String)>,
}

impl EventRecord {
    /// Whether this record is the initial full-state record.
    pub fn is_full_state(&self) -> bool {
        self.seq == 0
    }

    /// Look up the last value carried for a variable, if any.
    pub fn value(&self, variable: &str) -> Option<&str> {
        self.changes
            .iter()
            .rev()
            .find(|(name, _)| name == variable)
            .map(|(_, value)| value.as_str())
    }
}
