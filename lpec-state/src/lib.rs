//! # lpec-state
//!
//! State tracking for LPEC event streams: keeps the last known full variable
//! snapshot per device and turns incoming full/partial [`EventRecord`]s into
//! [`StateChangeEvent`]s describing exactly which variables changed.
//!
//! The store follows a single-writer-per-device discipline: each device's
//! session owns the store it applies events to, so snapshots are never read
//! concurrently with a mutation.
//!
//! [`EventRecord`]: lpec_protocol::EventRecord

mod event;
mod snapshot;
mod store;
mod types;

pub use event::{StateChangeEvent, VariableChange};
pub use snapshot::VariableSnapshot;
pub use store::StateStore;
pub use types::DeviceId;
