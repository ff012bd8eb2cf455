//! # lpec-session
//!
//! One persistent LPEC subscription per device: connect, subscribe, stream.
//!
//! A [`Session`] owns a single TCP connection to one device, performs the
//! subscribe handshake, and then feeds every parsed event record through a
//! [`StateStore`], forwarding the resulting state-change events into a
//! shared fan-in channel. Its lifecycle is an explicit state machine
//! (`Idle → Connecting → Subscribing → Streaming → {Closed, Failed}`)
//! published through a watch channel so an orchestrator can observe it
//! without polling.
//!
//! Failures are isolated: a session that cannot connect or loses its peer
//! transitions to a terminal state and reports the error, but never affects
//! sessions on other devices. There is no automatic reconnection; a dead
//! session stays dead until the operator restarts the monitor.
//!
//! [`StateStore`]: lpec_state::StateStore

mod config;
mod error;
mod session;
mod state;

pub use config::SessionConfig;
pub use error::{Result, SessionError};
pub use session::{Session, SessionHandle};
pub use state::SessionState;
