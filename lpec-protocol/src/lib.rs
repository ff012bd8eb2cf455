//! # lpec-protocol
//!
//! A micro-crate implementing the line grammar of LPEC, the textual eventing
//! protocol exposed by Linn DS/DSM devices on port 23.
//!
//! The protocol is line-oriented. After connecting, the device announces its
//! services with `ALIVE` banner lines. A client subscribes to a service with
//! `SUBSCRIBE <service-path>`; the device echoes the command as an
//! acknowledgement and then pushes `EVENT` records:
//!
//! ```text
//! ALIVE Ds/Receiver
//! SUBSCRIBE Ds/Receiver
//! EVENT 0 Ds/Receiver TransportState="Stopped" Status="Enabled"
//! EVENT 1 Ds/Receiver TransportState="Playing"
//! ```
//!
//! The first record after subscribing carries sequence number 0 and the full
//! variable state of the service; later records carry only changed variables.
//! This crate is sans-io: it only turns one line of text into a structured
//! [`Line`], leaving connection handling to callers.

mod error;
mod parser;
mod record;

pub use error::{ParseError, Result};
pub use parser::parse_line;
pub use record::{EventRecord, Line};
