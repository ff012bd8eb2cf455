//! Error types for the lpec-session crate.

use std::net::SocketAddr;
use std::time::Duration;

use lpec_state::DeviceId;

/// Errors that can end a session.
///
/// Every variant is scoped to one device; a session failure never
/// propagates to sessions on other devices.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// The TCP connection could not be established
    #[error("connection to {device} at {addr} failed: {source}")]
    Connection {
        /// The device the session belongs to
        device: DeviceId,
        /// The address that was dialed
        addr: SocketAddr,
        /// The underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// The TCP connection attempt exceeded the connect timeout
    #[error("connection to {device} at {addr} timed out")]
    ConnectTimeout {
        /// The device the session belongs to
        device: DeviceId,
        /// The address that was dialed
        addr: SocketAddr,
    },

    /// The device closed the connection before the subscription completed
    #[error("{device} closed the connection during subscription")]
    ClosedDuringSubscribe {
        /// The device the session belongs to
        device: DeviceId,
    },

    /// Neither the acknowledgement nor the sequence-0 full-state record
    /// arrived within the subscribe timeout
    #[error("{device} did not deliver the initial state within {timeout:?}")]
    SubscriptionTimeout {
        /// The device the session belongs to
        device: DeviceId,
        /// The configured subscribe timeout
        timeout: Duration,
    },

    /// An I/O error occurred after the session entered streaming
    #[error("i/o error while streaming from {device}: {source}")]
    Stream {
        /// The device the session belongs to
        device: DeviceId,
        /// The underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// Invalid session configuration
    #[error("configuration error: {0}")]
    Configuration(String),
}

impl SessionError {
    /// The device this error is scoped to, if any.
    pub fn device(&self) -> Option<&DeviceId> {
        match self {
            Self::Connection { device, .. }
            | Self::ConnectTimeout { device, .. }
            | Self::ClosedDuringSubscribe { device }
            | Self::SubscriptionTimeout { device, .. }
            | Self::Stream { device, .. } => Some(device),
            Self::Configuration(_) => None,
        }
    }
}

/// Convenience type alias for Results using SessionError.
pub type Result<T> = std::result::Result<T, SessionError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let error = SessionError::SubscriptionTimeout {
            device: DeviceId::new("DEVICE_2"),
            timeout: Duration::from_secs(3),
        };
        assert!(error.to_string().contains("DEVICE_2"));
        assert!(error.to_string().contains("initial state"));

        let error = SessionError::Configuration("port must be greater than 0".to_string());
        assert_eq!(
            error.to_string(),
            "configuration error: port must be greater than 0"
        );
    }

    #[test]
    fn test_error_device_scope() {
        let error = SessionError::ClosedDuringSubscribe {
            device: DeviceId::new("DEVICE_1"),
        };
        assert_eq!(error.device().map(DeviceId::as_str), Some("DEVICE_1"));

        let error = SessionError::Configuration("bad".to_string());
        assert!(error.device().is_none());
    }
}
