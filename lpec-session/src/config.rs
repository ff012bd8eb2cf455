//! Configuration for LPEC sessions.

use std::time::Duration;

use crate::error::{Result, SessionError};

/// Configuration shared by every session the monitor opens.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// TCP port the device exposes LPEC on
    /// Default: 23
    pub port: u16,

    /// Service path to subscribe to
    /// Default: "Ds/Receiver"
    pub service_path: String,

    /// Timeout for establishing the TCP connection
    /// Default: 5 seconds
    pub connect_timeout: Duration,

    /// Window to drain the ALIVE banner after connecting
    /// Default: 2 seconds
    pub banner_timeout: Duration,

    /// Timeout for the subscribe acknowledgement and the sequence-0
    /// full-state record
    /// Default: 3 seconds
    pub subscribe_timeout: Duration,

    /// Timeout for each read in the streaming loop. A timeout is not an
    /// error; it bounds how long a cancellation signal can go unobserved.
    /// Default: 1 second
    pub read_timeout: Duration,

    /// Log heartbeat reads and no-change events at debug level
    /// Default: false
    pub log_heartbeats: bool,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            port: 23,
            service_path: "Ds/Receiver".to_string(),
            connect_timeout: Duration::from_secs(5),
            banner_timeout: Duration::from_secs(2),
            subscribe_timeout: Duration::from_secs(3),
            read_timeout: Duration::from_secs(1),
            log_heartbeats: false,
        }
    }
}

impl SessionConfig {
    /// Create a new SessionConfig with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Validate the configuration and return any issues.
    pub fn validate(&self) -> Result<()> {
        if self.port == 0 {
            return Err(SessionError::Configuration(
                "port must be greater than 0".to_string(),
            ));
        }
        if self.service_path.trim().is_empty() {
            return Err(SessionError::Configuration(
                "service path must not be empty".to_string(),
            ));
        }
        if self.service_path.contains(char::is_whitespace) {
            return Err(SessionError::Configuration(
                "service path must not contain whitespace".to_string(),
            ));
        }
        for (name, value) in [
            ("connect timeout", self.connect_timeout),
            ("subscribe timeout", self.subscribe_timeout),
            ("read timeout", self.read_timeout),
        ] {
            if value == Duration::ZERO {
                return Err(SessionError::Configuration(format!(
                    "{name} must be greater than 0"
                )));
            }
        }
        Ok(())
    }

    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    pub fn with_service_path(mut self, service_path: impl Into<String>) -> Self {
        self.service_path = service_path.into();
        self
    }

    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    pub fn with_subscribe_timeout(mut self, timeout: Duration) -> Self {
        self.subscribe_timeout = timeout;
        self
    }

    pub fn with_read_timeout(mut self, timeout: Duration) -> Self {
        self.read_timeout = timeout;
        self
    }

    pub fn with_heartbeat_logging(mut self, enabled: bool) -> Self {
        self.log_heartbeats = enabled;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = SessionConfig::default();
        assert_eq!(config.port, 23);
        assert_eq!(config.service_path, "Ds/Receiver");
        assert_eq!(config.read_timeout, Duration::from_secs(1));
        assert!(!config.log_heartbeats);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_validation() {
        let invalid = SessionConfig::default().with_port(0);
        assert!(invalid.validate().is_err());

        let invalid = SessionConfig::default().with_service_path("");
        assert!(invalid.validate().is_err());

        let invalid = SessionConfig::default().with_service_path("Ds /Receiver");
        assert!(invalid.validate().is_err());

        let invalid = SessionConfig::default().with_read_timeout(Duration::ZERO);
        assert!(invalid.validate().is_err());
    }

    #[test]
    fn test_builder_pattern() {
        let config = SessionConfig::new()
            .with_port(2323)
            .with_service_path("Ds/Product")
            .with_read_timeout(Duration::from_millis(250))
            .with_heartbeat_logging(true);

        assert_eq!(config.port, 2323);
        assert_eq!(config.service_path, "Ds/Product");
        assert_eq!(config.read_timeout, Duration::from_millis(250));
        assert!(config.log_heartbeats);
        assert!(config.validate().is_ok());
    }
}
