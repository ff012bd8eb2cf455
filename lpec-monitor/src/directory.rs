//! The device directory: which devices to monitor and where they live.
//!
//! The directory is a dotenv-style file shared with the surrounding
//! command tooling:
//!
//! ```text
//! DEVICE_1=172.24.32.211 4c494e4e-0026-0f22-5661-01531488013f Living Room
//! DEVICE_2=172.24.32.210 4c494e4e-0026-0f22-646e-01560511013f
//! SONGCAST_SENDER=DEVICE_1
//! SONGCAST_RECEIVERS=DEVICE_2
//! ```
//!
//! The monitor observes the sender plus all receivers. Devices defined but
//! not referenced by a role key are ignored.

use std::net::IpAddr;
use std::path::Path;

use lpec_state::DeviceId;
use serde::Serialize;
use tracing::{debug, warn};

use crate::error::{MonitorError, Result};

/// Role a device plays in the Songcast group under test.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum DeviceRole {
    /// The device sending the audio stream
    Sender,
    /// A device receiving the stream
    Receiver,
}

/// One monitorable device, as supplied by the external directory.
#[derive(Debug, Clone)]
pub struct DeviceTarget {
    /// Operator-facing identifier (the directory key, e.g. `DEVICE_1`)
    pub id: DeviceId,
    /// Network address of the device
    pub ip: IpAddr,
    /// UPnP unique device name, kept for cross-referencing with the
    /// command tooling
    pub udn: String,
    /// Optional display name
    pub name: Option<String>,
    /// Role in the monitored group
    pub role: DeviceRole,
}

/// The resolved set of devices to monitor.
#[derive(Debug, Clone, Default)]
pub struct DeviceDirectory {
    targets: Vec<DeviceTarget>,
}

impl DeviceDirectory {
    /// Load and resolve a directory file.
    pub fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path).map_err(|source| MonitorError::DirectoryIo {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse(&contents)
    }

    /// Parse directory file contents.
    ///
    /// Blank lines and `#` comments (full-line or inline) are ignored.
    /// Malformed device entries are rejected rather than skipped, so a typo
    /// fails the run before any session starts.
    pub fn parse(contents: &str) -> Result<Self> {
        struct RawDevice {
            key: String,
            ip: IpAddr,
            udn: String,
            name: Option<String>,
        }

        let mut devices: Vec<RawDevice> = Vec::new();
        let mut sender_id: Option<String> = None;
        let mut receiver_ids: Vec<String> = Vec::new();

        for raw in contents.lines() {
            let line = match raw.split_once('#') {
                Some((before, _)) => before.trim(),
                None => raw.trim(),
            };
            if line.is_empty() {
                continue;
            }
            let Some((key, value)) = line.split_once('=') else {
                continue;
            };
            let key = key.trim();
            let value = value.trim();

            if key.starts_with("DEVICE") {
                let mut parts = value.split_whitespace();
                let ip_token = parts.next().ok_or_else(|| MonitorError::InvalidDevice {
                    key: key.to_string(),
                    reason: "expected '<ip> <udn> [name]'".to_string(),
                })?;
                let ip: IpAddr = ip_token.parse().map_err(|_| MonitorError::InvalidDevice {
                    key: key.to_string(),
                    reason: format!("'{ip_token}' is not a valid IP address"),
                })?;
                let udn = parts
                    .next()
                    .ok_or_else(|| MonitorError::InvalidDevice {
                        key: key.to_string(),
                        reason: "missing UDN".to_string(),
                    })?
                    .to_string();
                let rest: Vec<&str> = parts.collect();
                let name = if rest.is_empty() {
                    None
                } else {
                    Some(rest.join(" "))
                };
                devices.push(RawDevice {
                    key: key.to_string(),
                    ip,
                    udn,
                    name,
                });
            } else if matches!(key, "SONGCAST_SENDER" | "SONGCAST_MASTER") {
                sender_id = Some(value.to_string());
            } else if matches!(key, "SONGCAST_RECEIVERS" | "SONGCAST_MEMBERS") {
                receiver_ids = value
                    .split(',')
                    .map(str::trim)
                    .filter(|id| !id.is_empty())
                    .map(str::to_string)
                    .collect();
            }
        }

        let mut targets = Vec::new();
        let mut push = |id: &str, role: DeviceRole| {
            match devices.iter().find(|d| d.key == id) {
                Some(device) => targets.push(DeviceTarget {
                    id: DeviceId::new(&device.key),
                    ip: device.ip,
                    udn: device.udn.clone(),
                    name: device.name.clone(),
                    role,
                }),
                None => warn!(device = %id, "role references an undefined device, skipping"),
            }
        };

        if let Some(id) = &sender_id {
            push(id, DeviceRole::Sender);
        }
        for id in &receiver_ids {
            push(id, DeviceRole::Receiver);
        }

        for device in &devices {
            if !sender_id.as_deref().is_some_and(|s| s == device.key)
                && !receiver_ids.iter().any(|r| r == &device.key)
            {
                debug!(device = %device.key, "defined but not referenced by any role, ignoring");
            }
        }

        Ok(Self { targets })
    }

    /// The devices to monitor, sender first.
    pub fn targets(&self) -> &[DeviceTarget] {
        &self.targets
    }

    /// Look up a device by its identifier.
    pub fn get(&self, id: &DeviceId) -> Option<&DeviceTarget> {
        self.targets.iter().find(|t| &t.id == id)
    }

    /// Whether the directory contains a device with this identifier.
    pub fn contains(&self, id: &DeviceId) -> bool {
        self.get(id).is_some()
    }

    /// The sender device, if one was configured.
    pub fn sender(&self) -> Option<&DeviceTarget> {
        self.targets.iter().find(|t| t.role == DeviceRole::Sender)
    }

    /// Number of monitorable devices.
    pub fn len(&self) -> usize {
        self.targets.len()
    }

    /// Whether the directory resolved to zero devices.
    pub fn is_empty(&self) -> bool {
        self.targets.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const SAMPLE: &str = "\
# test rig
DEVICE_1=172.24.32.211 4c494e4e-0026-0f22-5661-01531488013f Living Room
DEVICE_2=172.24.32.210 4c494e4e-0026-0f22-646e-01560511013f  # main receiver
DEVICE_3=172.24.32.212 4c494e4e-0026-0f22-3637-01475230013f

SONGCAST_SENDER=DEVICE_1
SONGCAST_RECEIVERS=DEVICE_2,DEVICE_3
";

    #[test]
    fn test_parse_sample_directory() {
        let directory = DeviceDirectory::parse(SAMPLE).unwrap();
        assert_eq!(directory.len(), 3);

        let sender = directory.sender().unwrap();
        assert_eq!(sender.id.as_str(), "DEVICE_1");
        assert_eq!(sender.ip.to_string(), "172.24.32.211");
        assert_eq!(sender.name.as_deref(), Some("Living Room"));

        let d2 = directory.get(&DeviceId::new("DEVICE_2")).unwrap();
        assert_eq!(d2.role, DeviceRole::Receiver);
        assert_eq!(d2.udn, "4c494e4e-0026-0f22-646e-01560511013f");
        assert!(d2.name.is_none());
    }

    #[test]
    fn test_sender_listed_first() {
        let directory = DeviceDirectory::parse(SAMPLE).unwrap();
        assert_eq!(directory.targets()[0].role, DeviceRole::Sender);
    }

    #[test]
    fn test_unreferenced_devices_are_ignored() {
        let contents = "\
DEVICE_1=10.0.0.1 udn-1
DEVICE_2=10.0.0.2 udn-2
SONGCAST_RECEIVERS=DEVICE_2
";
        let directory = DeviceDirectory::parse(contents).unwrap();
        assert_eq!(directory.len(), 1);
        assert!(!directory.contains(&DeviceId::new("DEVICE_1")));
    }

    #[test]
    fn test_unknown_role_reference_is_skipped() {
        let contents = "\
DEVICE_1=10.0.0.1 udn-1
SONGCAST_SENDER=DEVICE_1
SONGCAST_RECEIVERS=DEVICE_9
";
        let directory = DeviceDirectory::parse(contents).unwrap();
        assert_eq!(directory.len(), 1);
    }

    #[test]
    fn test_no_role_keys_yields_empty_directory() {
        let directory = DeviceDirectory::parse("DEVICE_1=10.0.0.1 udn-1\n").unwrap();
        assert!(directory.is_empty());
    }

    #[test]
    fn test_invalid_ip_is_rejected() {
        let error = DeviceDirectory::parse("DEVICE_1=not-an-ip udn-1\n").unwrap_err();
        assert!(matches!(error, MonitorError::InvalidDevice { .. }));
    }

    #[test]
    fn test_missing_udn_is_rejected() {
        let error = DeviceDirectory::parse("DEVICE_1=10.0.0.1\n").unwrap_err();
        assert!(matches!(error, MonitorError::InvalidDevice { .. }));
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(SAMPLE.as_bytes()).unwrap();

        let directory = DeviceDirectory::load(file.path()).unwrap();
        assert_eq!(directory.len(), 3);
    }

    #[test]
    fn test_load_missing_file() {
        let error = DeviceDirectory::load(Path::new("/nonexistent/.env")).unwrap_err();
        assert!(matches!(error, MonitorError::DirectoryIo { .. }));
    }
}
