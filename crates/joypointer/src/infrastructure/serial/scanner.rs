//! PortScanner: candidate enumeration plus an exclusive-open filter.
//!
//! Enumeration follows the usual device-path conventions per OS:
//!
//! | OS      | Candidates                              |
//! |---------|-----------------------------------------|
//! | Windows | `COM1` … `COM256`                       |
//! | Linux   | `/dev/ttyUSB*`, `/dev/ttyACM*`          |
//! | macOS   | `/dev/tty.*`                            |
//!
//! Each candidate is then opened and immediately closed.  A candidate that
//! cannot be opened is dropped, except the port this process last owned:
//! the OS may not have released it yet, and it is still the most likely
//! place for the joystick to be.

use std::sync::Arc;

use tracing::debug;

use super::transport::SerialTransport;

/// Supplies the raw candidate list for one scan cycle.
#[cfg_attr(test, mockall::automock)]
pub trait CandidateSource: Send + Sync {
    fn candidates(&self) -> Vec<String>;
}

/// Enumerates serial device paths for the compilation target.
#[derive(Debug, Clone, Copy, Default)]
pub struct PlatformCandidates;

impl CandidateSource for PlatformCandidates {
    fn candidates(&self) -> Vec<String> {
        #[cfg(target_os = "windows")]
        {
            (1..=256).map(|n| format!("COM{n}")).collect()
        }

        #[cfg(target_os = "linux")]
        {
            dev_entries_with_prefixes(&["ttyUSB", "ttyACM"])
        }

        #[cfg(target_os = "macos")]
        {
            dev_entries_with_prefixes(&["tty."])
        }

        #[cfg(not(any(target_os = "windows", target_os = "linux", target_os = "macos")))]
        {
            Vec::new()
        }
    }
}

/// A fixed candidate list, e.g. ports pinned on the command line.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PinnedCandidates(pub Vec<String>);

impl CandidateSource for PinnedCandidates {
    fn candidates(&self) -> Vec<String> {
        self.0.clone()
    }
}

/// Lists `/dev/<prefix>*` entries, sorted so scan order is stable.
#[cfg(any(target_os = "linux", target_os = "macos"))]
fn dev_entries_with_prefixes(prefixes: &[&str]) -> Vec<String> {
    let Ok(entries) = std::fs::read_dir("/dev") else {
        return Vec::new();
    };

    let mut ports: Vec<String> = entries
        .filter_map(Result::ok)
        .filter_map(|entry| entry.file_name().into_string().ok())
        .filter(|name| prefixes.iter().any(|p| name.starts_with(p)))
        .map(|name| format!("/dev/{name}"))
        .collect();
    ports.sort();
    ports
}

/// Produces the ordered list of ports worth probing.
pub struct PortScanner {
    source: Arc<dyn CandidateSource>,
    transport: Arc<dyn SerialTransport>,
}

impl PortScanner {
    pub fn new(source: Arc<dyn CandidateSource>, transport: Arc<dyn SerialTransport>) -> Self {
        Self { source, transport }
    }

    /// Returns every candidate that can be opened exclusively, in enumeration
    /// order.  `owned` is kept even when its open fails.
    ///
    /// Never fails: an unopenable candidate is simply left out.
    pub fn scan(&self, owned: Option<&str>) -> Vec<String> {
        self.source
            .candidates()
            .into_iter()
            .filter(|port| match self.transport.open(port) {
                Ok(link) => {
                    drop(link);
                    true
                }
                Err(e) if owned == Some(port.as_str()) => {
                    debug!(port = %port, "keeping owned port despite open failure: {e}");
                    true
                }
                Err(e) => {
                    debug!(port = %port, "candidate rejected: {e}");
                    false
                }
            })
            .collect()
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::serial::mock::{FakeDevice, MockTransport};

    fn scanner(candidates: &[&str], transport: MockTransport) -> PortScanner {
        let source = PinnedCandidates(candidates.iter().map(|s| s.to_string()).collect());
        PortScanner::new(Arc::new(source), Arc::new(transport))
    }

    #[test]
    fn test_scan_keeps_openable_ports_in_order() {
        // Arrange
        let transport = MockTransport::new()
            .with_device("COM4", FakeDevice::mute())
            .with_device("COM2", FakeDevice::joystick());
        let scanner = scanner(&["COM1", "COM2", "COM3", "COM4"], transport);

        // Act
        let ports = scanner.scan(None);

        // Assert
        assert_eq!(ports, vec!["COM2".to_string(), "COM4".to_string()]);
    }

    #[test]
    fn test_scan_drops_busy_port() {
        let transport = MockTransport::new().with_device("COM2", FakeDevice::joystick().busy());
        let scanner = scanner(&["COM2"], transport);

        assert!(scanner.scan(None).is_empty());
    }

    #[test]
    fn test_scan_retains_owned_port_even_when_busy() {
        let transport = MockTransport::new().with_device("COM2", FakeDevice::joystick().busy());
        let scanner = scanner(&["COM1", "COM2"], transport);

        assert_eq!(scanner.scan(Some("COM2")), vec!["COM2".to_string()]);
    }

    #[test]
    fn test_scan_closes_every_probe_open() {
        // Arrange
        let device = FakeDevice::joystick();
        let transport = MockTransport::new().with_device("COM2", device.clone());
        let scanner = scanner(&["COM2"], transport);

        // Act
        scanner.scan(None);

        // Assert
        assert_eq!(device.opens(), 1);
        assert_eq!(device.open_links(), 0);
    }

    #[test]
    fn test_scan_asks_the_source_once_per_cycle() {
        let mut source = MockCandidateSource::new();
        source.expect_candidates().times(2).returning(Vec::new);
        let scanner = PortScanner::new(Arc::new(source), Arc::new(MockTransport::new()));

        assert!(scanner.scan(None).is_empty());
        assert!(scanner.scan(None).is_empty());
    }

    #[test]
    fn test_platform_candidates_are_sorted() {
        let ports = PlatformCandidates.candidates();
        let mut sorted = ports.clone();
        sorted.sort();
        #[cfg(not(target_os = "windows"))]
        assert_eq!(ports, sorted);
        #[cfg(target_os = "windows")]
        assert_eq!(ports.len(), 256);
    }
}
