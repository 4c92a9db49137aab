//! Byte-stream transport seam.
//!
//! The rest of the crate talks to serial ports only through the two traits
//! here, so the scanner, prober, and supervisor can be driven by the fake
//! device in [`super::mock`] in tests and by [`super::native`] in production.

use std::time::Duration;

use thiserror::Error;

/// Baud rate the joystick firmware is built for.
pub const DEFAULT_BAUD_RATE: u32 = 9600;

/// Per-call timeout at the transport layer.
pub const DEFAULT_TRANSPORT_TIMEOUT: Duration = Duration::from_secs(2);

/// Errors raised by the byte-stream layer.
#[derive(Debug, Error)]
pub enum TransportError {
    /// The port could not be opened (missing, busy, or permission denied).
    #[error("failed to open {port}: {reason}")]
    Open { port: String, reason: String },

    /// Port parameters could not be applied.
    #[error("failed to configure {port}: {reason}")]
    Configure { port: String, reason: String },

    /// A read failed for a reason other than the bounded wait expiring.
    #[error("read from {port} failed: {source}")]
    Read {
        port: String,
        #[source]
        source: std::io::Error,
    },

    /// A write failed or timed out.
    #[error("write to {port} failed: {source}")]
    Write {
        port: String,
        #[source]
        source: std::io::Error,
    },
}

/// Fixed line parameters.  Data bits, parity, stop bits, and flow control are
/// always 8-N-1 with no flow control; only the rate and timeout vary.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LinkSettings {
    pub baud_rate: u32,
    pub timeout: Duration,
}

impl Default for LinkSettings {
    fn default() -> Self {
        Self {
            baud_rate: DEFAULT_BAUD_RATE,
            timeout: DEFAULT_TRANSPORT_TIMEOUT,
        }
    }
}

/// One exclusively opened serial endpoint.  Dropping it closes the port.
pub trait SerialLink: Send {
    /// Path the link was opened on.
    fn port(&self) -> &str;

    /// Discards anything already sitting in the receive buffer.
    fn clear_input(&mut self) -> Result<(), TransportError>;

    /// Writes all of `bytes` and flushes.
    fn write_all(&mut self, bytes: &[u8]) -> Result<(), TransportError>;

    /// Waits at most `wait` for data and reads what is available into `buf`.
    ///
    /// Returns `Ok(0)` when the wait expires with nothing received.
    fn read_available(&mut self, buf: &mut [u8], wait: Duration) -> Result<usize, TransportError>;
}

/// Opens serial links by path.
pub trait SerialTransport: Send + Sync {
    /// Opens `port` exclusively.
    fn open(&self, port: &str) -> Result<Box<dyn SerialLink>, TransportError>;
}

/// Upper bound on a single [`drain_available`] call.
const MAX_DRAIN_LEN: usize = 4096;

/// Reads everything currently buffered on `link` without waiting, up to
/// 4 KiB.
///
/// Returns the raw bytes so callers decide how to interpret them.
///
/// # Errors
///
/// Propagates the first [`TransportError`] from the link.
pub fn drain_available(link: &mut dyn SerialLink) -> Result<Vec<u8>, TransportError> {
    let mut out = Vec::new();
    let mut buf = [0u8; 256];
    while out.len() < MAX_DRAIN_LEN {
        let n = link.read_available(&mut buf, Duration::ZERO)?;
        if n == 0 {
            break;
        }
        out.extend_from_slice(&buf[..n]);
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_link_settings_default_is_9600_with_two_second_timeout() {
        let settings = LinkSettings::default();
        assert_eq!(settings.baud_rate, 9600);
        assert_eq!(settings.timeout, Duration::from_secs(2));
    }

    #[test]
    fn test_transport_error_message_names_the_port() {
        let err = TransportError::Open {
            port: "/dev/ttyUSB0".to_string(),
            reason: "busy".to_string(),
        };
        assert_eq!(err.to_string(), "failed to open /dev/ttyUSB0: busy");
    }
}
