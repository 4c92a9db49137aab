//! [`SerialTransport`] backed by the `serialport` crate.
//!
//! Ports are opened 8-N-1 with no flow control.  On Unix `serialport` takes
//! the `TIOCEXCL` lock on open, and Windows COM handles are exclusive by
//! nature, so a successful open doubles as the "not held by anyone else"
//! check the scanner needs.

use std::io::{ErrorKind, Read, Write};
use std::time::Duration;

use serialport::{ClearBuffer, DataBits, FlowControl, Parity, SerialPort, StopBits};

use super::transport::{LinkSettings, SerialLink, SerialTransport, TransportError};

/// Opens real serial ports.
#[derive(Debug, Clone, Default)]
pub struct NativeTransport {
    settings: LinkSettings,
}

impl NativeTransport {
    pub fn new(settings: LinkSettings) -> Self {
        Self { settings }
    }
}

impl SerialTransport for NativeTransport {
    fn open(&self, port: &str) -> Result<Box<dyn SerialLink>, TransportError> {
        let inner = serialport::new(port, self.settings.baud_rate)
            .data_bits(DataBits::Eight)
            .parity(Parity::None)
            .stop_bits(StopBits::One)
            .flow_control(FlowControl::None)
            .timeout(self.settings.timeout)
            .open()
            .map_err(|e| TransportError::Open {
                port: port.to_string(),
                reason: e.to_string(),
            })?;

        Ok(Box::new(NativeLink {
            port: port.to_string(),
            inner,
            transport_timeout: self.settings.timeout,
            current_timeout: self.settings.timeout,
        }))
    }
}

/// An open `serialport` handle.
///
/// The port has one timeout shared by reads and writes.  Reads temporarily
/// shorten it to the caller's bounded wait; writes put the transport timeout
/// back first.
struct NativeLink {
    port: String,
    inner: Box<dyn SerialPort>,
    transport_timeout: Duration,
    current_timeout: Duration,
}

impl NativeLink {
    fn set_timeout(&mut self, timeout: Duration) -> Result<(), TransportError> {
        if self.current_timeout == timeout {
            return Ok(());
        }
        self.inner
            .set_timeout(timeout)
            .map_err(|e| TransportError::Configure {
                port: self.port.clone(),
                reason: e.to_string(),
            })?;
        self.current_timeout = timeout;
        Ok(())
    }
}

impl SerialLink for NativeLink {
    fn port(&self) -> &str {
        &self.port
    }

    fn clear_input(&mut self) -> Result<(), TransportError> {
        self.inner
            .clear(ClearBuffer::Input)
            .map_err(|e| TransportError::Configure {
                port: self.port.clone(),
                reason: e.to_string(),
            })
    }

    fn write_all(&mut self, bytes: &[u8]) -> Result<(), TransportError> {
        self.set_timeout(self.transport_timeout)?;
        self.inner
            .write_all(bytes)
            .and_then(|()| self.inner.flush())
            .map_err(|source| TransportError::Write {
                port: self.port.clone(),
                source,
            })
    }

    fn read_available(&mut self, buf: &mut [u8], wait: Duration) -> Result<usize, TransportError> {
        self.set_timeout(wait)?;
        match self.inner.read(buf) {
            Ok(n) => Ok(n),
            Err(e) if matches!(e.kind(), ErrorKind::TimedOut | ErrorKind::WouldBlock) => Ok(0),
            Err(source) => Err(TransportError::Read {
                port: self.port.clone(),
                source,
            }),
        }
    }
}
