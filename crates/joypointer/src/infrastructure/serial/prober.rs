//! HandshakeProber: decides whether a candidate port is the joystick.
//!
//! Sequence for one candidate:
//!
//! ```text
//! open ── settle ── clear input ──┬─ write '0' ── wait ── read what arrived ─┐
//!                                 └──────────────── × repeat_count ──────────┘
//!                                  reply contains "HELLO"?  yes → keep link
//!                                                           no  → close
//! ```
//!
//! The firmware needs several wake-up bytes and some settling time before it
//! answers reliably, so the probe is always written `repeat_count` times
//! even if `HELLO` already came back after the first one.

use std::sync::Arc;
use std::time::Duration;

use joypointer_core::{contains_handshake_marker, DecodeError, HostCommand, HANDSHAKE_MARKER};
use thiserror::Error;
use tracing::debug;

use super::transport::{drain_available, SerialLink, SerialTransport, TransportError};

/// Why a candidate failed the handshake.
#[derive(Debug, Error)]
pub enum ProbeError {
    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error("reply from {port} is not text: {source}")]
    Decode {
        port: String,
        #[source]
        source: DecodeError,
    },

    /// The handshake timed out: no marker after the full probe sequence.
    #[error("no {} from {port} after {attempts} probes", HANDSHAKE_MARKER)]
    MarkerMissing { port: String, attempts: u32 },
}

/// Timing of the probe and start-streaming bursts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HandshakeConfig {
    /// How many times each command byte is written.
    pub repeat_count: u32,
    /// Pause after each write before reading the reply.
    pub repeat_delay: Duration,
    /// Pause between opening the port and the first probe byte.
    pub settle_delay: Duration,
}

impl Default for HandshakeConfig {
    fn default() -> Self {
        Self {
            repeat_count: 5,
            repeat_delay: Duration::from_millis(200),
            settle_delay: Duration::from_millis(500),
        }
    }
}

/// Probes candidates with the fixed `'0'` → `HELLO` exchange.
pub struct HandshakeProber {
    transport: Arc<dyn SerialTransport>,
    config: HandshakeConfig,
}

impl HandshakeProber {
    pub fn new(transport: Arc<dyn SerialTransport>, config: HandshakeConfig) -> Self {
        Self { transport, config }
    }

    /// Runs the probe sequence on `port` and hands back the open link on
    /// success.  On failure the link is closed before returning.
    ///
    /// # Errors
    ///
    /// Returns [`ProbeError`] for transport failures, an undecodable reply,
    /// or a missing marker.
    pub fn handshake(&self, port: &str) -> Result<Box<dyn SerialLink>, ProbeError> {
        let mut link = self.transport.open(port)?;
        std::thread::sleep(self.config.settle_delay);
        link.clear_input()?;

        let mut reply = Vec::new();
        for _ in 0..self.config.repeat_count {
            link.write_all(HostCommand::Probe.as_bytes())?;
            std::thread::sleep(self.config.repeat_delay);
            reply.extend(drain_available(link.as_mut())?);
        }

        let text = String::from_utf8(reply).map_err(|e| ProbeError::Decode {
            port: port.to_string(),
            source: DecodeError::InvalidUtf8 {
                valid_up_to: e.utf8_error().valid_up_to(),
            },
        })?;

        if contains_handshake_marker(&text) {
            Ok(link)
        } else {
            Err(ProbeError::MarkerMissing {
                port: port.to_string(),
                attempts: self.config.repeat_count,
            })
        }
    }

    /// Returns `true` iff `port` passes the handshake.  Never fails; the
    /// link is closed either way.
    pub fn probe(&self, port: &str) -> bool {
        match self.handshake(port) {
            Ok(_link) => true,
            Err(e) => {
                debug!(port, "probe failed: {e}");
                false
            }
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
