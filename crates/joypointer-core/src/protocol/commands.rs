//! Host → device commands.
//!
//! Every command is a single ASCII byte:
//!
//! | Byte  | Command                    |
//! |-------|----------------------------|
//! | `'0'` | probe / are-you-there      |
//! | `'1'` | begin telemetry streaming  |
//! | `'2'` | keep-alive heartbeat       |
//!
//! The device answers a probe with any text containing [`HANDSHAKE_MARKER`].

/// Substring that identifies the joystick in a probe reply.
pub const HANDSHAKE_MARKER: &str = "HELLO";

/// A single-byte command sent from the host to the device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HostCommand {
    /// Are you there?  The device replies with `HELLO`.
    Probe,
    /// Start sending telemetry frames.
    StartStreaming,
    /// Keep the device in streaming mode.
    KeepAlive,
}

impl HostCommand {
    /// Returns the wire byte for this command.
    pub const fn byte(self) -> u8 {
        match self {
            HostCommand::Probe => b'0',
            HostCommand::StartStreaming => b'1',
            HostCommand::KeepAlive => b'2',
        }
    }

    /// Returns the command as a one-byte slice, ready for a transport write.
    pub const fn as_bytes(self) -> &'static [u8] {
        match self {
            HostCommand::Probe => b"0",
            HostCommand::StartStreaming => b"1",
            HostCommand::KeepAlive => b"2",
        }
    }

    /// Decodes a wire byte back into a command.
    pub fn from_byte(byte: u8) -> Option<Self> {
        match byte {
            b'0' => Some(HostCommand::Probe),
            b'1' => Some(HostCommand::StartStreaming),
            b'2' => Some(HostCommand::KeepAlive),
            _ => None,
        }
    }
}

/// Returns `true` when `reply` contains the handshake marker.
pub fn contains_handshake_marker(reply: &str) -> bool {
    reply.contains(HANDSHAKE_MARKER)
}
