//! Protocol module containing the frame types, the text decoder, and the
//! single-byte host commands.

pub mod commands;
pub mod decoder;
pub mod frame;

pub use commands::{contains_handshake_marker, HostCommand, HANDSHAKE_MARKER};
pub use decoder::{decode, extract_frames, DecodeError, FrameDecoder};
pub use frame::*;
