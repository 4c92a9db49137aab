//! # joypointer-core
//!
//! Shared library for the JoyPointer serial joystick bridge containing the
//! ASCII frame codec, the host command bytes, and the edge-triggered action
//! dispatcher.
//!
//! This crate has zero dependencies on OS APIs, serial handles, or async
//! runtimes.  Everything in it is a pure function or a small owned state
//! machine, so it can be tested exhaustively without hardware.
//!
//! # Architecture overview (for beginners)
//!
//! JoyPointer turns a two-axis joystick wired to a microcontroller into a
//! host pointer.  The microcontroller streams short ASCII *frames* over a
//! serial link, e.g. `S+12:-3:0E`, and the host moves the cursor and presses
//! buttons accordingly.
//!
//! - **`protocol`** – How bytes on the wire become frames.  The decoder
//!   accumulates text across reads, pulls out every complete `S…E` frame, and
//!   parses the fields against the session's [`FrameSchema`].
//!
//! - **`domain`** – What a frame *means*.  The [`ActionDispatcher`] turns a
//!   parsed frame into a relative move plus button down/up events, emitting a
//!   button event only when a switch actually changes.

pub mod domain;
pub mod protocol;

pub use domain::dispatch::{ActionDispatcher, ButtonSnapshot};
pub use domain::input::{ButtonRole, InputEvent};
pub use protocol::commands::{contains_handshake_marker, HostCommand, HANDSHAKE_MARKER};
pub use protocol::decoder::{decode, extract_frames, DecodeError, FrameDecoder};
pub use protocol::frame::{
    parse_frame, FrameFormatError, FrameSchema, ParsedFrame, RawFrame, SwitchState,
};
