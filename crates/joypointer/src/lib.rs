//! joypointer library entry point.
//!
//! Re-exports all public modules so that integration tests in `tests/`
//! and the binary entry point in `main.rs` share the same module tree.
//!
//! # What does joypointer do?
//!
//! A two-axis joystick with up to three switches sits behind a USB-serial
//! adapter and streams ASCII telemetry once it has been woken up.  joypointer
//! turns that stream into host pointer input:
//!
//! 1. Scans the platform's serial ports for candidates.
//! 2. Probes each candidate with `'0'` until one answers `HELLO`.
//! 3. Sends `'1'` to start streaming and `'2'` every few seconds to keep the
//!    device streaming.
//! 4. Decodes `S…E` frames, converts them to relative moves and button edges,
//!    and injects them through the platform input API.
//! 5. Declares the link lost on any transport error, undecodable bytes, or
//!    prolonged silence, and goes back to scanning.

/// Application layer: pointer actions use case and the injection seam.
pub mod application;

/// Infrastructure layer: serial link, input injection backends, storage.
pub mod infrastructure;
