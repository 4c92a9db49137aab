//! Infrastructure layer for the bridge.
//!
//! Contains OS-facing adapters: the serial link and its supervisor, pointer
//! injection backends, and configuration storage.
//!
//! **Dependency rule**: this layer may depend on `application` and
//! `joypointer_core`, but MUST NOT be imported by the `application` layer.
//!
//! # Sub-modules
//!
//! - **`serial`** – Port discovery, the handshake, the reader/heartbeat
//!   session tasks, and the connection supervisor.
//!
//! - **`input_injection`** – OS-specific implementations of `InputInjector`,
//!   selected at compile time using `#[cfg(target_os)]`, plus a logging
//!   injector for dry runs and a recording injector for tests.
//!
//! - **`storage`** – TOML configuration file in the platform config directory.

pub mod input_injection;
pub mod serial;
pub mod storage;
