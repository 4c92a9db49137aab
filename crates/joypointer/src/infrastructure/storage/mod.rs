//! Storage infrastructure: configuration file persistence.
//!
//! The `config` sub-module reads the TOML configuration from the
//! platform-appropriate directory, falls back to defaults when the file does
//! not exist yet, and converts the on-disk sections into the runtime settings
//! the supervisor and transport take.

pub mod config;
