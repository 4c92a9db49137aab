//! TOML-based configuration for the bridge.
//!
//! Reads and writes `AppConfig` at the platform-appropriate path:
//! - Windows:  `%APPDATA%\JoyPointer\config.toml`
//! - Linux:    `$XDG_CONFIG_HOME/joypointer/config.toml` (or `~/.config/joypointer`)
//! - macOS:    `~/Library/Application Support/JoyPointer/config.toml`
//!
//! Every field carries a serde default, so a missing file, a missing section,
//! or a section with only one key all work:
//!
//! ```toml
//! [link]
//! schema = "legacy"
//!
//! [buttons]
//! tertiary = "middle"
//! ```
//!
//! Durations are stored as integer milliseconds (`*_ms`) and converted to
//! [`Duration`] by [`AppConfig::to_supervisor_config`].

use std::path::{Path, PathBuf};
use std::time::Duration;

use joypointer_core::FrameSchema;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::infrastructure::input_injection::ButtonMap;
use crate::infrastructure::serial::{HandshakeConfig, LinkSettings, SupervisorConfig};

/// Error type for configuration file operations.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The platform config directory could not be determined.
    #[error("could not determine platform config directory")]
    NoPlatformConfigDir,

    /// A file system I/O error occurred.
    #[error("I/O error accessing config at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The TOML content could not be parsed.
    #[error("failed to parse config TOML: {0}")]
    Parse(#[from] toml::de::Error),

    /// The config could not be serialized to TOML.
    #[error("failed to serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),

    /// A value parsed but cannot drive a working link.
    #[error("invalid config value for {field}: {reason}")]
    Invalid { field: &'static str, reason: String },
}

/// Smallest decoder bound accepted from a config file.  Leaves room for one
/// extended frame with four-digit signed axes plus a partial follower.
pub const MIN_DECODER_BUFFER_LEN: usize = 32;

// ── Config schema types ───────────────────────────────────────────────────────

/// Top-level configuration stored on disk.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct AppConfig {
    pub link: LinkConfig,
    pub handshake: HandshakeSection,
    pub decoder: DecoderConfig,
    pub buttons: ButtonMap,
    pub logging: LoggingConfig,
}

/// Serial link timing and the frame schema.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LinkConfig {
    /// `"legacy"` (3 fields) or `"extended"` (5 fields).
    #[serde(default)]
    pub schema: FrameSchema,
    #[serde(default = "default_baud_rate")]
    pub baud_rate: u32,
    /// Per-call timeout at the transport layer.
    #[serde(default = "default_transport_timeout_ms")]
    pub transport_timeout_ms: u64,
    /// Bounded wait of one reader read.
    #[serde(default = "default_read_poll_ms")]
    pub read_poll_ms: u64,
    /// Silence after which a connected link is declared lost.
    #[serde(default = "default_idle_timeout_ms")]
    pub idle_timeout_ms: u64,
    #[serde(default = "default_heartbeat_interval_ms")]
    pub heartbeat_interval_ms: u64,
    /// Sleep after a scan cycle that found no device.
    #[serde(default = "default_rescan_backoff_ms")]
    pub rescan_backoff_ms: u64,
    /// Fixed candidate list.  Empty means platform enumeration.
    #[serde(default)]
    pub candidate_ports: Vec<String>,
}

/// Probe and start-streaming burst timing.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct HandshakeSection {
    #[serde(default = "default_repeat_count")]
    pub repeat_count: u32,
    #[serde(default = "default_repeat_delay_ms")]
    pub repeat_delay_ms: u64,
    /// Pause between opening a candidate and the first probe byte.
    #[serde(default = "default_settle_delay_ms")]
    pub settle_delay_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DecoderConfig {
    /// Bound on unmatched bytes kept between reads.
    #[serde(default = "default_max_buffer_len")]
    pub max_buffer_len: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LoggingConfig {
    /// `tracing` level used when `RUST_LOG` is not set.
    #[serde(default = "default_log_level")]
    pub level: String,
}

// ── Default helpers ───────────────────────────────────────────────────────────

fn default_baud_rate() -> u32 {
    9600
}
fn default_transport_timeout_ms() -> u64 {
    2000
}
fn default_read_poll_ms() -> u64 {
    100
}
fn default_idle_timeout_ms() -> u64 {
    10_000
}
fn default_heartbeat_interval_ms() -> u64 {
    3000
}
fn default_rescan_backoff_ms() -> u64 {
    500
}
fn default_repeat_count() -> u32 {
    5
}
fn default_repeat_delay_ms() -> u64 {
    200
}
fn default_settle_delay_ms() -> u64 {
    500
}
fn default_max_buffer_len() -> usize {
    joypointer_core::protocol::decoder::DEFAULT_MAX_BUFFER_LEN
}
fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LinkConfig {
    fn default() -> Self {
        Self {
            schema: FrameSchema::default(),
            baud_rate: default_baud_rate(),
            transport_timeout_ms: default_transport_timeout_ms(),
            read_poll_ms: default_read_poll_ms(),
            idle_timeout_ms: default_idle_timeout_ms(),
            heartbeat_interval_ms: default_heartbeat_interval_ms(),
            rescan_backoff_ms: default_rescan_backoff_ms(),
            candidate_ports: Vec::new(),
        }
    }
}

impl Default for HandshakeSection {
    fn default() -> Self {
        Self {
            repeat_count: default_repeat_count(),
            repeat_delay_ms: default_repeat_delay_ms(),
            settle_delay_ms: default_settle_delay_ms(),
        }
    }
}

impl Default for DecoderConfig {
    fn default() -> Self {
        Self {
            max_buffer_len: default_max_buffer_len(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

// ── Conversions ───────────────────────────────────────────────────────────────

impl AppConfig {
    /// Runtime settings for the link supervisor.
    pub fn to_supervisor_config(&self) -> SupervisorConfig {
        SupervisorConfig {
            schema: self.link.schema,
            handshake: HandshakeConfig {
                repeat_count: self.handshake.repeat_count,
                repeat_delay: Duration::from_millis(self.handshake.repeat_delay_ms),
                settle_delay: Duration::from_millis(self.handshake.settle_delay_ms),
            },
            read_poll: Duration::from_millis(self.link.read_poll_ms),
            idle_timeout: Duration::from_millis(self.link.idle_timeout_ms),
            heartbeat_interval: Duration::from_millis(self.link.heartbeat_interval_ms),
            rescan_backoff: Duration::from_millis(self.link.rescan_backoff_ms),
            max_buffer_len: self.decoder.max_buffer_len,
        }
    }

    /// Rejects values that parse but would stall or spin the link.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] naming the first offending field.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let invalid = |field: &'static str, reason: &str| -> Result<(), ConfigError> {
            Err(ConfigError::Invalid {
                field,
                reason: reason.to_string(),
            })
        };

        if self.link.baud_rate == 0 {
            return invalid("link.baud_rate", "must be positive");
        }
        if self.link.read_poll_ms == 0 {
            return invalid("link.read_poll_ms", "must be at least 1");
        }
        if self.link.heartbeat_interval_ms == 0 {
            return invalid("link.heartbeat_interval_ms", "must be at least 1");
        }
        if self.link.idle_timeout_ms < self.link.read_poll_ms {
            return invalid(
                "link.idle_timeout_ms",
                "must not be shorter than link.read_poll_ms",
            );
        }
        if self.handshake.repeat_count == 0 {
            return invalid("handshake.repeat_count", "must be at least 1");
        }
        if self.decoder.max_buffer_len < MIN_DECODER_BUFFER_LEN {
            return Err(ConfigError::Invalid {
                field: "decoder.max_buffer_len",
                reason: format!("must be at least {MIN_DECODER_BUFFER_LEN}"),
            });
        }
        Ok(())
    }

    /// Port settings for the native transport.
    pub fn link_settings(&self) -> LinkSettings {
        LinkSettings {
            baud_rate: self.link.baud_rate,
            timeout: Duration::from_millis(self.link.transport_timeout_ms),
        }
    }
}

// ── Config repository ─────────────────────────────────────────────────────────

/// Determines the platform-appropriate directory for the config file.
///
/// # Errors
///
/// Returns [`ConfigError::NoPlatformConfigDir`] when the platform config base
/// directory cannot be determined from the environment.
pub fn config_dir() -> Result<PathBuf, ConfigError> {
    platform_config_dir().ok_or(ConfigError::NoPlatformConfigDir)
}

/// Resolves the full path to the config file.
///
/// # Errors
///
/// Returns [`ConfigError::NoPlatformConfigDir`] if the base directory cannot be
/// determined.
pub fn config_file_path() -> Result<PathBuf, ConfigError> {
    Ok(config_dir()?.join("config.toml"))
}

/// Loads `AppConfig` from `path`, returning defaults if it does not exist.
///
/// # Errors
///
/// Returns [`ConfigError::Io`] for file-system errors other than "not found",
/// [`ConfigError::Parse`] if the TOML is malformed, and
/// [`ConfigError::Invalid`] if a value fails [`AppConfig::validate`].
pub fn load_config_from(path: &Path) -> Result<AppConfig, ConfigError> {
    match std::fs::read_to_string(path) {
        Ok(content) => {
            let config: AppConfig = toml::from_str(&content)?;
            config.validate()?;
            Ok(config)
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(AppConfig::default()),
        Err(source) => Err(ConfigError::Io {
            path: path.to_path_buf(),
            source,
        }),
    }
}

/// Persists `config` to `path`, creating parent directories as needed.
///
/// # Errors
///
/// Returns [`ConfigError::Io`] for file-system failures or
/// [`ConfigError::Serialize`] if serialization fails.
pub fn save_config_to(path: &Path, config: &AppConfig) -> Result<(), ConfigError> {
    if let Some(dir) = path.parent() {
        std::fs::create_dir_all(dir).map_err(|source| ConfigError::Io {
            path: dir.to_path_buf(),
            source,
        })?;
    }

    let content = toml::to_string_pretty(config)?;
    std::fs::write(path, content).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })
}

/// Resolves the platform config directory including the `joypointer` leaf.
fn platform_config_dir() -> Option<PathBuf> {
    #[cfg(target_os = "windows")]
    {
        std::env::var_os("APPDATA").map(|p| PathBuf::from(p).join("JoyPointer"))
    }

    #[cfg(target_os = "linux")]
    {
        let base = std::env::var_os("XDG_CONFIG_HOME")
            .map(PathBuf::from)
            .or_else(|| std::env::var_os("HOME").map(|h| PathBuf::from(h).join(".config")))?;
        Some(base.join("joypointer"))
    }

    #[cfg(target_os = "macos")]
    {
        std::env::var_os("HOME").map(|h| {
            PathBuf::from(h)
                .join("Library")
                .join("Application Support")
                .join("JoyPointer")
        })
    }

    #[cfg(not(any(target_os = "windows", target_os = "linux", target_os = "macos")))]
    {
        None
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::input_injection::HostButton;

    fn scratch_path(name: &str) -> PathBuf {
        std::env::temp_dir()
            .join(format!("joypointer-config-{}-{name}", std::process::id()))
            .join("config.toml")
    }

    // ── Defaults ──────────────────────────────────────────────────────────────

    #[test]
    fn test_app_config_default_matches_device_timing() {
        // Arrange / Act
        let cfg = AppConfig::default();

        // Assert
        assert_eq!(cfg.link.baud_rate, 9600);
        assert_eq!(cfg.link.idle_timeout_ms, 10_000);
        assert_eq!(cfg.link.heartbeat_interval_ms, 3000);
        assert_eq!(cfg.handshake.repeat_count, 5);
        assert_eq!(cfg.handshake.repeat_delay_ms, 200);
        assert_eq!(cfg.link.schema, FrameSchema::Extended);
        assert!(cfg.link.candidate_ports.is_empty());
    }

    #[test]
    fn test_default_conversion_equals_supervisor_default() {
        let cfg = AppConfig::default();

        let sup = cfg.to_supervisor_config();
        let expected = SupervisorConfig::default();

        assert_eq!(sup.idle_timeout, expected.idle_timeout);
        assert_eq!(sup.heartbeat_interval, expected.heartbeat_interval);
        assert_eq!(sup.read_poll, expected.read_poll);
        assert_eq!(sup.handshake, expected.handshake);
        assert_eq!(sup.max_buffer_len, expected.max_buffer_len);
    }

    #[test]
    fn test_link_settings_converts_timeout() {
        let mut cfg = AppConfig::default();
        cfg.link.transport_timeout_ms = 750;

        let settings = cfg.link_settings();

        assert_eq!(settings.baud_rate, 9600);
        assert_eq!(settings.timeout, Duration::from_millis(750));
    }

    // ── Parsing ───────────────────────────────────────────────────────────────

    #[test]
    fn test_empty_toml_is_all_defaults() {
        let cfg: AppConfig = toml::from_str("").unwrap();
        assert_eq!(cfg, AppConfig::default());
    }

    #[test]
    fn test_partial_sections_override_only_given_keys() {
        // Arrange
        let text = r#"
[link]
schema = "legacy"
idle_timeout_ms = 4000

[buttons]
secondary = "middle"
"#;

        // Act
        let cfg: AppConfig = toml::from_str(text).unwrap();

        // Assert
        assert_eq!(cfg.link.schema, FrameSchema::Legacy);
        assert_eq!(cfg.link.idle_timeout_ms, 4000);
        assert_eq!(cfg.link.heartbeat_interval_ms, 3000);
        assert_eq!(cfg.buttons.secondary, HostButton::Middle);
        assert_eq!(cfg.buttons.primary, HostButton::Left);
        assert_eq!(cfg.logging.level, "info");
    }

    #[test]
    fn test_unknown_schema_name_is_parse_error() {
        let result: Result<AppConfig, _> = toml::from_str("[link]\nschema = \"wide\"\n");
        assert!(result.is_err());
    }

    // ── Files ─────────────────────────────────────────────────────────────────

    #[test]
    fn test_load_missing_file_returns_defaults() {
        let path = scratch_path("missing");

        let cfg = load_config_from(&path).unwrap();

        assert_eq!(cfg, AppConfig::default());
    }

    #[test]
    fn test_save_then_load_preserves_changes() {
        // Arrange
        let path = scratch_path("save-load");
        let mut cfg = AppConfig::default();
        cfg.link.candidate_ports = vec!["/dev/ttyUSB0".to_string()];
        cfg.handshake.settle_delay_ms = 0;

        // Act
        save_config_to(&path, &cfg).unwrap();
        let loaded = load_config_from(&path).unwrap();

        // Assert
        assert_eq!(loaded, cfg);
        let _ = std::fs::remove_dir_all(path.parent().unwrap());
    }

    #[test]
    fn test_load_malformed_file_is_parse_error() {
        // Arrange
        let path = scratch_path("malformed");
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(&path, "[[[ not valid toml").unwrap();

        // Act
        let result = load_config_from(&path);

        // Assert
        assert!(matches!(result, Err(ConfigError::Parse(_))));
        let _ = std::fs::remove_dir_all(path.parent().unwrap());
    }

    // ── Validation ────────────────────────────────────────────────────────────

    #[test]
    fn test_default_config_is_valid() {
        assert!(AppConfig::default().validate().is_ok());
    }

    #[test]
    fn test_values_that_stall_the_link_are_rejected() {
        let cases = [
            ("[decoder]\nmax_buffer_len = 4\n", "decoder.max_buffer_len"),
            ("[link]\nread_poll_ms = 0\n", "link.read_poll_ms"),
            ("[handshake]\nrepeat_count = 0\n", "handshake.repeat_count"),
            ("[link]\nheartbeat_interval_ms = 0\n", "link.heartbeat_interval_ms"),
            ("[link]\nbaud_rate = 0\n", "link.baud_rate"),
            ("[link]\nidle_timeout_ms = 50\n", "link.idle_timeout_ms"),
        ];

        for (text, expected) in cases {
            let cfg: AppConfig = toml::from_str(text).unwrap();
            match cfg.validate() {
                Err(ConfigError::Invalid { field, .. }) => assert_eq!(field, expected, "{text}"),
                other => panic!("expected {expected} to be rejected, got {other:?}"),
            }
        }
    }

    #[test]
    fn test_load_rejects_invalid_file() {
        // Arrange
        let path = scratch_path("invalid");
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(&path, "[decoder]\nmax_buffer_len = 4\n").unwrap();

        // Act
        let result = load_config_from(&path);

        // Assert
        assert!(matches!(
            result,
            Err(ConfigError::Invalid {
                field: "decoder.max_buffer_len",
                ..
            })
        ));
        let _ = std::fs::remove_dir_all(path.parent().unwrap());
    }
}
