//! Platform-specific pointer injection implementations.
//!
//! The native backend is selected at compile time via `#[cfg(target_os = ...)]`.
//! Every backend receives abstract [`ButtonRole`]s and resolves them to host
//! buttons through a [`ButtonMap`].

use serde::{Deserialize, Serialize};

use joypointer_core::ButtonRole;

pub mod logging;
pub mod mock;

#[cfg(target_os = "windows")]
pub mod windows;

#[cfg(target_os = "linux")]
pub mod linux;

#[cfg(target_os = "macos")]
pub mod macos;

pub use logging::LoggingInputInjector;
pub use mock::RecordingInjector;

/// A physical host mouse button.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HostButton {
    Left,
    Right,
    Middle,
}

/// Which host button each device role presses.
///
/// The defaults bind both the joystick push switch and the left switch to
/// the left mouse button, and the right switch to the right mouse button.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ButtonMap {
    pub primary: HostButton,
    pub secondary: HostButton,
    pub tertiary: HostButton,
}

impl Default for ButtonMap {
    fn default() -> Self {
        Self {
            primary: HostButton::Left,
            secondary: HostButton::Left,
            tertiary: HostButton::Right,
        }
    }
}

impl ButtonMap {
    pub fn host_button(&self, role: ButtonRole) -> HostButton {
        match role {
            ButtonRole::Primary => self.primary,
            ButtonRole::Secondary => self.secondary,
            ButtonRole::Tertiary => self.tertiary,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_map_presses_left_for_primary_and_secondary() {
        let map = ButtonMap::default();

        assert_eq!(map.host_button(ButtonRole::Primary), HostButton::Left);
        assert_eq!(map.host_button(ButtonRole::Secondary), HostButton::Left);
        assert_eq!(map.host_button(ButtonRole::Tertiary), HostButton::Right);
    }

    #[test]
    fn test_partial_toml_keeps_remaining_defaults() {
        // Arrange
        let text = r#"tertiary = "middle""#;

        // Act
        let map: ButtonMap = toml::from_str(text).unwrap();

        // Assert
        assert_eq!(map.tertiary, HostButton::Middle);
        assert_eq!(map.primary, HostButton::Left);
    }
}
