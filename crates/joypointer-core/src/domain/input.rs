//! Pointer events produced from telemetry frames.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Abstract button a device switch drives.
///
/// Roles are deliberately not host mouse buttons: the injection backend
/// decides which host button each role presses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ButtonRole {
    /// Joystick push switch (switch index 0).  The only button in the
    /// legacy schema.
    Primary,
    /// Left switch (switch index 1, extended schema only).
    Secondary,
    /// Right switch (switch index 2, extended schema only).
    Tertiary,
}

impl ButtonRole {
    pub const fn name(self) -> &'static str {
        match self {
            ButtonRole::Primary => "primary",
            ButtonRole::Secondary => "secondary",
            ButtonRole::Tertiary => "tertiary",
        }
    }
}

impl fmt::Display for ButtonRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// One action for the host pointer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum InputEvent {
    /// Relative cursor movement.
    Move { dx: i32, dy: i32 },
    /// A role's switch went from released to pressed.
    ButtonDown(ButtonRole),
    /// A role's switch went from pressed to released.
    ButtonUp(ButtonRole),
}

impl InputEvent {
    /// Returns the role for button events, `None` for movement.
    pub fn role(&self) -> Option<ButtonRole> {
        match self {
            InputEvent::Move { .. } => None,
            InputEvent::ButtonDown(role) | InputEvent::ButtonUp(role) => Some(*role),
        }
    }
}
