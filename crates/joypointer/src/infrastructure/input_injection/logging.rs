//! Dry-run injector: logs every event instead of touching the host pointer.
//!
//! Used for `--dry-run` and as the fallback when the native backend cannot
//! be constructed (no display, missing permission).

use joypointer_core::ButtonRole;
use tracing::info;

use super::{ButtonMap, HostButton};
use crate::application::pointer_actions::{InjectionError, InputInjector};

/// Logs pointer events at `info` and always succeeds.
#[derive(Debug, Default, Clone, Copy)]
pub struct LoggingInputInjector {
    buttons: ButtonMap,
}

impl LoggingInputInjector {
    pub fn new(buttons: ButtonMap) -> Self {
        Self { buttons }
    }

    fn host(&self, role: ButtonRole) -> HostButton {
        self.buttons.host_button(role)
    }
}

impl InputInjector for LoggingInputInjector {
    fn move_relative(&self, dx: i32, dy: i32) -> Result<(), InjectionError> {
        if dx != 0 || dy != 0 {
            info!(dx, dy, "pointer move");
        }
        Ok(())
    }

    fn button_down(&self, role: ButtonRole) -> Result<(), InjectionError> {
        info!(%role, button = ?self.host(role), "button down");
        Ok(())
    }

    fn button_up(&self, role: ButtonRole) -> Result<(), InjectionError> {
        info!(%role, button = ?self.host(role), "button up");
        Ok(())
    }
}
