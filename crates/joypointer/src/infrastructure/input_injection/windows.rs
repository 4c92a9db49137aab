//! Windows pointer injection via the SendInput API.
//!
//! Moves are sent as *relative* `MOUSEEVENTF_MOVE` events, so the cursor
//! follows the joystick the same way a physical mouse would, including the
//! user's pointer speed setting.

#![cfg(target_os = "windows")]

use joypointer_core::ButtonRole;
use windows::Win32::UI::Input::KeyboardAndMouse::{
    SendInput, INPUT, INPUT_0, INPUT_MOUSE, MOUSEEVENTF_LEFTDOWN, MOUSEEVENTF_LEFTUP,
    MOUSEEVENTF_MIDDLEDOWN, MOUSEEVENTF_MIDDLEUP, MOUSEEVENTF_MOVE, MOUSEEVENTF_RIGHTDOWN,
    MOUSEEVENTF_RIGHTUP, MOUSEINPUT, MOUSE_EVENT_FLAGS,
};

use super::{ButtonMap, HostButton};
use crate::application::pointer_actions::{InjectionError, InputInjector};

/// Windows implementation of [`InputInjector`] using SendInput.
pub struct WindowsInputInjector {
    buttons: ButtonMap,
}

impl WindowsInputInjector {
    pub fn new(buttons: ButtonMap) -> Self {
        Self { buttons }
    }
}

impl InputInjector for WindowsInputInjector {
    fn move_relative(&self, dx: i32, dy: i32) -> Result<(), InjectionError> {
        if dx == 0 && dy == 0 {
            return Ok(());
        }
        send_mouse(dx, dy, MOUSEEVENTF_MOVE)
    }

    fn button_down(&self, role: ButtonRole) -> Result<(), InjectionError> {
        send_mouse(0, 0, button_flags(self.buttons.host_button(role), true))
    }

    fn button_up(&self, role: ButtonRole) -> Result<(), InjectionError> {
        send_mouse(0, 0, button_flags(self.buttons.host_button(role), false))
    }
}

// ── Helpers ───────────────────────────────────────────────────────────────────

fn button_flags(button: HostButton, pressed: bool) -> MOUSE_EVENT_FLAGS {
    match (button, pressed) {
        (HostButton::Left, true) => MOUSEEVENTF_LEFTDOWN,
        (HostButton::Left, false) => MOUSEEVENTF_LEFTUP,
        (HostButton::Right, true) => MOUSEEVENTF_RIGHTDOWN,
        (HostButton::Right, false) => MOUSEEVENTF_RIGHTUP,
        (HostButton::Middle, true) => MOUSEEVENTF_MIDDLEDOWN,
        (HostButton::Middle, false) => MOUSEEVENTF_MIDDLEUP,
    }
}

fn send_mouse(dx: i32, dy: i32, flags: MOUSE_EVENT_FLAGS) -> Result<(), InjectionError> {
    let input = INPUT {
        r#type: INPUT_MOUSE,
        Anonymous: INPUT_0 {
            mi: MOUSEINPUT {
                dx,
                dy,
                mouseData: 0,
                dwFlags: flags,
                time: 0,
                dwExtraInfo: 0,
            },
        },
    };
    // SAFETY: input is a valid INPUT structure on the stack
    let inserted = unsafe { SendInput(&[input], std::mem::size_of::<INPUT>() as i32) };
    if inserted == 1 {
        Ok(())
    } else {
        Err(InjectionError::Platform(format!(
            "SendInput inserted {inserted} of 1 events (flags {:#x})",
            flags.0
        )))
    }
}
