//! macOS pointer injection through Core Graphics events.
//!
//! Core Graphics has no relative-move call, so every move reads the current
//! cursor location from a fresh null event and posts a `MouseMoved` event at
//! the offset point.  While a button is held the move is posted as the
//! matching `*MouseDragged` type instead, otherwise drag-and-drop in other
//! applications does not see the motion.
//!
//! Events are posted at the HID tap, which requires the Accessibility
//! permission (System Settings → Privacy & Security → Accessibility).
//! Without it, posting silently does nothing.

#![cfg(target_os = "macos")]

use std::sync::atomic::{AtomicU8, Ordering};

use core_graphics::event::{CGEvent, CGEventTapLocation, CGEventType, CGMouseButton};
use core_graphics::event_source::{CGEventSource, CGEventSourceStateID};
use core_graphics::geometry::CGPoint;
use joypointer_core::ButtonRole;

use super::{ButtonMap, HostButton};
use crate::application::pointer_actions::{InjectionError, InputInjector};

const LEFT_HELD: u8 = 0b001;
const RIGHT_HELD: u8 = 0b010;
const MIDDLE_HELD: u8 = 0b100;

/// macOS implementation of [`InputInjector`] using `CGEventPost`.
pub struct MacosInputInjector {
    buttons: ButtonMap,
    held: AtomicU8,
}

impl MacosInputInjector {
    /// # Errors
    ///
    /// Returns `InjectionError::Unavailable` if no HID event source can be
    /// created.
    pub fn new(buttons: ButtonMap) -> Result<Self, InjectionError> {
        source()?;
        Ok(Self {
            buttons,
            held: AtomicU8::new(0),
        })
    }

    fn post_button(&self, role: ButtonRole, pressed: bool) -> Result<(), InjectionError> {
        let button = self.buttons.host_button(role);
        let bit = held_bit(button);
        if pressed {
            self.held.fetch_or(bit, Ordering::AcqRel);
        } else {
            self.held.fetch_and(!bit, Ordering::AcqRel);
        }

        let location = cursor_location()?;
        let (event_type, cg_button) = button_event(button, pressed);
        post(event_type, location, cg_button)
    }
}

impl InputInjector for MacosInputInjector {
    fn move_relative(&self, dx: i32, dy: i32) -> Result<(), InjectionError> {
        if dx == 0 && dy == 0 {
            return Ok(());
        }
        let current = cursor_location()?;
        // Core Graphics global coordinates have their origin at the top-left of
        // the main display with Y growing downward, matching the device axes.
        let target = CGPoint::new(current.x + f64::from(dx), current.y + f64::from(dy));
        let (event_type, cg_button) = move_event(self.held.load(Ordering::Acquire));
        post(event_type, target, cg_button)
    }

    fn button_down(&self, role: ButtonRole) -> Result<(), InjectionError> {
        self.post_button(role, true)
    }

    fn button_up(&self, role: ButtonRole) -> Result<(), InjectionError> {
        self.post_button(role, false)
    }
}

// ── Helpers ───────────────────────────────────────────────────────────────────

fn source() -> Result<CGEventSource, InjectionError> {
    CGEventSource::new(CGEventSourceStateID::HIDSystemState)
        .map_err(|()| InjectionError::Unavailable("cannot create HID event source".into()))
}

fn cursor_location() -> Result<CGPoint, InjectionError> {
    let event = CGEvent::new(source()?)
        .map_err(|()| InjectionError::Platform("cannot create null event".into()))?;
    Ok(event.location())
}

fn post(event_type: CGEventType, at: CGPoint, button: CGMouseButton) -> Result<(), InjectionError> {
    let event = CGEvent::new_mouse_event(source()?, event_type, at, button)
        .map_err(|()| InjectionError::Platform("cannot create mouse event".into()))?;
    event.post(CGEventTapLocation::HID);
    Ok(())
}

fn held_bit(button: HostButton) -> u8 {
    match button {
        HostButton::Left => LEFT_HELD,
        HostButton::Right => RIGHT_HELD,
        HostButton::Middle => MIDDLE_HELD,
    }
}

fn button_event(button: HostButton, pressed: bool) -> (CGEventType, CGMouseButton) {
    match (button, pressed) {
        (HostButton::Left, true) => (CGEventType::LeftMouseDown, CGMouseButton::Left),
        (HostButton::Left, false) => (CGEventType::LeftMouseUp, CGMouseButton::Left),
        (HostButton::Right, true) => (CGEventType::RightMouseDown, CGMouseButton::Right),
        (HostButton::Right, false) => (CGEventType::RightMouseUp, CGMouseButton::Right),
        (HostButton::Middle, true) => (CGEventType::OtherMouseDown, CGMouseButton::Center),
        (HostButton::Middle, false) => (CGEventType::OtherMouseUp, CGMouseButton::Center),
    }
}

/// Picks the move event type for the current held-button mask.  Left wins
/// over right, right over middle.
fn move_event(held: u8) -> (CGEventType, CGMouseButton) {
    if held & LEFT_HELD != 0 {
        (CGEventType::LeftMouseDragged, CGMouseButton::Left)
    } else if held & RIGHT_HELD != 0 {
        (CGEventType::RightMouseDragged, CGMouseButton::Right)
    } else if held & MIDDLE_HELD != 0 {
        (CGEventType::OtherMouseDragged, CGMouseButton::Center)
    } else {
        (CGEventType::MouseMoved, CGMouseButton::Left)
    }
}
