//! Recording input injector for unit and integration testing.
//!
//! The native injectors move the real cursor, need a desktop session, and
//! cannot be observed from test code.  [`RecordingInjector`] appends every
//! call to an in-memory list as an [`InputEvent`] so tests can assert on the
//! exact sequence that reached the host.
//!
//! Set `should_fail = true` to make every call return
//! [`InjectionError::Platform`] and exercise the error-handling paths.

use std::sync::{Mutex, PoisonError};

use joypointer_core::{ButtonRole, InputEvent};

use crate::application::pointer_actions::{InjectionError, InputInjector};

/// Records every injected event instead of calling the OS.
#[derive(Debug, Default)]
pub struct RecordingInjector {
    events: Mutex<Vec<InputEvent>>,
    /// When `true`, every method returns an error without recording.
    pub should_fail: bool,
}

impl RecordingInjector {
    pub fn new() -> Self {
        Self::default()
    }

    /// An injector whose every call fails.
    pub fn failing() -> Self {
        Self {
            should_fail: true,
            ..Self::default()
        }
    }

    /// Everything recorded so far, in call order.
    pub fn events(&self) -> Vec<InputEvent> {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Roles currently held down according to the recorded sequence.
    pub fn held(&self) -> Vec<ButtonRole> {
        let mut held = Vec::new();
        for event in self.events() {
            match event {
                InputEvent::ButtonDown(role) if !held.contains(&role) => held.push(role),
                InputEvent::ButtonUp(role) => held.retain(|r| *r != role),
                _ => {}
            }
        }
        held
    }

    fn record(&self, event: InputEvent) -> Result<(), InjectionError> {
        if self.should_fail {
            return Err(InjectionError::Platform("mock failure".into()));
        }
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(event);
        Ok(())
    }
}

impl InputInjector for RecordingInjector {
    fn move_relative(&self, dx: i32, dy: i32) -> Result<(), InjectionError> {
        self.record(InputEvent::Move { dx, dy })
    }

    fn button_down(&self, role: ButtonRole) -> Result<(), InjectionError> {
        self.record(InputEvent::ButtonDown(role))
    }

    fn button_up(&self, role: ButtonRole) -> Result<(), InjectionError> {
        self.record(InputEvent::ButtonUp(role))
    }
}
