//! Linux X11 pointer injection via the XTest extension.
//!
//! # What is XTest? (for beginners)
//!
//! XTest is an X11 protocol extension that lets a process synthesize mouse
//! and keyboard events as if the user had physically produced them.  The two
//! calls used here are:
//!
//! - `XTestFakeRelativeMotionEvent(display, dx, dy, delay)` - move the cursor
//!   by an offset from wherever it currently is.
//! - `XTestFakeButtonEvent(display, button, is_press, delay)` - press or
//!   release a mouse button.
//!
//! Both only queue a request; `XFlush` sends it to the server immediately.
//!
//! X11 button numbering: 1 = left, 2 = middle, 3 = right.
//!
//! # Permissions
//!
//! The process needs access to the X display named by `DISPLAY`.  If the
//! display cannot be opened, or the server lacks XTest, construction fails
//! with [`InjectionError::Unavailable`] and the binary falls back to the
//! logging injector.

use std::os::raw::{c_int, c_uint, c_ulong};
use std::ptr;
use std::sync::{Mutex, MutexGuard, PoisonError};

use joypointer_core::ButtonRole;
use x11::{xlib, xtest};

use super::{ButtonMap, HostButton};
use crate::application::pointer_actions::{InjectionError, InputInjector};

/// Passing `CurrentTime` (0) means "no delay, use the server's timestamp".
const CURRENT_TIME: c_ulong = 0;
/// XTest screen argument meaning "the screen the pointer is currently on".
const CURRENT_SCREEN: c_int = -1;

const X_TRUE: c_int = 1;
const X_FALSE: c_int = 0;

struct DisplayHandle(*mut xlib::Display);

// SAFETY: the pointer is only dereferenced by Xlib while the owning mutex is
// held, so no two threads use the connection at once.
unsafe impl Send for DisplayHandle {}

/// Linux X11/XTest pointer injector.
pub struct LinuxXTestInjector {
    display: Mutex<DisplayHandle>,
    buttons: ButtonMap,
}

impl LinuxXTestInjector {
    /// Connects to the display named by `DISPLAY` and checks for XTest.
    ///
    /// # Errors
    ///
    /// Returns `InjectionError::Unavailable` if the display cannot be opened
    /// or the server does not support XTest.
    pub fn new(buttons: ButtonMap) -> Result<Self, InjectionError> {
        // SAFETY: a null name asks Xlib to use $DISPLAY; the result is checked.
        let display = unsafe { xlib::XOpenDisplay(ptr::null()) };
        if display.is_null() {
            return Err(InjectionError::Unavailable(
                "cannot open X display (is DISPLAY set?)".into(),
            ));
        }

        let (mut event_base, mut error_base, mut major, mut minor) = (0, 0, 0, 0);
        // SAFETY: display is non-null and the out-pointers are valid locals.
        let has_xtest = unsafe {
            xtest::XTestQueryExtension(
                display,
                &mut event_base,
                &mut error_base,
                &mut major,
                &mut minor,
            )
        };
        if has_xtest == X_FALSE {
            // SAFETY: display came from XOpenDisplay and is not used afterwards.
            unsafe { xlib::XCloseDisplay(display) };
            return Err(InjectionError::Unavailable(
                "X server does not support the XTest extension".into(),
            ));
        }

        Ok(Self {
            display: Mutex::new(DisplayHandle(display)),
            buttons,
        })
    }

    fn lock(&self) -> MutexGuard<'_, DisplayHandle> {
        self.display.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn button(&self, role: ButtonRole, pressed: bool) -> Result<(), InjectionError> {
        let xbutton = x_button(self.buttons.host_button(role));
        let handle = self.lock();
        // SAFETY: handle.0 is a live display owned by this injector.
        let status = unsafe {
            let status = xtest::XTestFakeButtonEvent(
                handle.0,
                xbutton,
                if pressed { X_TRUE } else { X_FALSE },
                CURRENT_TIME,
            );
            xlib::XFlush(handle.0);
            status
        };
        check(status, "XTestFakeButtonEvent")
    }
}

impl InputInjector for LinuxXTestInjector {
    fn move_relative(&self, dx: i32, dy: i32) -> Result<(), InjectionError> {
        if dx == 0 && dy == 0 {
            return Ok(());
        }
        let handle = self.lock();
        // SAFETY: handle.0 is a live display owned by this injector.
        let status = unsafe {
            let status = xtest::XTestFakeRelativeMotionEvent(handle.0, CURRENT_SCREEN, dx, dy, CURRENT_TIME);
            xlib::XFlush(handle.0);
            status
        };
        check(status, "XTestFakeRelativeMotionEvent")
    }

    fn button_down(&self, role: ButtonRole) -> Result<(), InjectionError> {
        self.button(role, true)
    }

    fn button_up(&self, role: ButtonRole) -> Result<(), InjectionError> {
        self.button(role, false)
    }
}

impl Drop for LinuxXTestInjector {
    fn drop(&mut self) {
        let handle = self.lock();
        // SAFETY: the display is closed exactly once, here.
        unsafe { xlib::XCloseDisplay(handle.0) };
    }
}

fn x_button(button: HostButton) -> c_uint {
    match button {
        HostButton::Left => 1,
        HostButton::Middle => 2,
        HostButton::Right => 3,
    }
}

fn check(status: c_int, call: &str) -> Result<(), InjectionError> {
    if status == X_FALSE {
        Err(InjectionError::Platform(format!("{call} was rejected")))
    } else {
        Ok(())
    }
}
