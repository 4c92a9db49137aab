//! PointerActionsUseCase: turns raw telemetry frames into host pointer input.
//!
//! This use case sits at the application layer and delegates to an
//! [`InputInjector`] trait object for OS-level event injection.  The
//! platform-specific implementations are in the infrastructure layer.
//!
//! One use case instance lives for exactly one connection.  The supervisor
//! builds a fresh one on every reconnect, so the button snapshot always
//! starts from "all released".

use std::sync::Arc;

use joypointer_core::{
    parse_frame, ActionDispatcher, ButtonRole, FrameFormatError, FrameSchema, InputEvent,
    RawFrame,
};
use thiserror::Error;
use tracing::error;

/// Error type for input injection operations.
#[derive(Debug, Error)]
pub enum InjectionError {
    /// The OS rejected or failed the injection call.
    #[error("platform error: {0}")]
    Platform(String),
    /// The backend could not be initialised (no display, missing permission).
    #[error("input injection unavailable: {0}")]
    Unavailable(String),
}

/// Platform-agnostic pointer injection trait.
///
/// Each supported OS provides an implementation in the infrastructure layer.
#[cfg_attr(test, mockall::automock)]
pub trait InputInjector: Send + Sync {
    /// Moves the cursor by `(dx, dy)` relative to its current position.
    fn move_relative(&self, dx: i32, dy: i32) -> Result<(), InjectionError>;

    /// Presses the host button bound to `role`.
    fn button_down(&self, role: ButtonRole) -> Result<(), InjectionError>;

    /// Releases the host button bound to `role`.
    fn button_up(&self, role: ButtonRole) -> Result<(), InjectionError>;
}

/// Per-connection frame counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FrameStats {
    /// Frames that parsed and were dispatched.
    pub dispatched: u64,
    /// Frames discarded with a [`FrameFormatError`].
    pub rejected: u64,
    /// Injector calls that returned an error.
    pub injection_failures: u64,
    /// Unmatched bytes the decoder dropped to stay under its buffer bound.
    pub discarded_bytes: u64,
}

/// The Pointer Actions use case.
pub struct PointerActionsUseCase {
    injector: Arc<dyn InputInjector>,
    dispatcher: ActionDispatcher,
    stats: FrameStats,
}

impl PointerActionsUseCase {
    /// Creates a new use case for one connection using `schema`.
    pub fn new(injector: Arc<dyn InputInjector>, schema: FrameSchema) -> Self {
        Self {
            injector,
            dispatcher: ActionDispatcher::new(schema),
            stats: FrameStats::default(),
        }
    }

    pub fn schema(&self) -> FrameSchema {
        self.dispatcher.schema()
    }

    /// Parses `raw` and injects the resulting events.
    ///
    /// Injection failures are logged and counted but never returned: a
    /// failed click must not tear down a healthy serial link.
    ///
    /// # Errors
    ///
    /// Returns [`FrameFormatError`] when the frame does not fit the schema.
    /// Nothing is injected for a rejected frame.
    pub fn handle_frame(&mut self, raw: &RawFrame) -> Result<(), FrameFormatError> {
        let frame = match parse_frame(raw, self.dispatcher.schema()) {
            Ok(frame) => frame,
            Err(e) => {
                self.stats.rejected += 1;
                return Err(e);
            }
        };

        self.stats.dispatched += 1;
        for event in self.dispatcher.dispatch(&frame) {
            self.inject(event);
        }
        Ok(())
    }

    /// Releases every button the device still holds.
    ///
    /// Called when the connection ends.
    pub fn release_all(&mut self) {
        for event in self.dispatcher.release_all() {
            self.inject(event);
        }
    }

    pub fn stats(&self) -> FrameStats {
        self.stats
    }

    fn inject(&mut self, event: InputEvent) {
        let result = match event {
            InputEvent::Move { dx, dy } => self.injector.move_relative(dx, dy),
            InputEvent::ButtonDown(role) => self.injector.button_down(role),
            InputEvent::ButtonUp(role) => self.injector.button_up(role),
        };
        if let Err(e) = result {
            self.stats.injection_failures += 1;
            error!(?event, "input injection failed: {e}");
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
