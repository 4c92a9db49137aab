//! Application layer use cases for joypointer.
//!
//! - **`pointer_actions`** – Parses raw telemetry frames, runs them through
//!   the edge-triggered [`ActionDispatcher`](joypointer_core::ActionDispatcher),
//!   and forwards the resulting events to an [`InputInjector`] implementation
//!   that is injected at construction time.

pub mod pointer_actions;

pub use pointer_actions::{InjectionError, InputInjector, PointerActionsUseCase};
