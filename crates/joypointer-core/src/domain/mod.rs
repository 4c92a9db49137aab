//! Domain layer: what a decoded frame means for the host pointer.
//!
//! - **`input`** – the events the dispatcher produces (`Move`, `ButtonDown`,
//!   `ButtonUp`) and the abstract button roles they refer to.
//! - **`dispatch`** – the edge-triggered [`ActionDispatcher`](dispatch::ActionDispatcher)
//!   and the per-connection button snapshot it owns.

pub mod dispatch;
pub mod input;
