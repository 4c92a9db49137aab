//! Serial infrastructure: everything that touches the joystick's port.
//!
//! # Sub-modules
//!
//! - **`transport`** – The `SerialTransport` / `SerialLink` seam over a
//!   byte-stream port, plus the bounded "drain what has arrived" helper.
//!
//! - **`native`** – The real transport, backed by the `serialport` crate
//!   (9600-8-N-1, no flow control, exclusive open).
//!
//! - **`mock`** – An in-memory transport with a scripted fake joystick, used
//!   by unit and integration tests.
//!
//! - **`scanner`** – Candidate enumeration per OS and the exclusive-open
//!   filter that turns candidates into probe targets.
//!
//! - **`prober`** – The `'0'` → `HELLO` handshake.
//!
//! - **`liveness`** / **`session`** – The per-connection reader and heartbeat
//!   tasks and the signal they use to stop each other.
//!
//! - **`supervisor`** – The Scanning / Probing / Connected / Lost state
//!   machine that owns the link and never gives up.

pub mod liveness;
pub mod mock;
pub mod native;
pub mod prober;
pub mod scanner;
pub mod session;
pub mod supervisor;
pub mod transport;

pub use native::NativeTransport;
pub use prober::{HandshakeConfig, HandshakeProber, ProbeError};
pub use scanner::{CandidateSource, PinnedCandidates, PlatformCandidates, PortScanner};
pub use supervisor::{ConnectionState, LinkEvent, LinkSupervisor, SupervisorConfig};
pub use transport::{LinkSettings, SerialLink, SerialTransport, TransportError};
