//! The two per-connection tasks: a blocking reader and an async heartbeat.
//!
//! Both share the link through a [`SharedLink`] mutex and stop when the
//! connection's [`Liveness`] is revoked.  Each checks liveness while holding
//! the link lock, so once the flag flips neither task touches the port
//! again.  The supervisor joins both before it drops the link.
//!
//! ```text
//!              ┌──────────── SharedLink ────────────┐
//!   reader ────┤ read ≤ read_poll → decode → inject │
//!   heartbeat ─┤ write '2' every heartbeat_interval │
//!              └────────────────────────────────────┘
//!                   either fails → Liveness::revoke()
//! ```

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use joypointer_core::{DecodeError, FrameDecoder, HostCommand};
use thiserror::Error;
use tracing::{debug, trace};

use super::liveness::Liveness;
use super::prober::HandshakeConfig;
use super::transport::{drain_available, SerialLink, TransportError};
use crate::application::pointer_actions::{FrameStats, PointerActionsUseCase};

/// The link handle shared by the reader and heartbeat of one connection.
pub type SharedLink = Arc<Mutex<Box<dyn SerialLink>>>;

/// Locks `link`, recovering the guard if a task panicked while holding it.
pub fn lock_link(link: &SharedLink) -> MutexGuard<'_, Box<dyn SerialLink>> {
    link.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Why an established connection ended.
#[derive(Debug, Error)]
pub enum LinkError {
    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error("undecodable bytes from {port}: {source}")]
    Decode {
        port: String,
        #[source]
        source: DecodeError,
    },

    #[error("no data from {port} for {idle:?}")]
    IdleTimeout { port: String, idle: Duration },

    #[error("link task failed: {0}")]
    Task(String),
}

/// Reader timing and decoder sizing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReaderConfig {
    /// Bounded wait of a single read.
    pub read_poll: Duration,
    /// Silence after which the link is declared lost.
    pub idle_timeout: Duration,
    /// Cap on unmatched decoder residue.
    pub max_buffer_len: usize,
}

/// What the reader reports when it stops.
#[derive(Debug)]
pub struct ReaderOutcome {
    /// `None` when the reader stopped because liveness was revoked elsewhere.
    pub error: Option<LinkError>,
    pub stats: FrameStats,
}

/// Writes `'1'` `repeat_count` times with the handshake spacing.
///
/// Returns whatever the device sent back in the meantime; frames may already
/// be in there, so the caller hands the bytes to the reader.
///
/// # Errors
///
/// Returns the first [`TransportError`] from the link.
pub fn start_streaming(link: &SharedLink, config: &HandshakeConfig) -> Result<Vec<u8>, TransportError> {
    let mut received = Vec::new();
    for _ in 0..config.repeat_count {
        lock_link(link).write_all(HostCommand::StartStreaming.as_bytes())?;
        std::thread::sleep(config.repeat_delay);
        let mut guard = lock_link(link);
        received.extend(drain_available(guard.as_mut())?);
    }
    Ok(received)
}

/// Blocking reader loop.  Runs on the blocking pool until the link fails,
/// goes idle, or liveness is revoked.
///
/// On exit it revokes liveness (stopping the heartbeat) and releases every
/// button the device was still holding.
pub fn run_reader(
    link: SharedLink,
    liveness: Liveness,
    mut actions: PointerActionsUseCase,
    config: ReaderConfig,
    initial: Vec<u8>,
) -> ReaderOutcome {
    let port = lock_link(&link).port().to_string();
    let mut decoder = FrameDecoder::new(config.max_buffer_len);
    let mut buf = [0u8; 256];
    let mut last_data = Instant::now();

    let mut pending = Some(initial);
    let error = loop {
        let bytes = match pending.take() {
            Some(initial) => initial,
            None => {
                let read = {
                    let mut guard = lock_link(&link);
                    if !liveness.is_alive() {
                        break None;
                    }
                    guard.read_available(&mut buf, config.read_poll)
                };
                match read {
                    Ok(n) => buf[..n].to_vec(),
                    Err(e) => break Some(LinkError::from(e)),
                }
            }
        };

        if bytes.is_empty() {
            let idle = last_data.elapsed();
            if idle >= config.idle_timeout {
                break Some(LinkError::IdleTimeout {
                    port: port.clone(),
                    idle,
                });
            }
            continue;
        }

        last_data = Instant::now();
        let frames = match decoder.push(&bytes) {
            Ok(frames) => frames,
            Err(source) => {
                break Some(LinkError::Decode {
                    port: port.clone(),
                    source,
                })
            }
        };
        for raw in &frames {
            trace!(frame = %raw, "frame received");
            if let Err(e) = actions.handle_frame(raw) {
                debug!(frame = %raw, "discarding malformed frame: {e}");
            }
        }
    };

    liveness.revoke();
    actions.release_all();
    let mut stats = actions.stats();
    stats.discarded_bytes = decoder.discarded_bytes() as u64;
    ReaderOutcome { error, stats }
}

/// Async heartbeat loop: writes `'2'` immediately and then every `interval`
/// until liveness is revoked or a write fails.
///
/// # Errors
///
/// Returns [`LinkError::Transport`] when a write fails and
/// [`LinkError::Task`] if the blocking write task panicked.  Liveness is
/// revoked before either is returned.
pub async fn run_heartbeat(
    link: SharedLink,
    liveness: Liveness,
    interval: Duration,
) -> Result<(), LinkError> {
    loop {
        let write_link = Arc::clone(&link);
        let write_liveness = liveness.clone();
        let written = tokio::task::spawn_blocking(move || {
            let mut guard = lock_link(&write_link);
            if !write_liveness.is_alive() {
                return Ok(false);
            }
            guard.write_all(HostCommand::KeepAlive.as_bytes()).map(|()| true)
        })
        .await;

        match written {
            Ok(Ok(true)) => trace!("heartbeat sent"),
            Ok(Ok(false)) => return Ok(()),
            Ok(Err(e)) => {
                liveness.revoke();
                return Err(e.into());
            }
            Err(join) => {
                liveness.revoke();
                return Err(LinkError::Task(join.to_string()));
            }
        }

        tokio::select! {
            _ = tokio::time::sleep(interval) => {}
            _ = liveness.revoked() => return Ok(()),
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::input_injection::mock::RecordingInjector;
    use crate::infrastructure::serial::mock::{AfterScript, FakeDevice, MockTransport};
    use crate::infrastructure::serial::transport::SerialTransport;
    use joypointer_core::{ButtonRole, FrameSchema, InputEvent};

    fn open_shared(device: FakeDevice) -> SharedLink {
        let transport = MockTransport::new().with_device("COM7", device);
        let mut link = transport.open("COM7").unwrap();
        link.write_all(HostCommand::StartStreaming.as_bytes()).unwrap();
        Arc::new(Mutex::new(link))
    }

    fn reader_config() -> ReaderConfig {
        ReaderConfig {
            read_poll: Duration::from_millis(5),
            idle_timeout: Duration::from_millis(50),
            max_buffer_len: 512,
        }
    }

    fn actions(injector: &Arc<RecordingInjector>, schema: FrameSchema) -> PointerActionsUseCase {
        PointerActionsUseCase::new(Arc::clone(injector) as _, schema)
    }

    // ── Reader ────────────────────────────────────────────────────────────────

    #[test]
    fn test_reader_dispatches_fragmented_frames_then_times_out() {
        // Arrange
        let device = FakeDevice::joystick()
            .with_stream(["S+3:-", "2:1:0:0ES+0:+0:0:1", ":0E"])
            .then(AfterScript::GoSilent);
        let link = open_shared(device);
        let injector = Arc::new(RecordingInjector::new());
        let liveness = Liveness::new();

        // Act
        let outcome = run_reader(
            link,
            liveness.clone(),
            actions(&injector, FrameSchema::Extended),
            reader_config(),
            Vec::new(),
        );

        // Assert
        assert!(matches!(outcome.error, Some(LinkError::IdleTimeout { .. })));
        assert_eq!(outcome.stats.dispatched, 2);
        assert!(!liveness.is_alive());
        assert_eq!(
            injector.events(),
            vec![
                InputEvent::Move { dx: 3, dy: -2 },
                InputEvent::ButtonDown(ButtonRole::Primary),
                InputEvent::Move { dx: 0, dy: 0 },
                InputEvent::ButtonUp(ButtonRole::Primary),
                InputEvent::ButtonDown(ButtonRole::Secondary),
                // Released on exit.
                InputEvent::ButtonUp(ButtonRole::Secondary),
            ]
        );
    }

    #[test]
    fn test_reader_counts_rejected_frames_without_disconnecting() {
        let device = FakeDevice::joystick()
            .with_stream(["S+10:-5:1EjunkS+0:+0:0:1:0E"])
            .then(AfterScript::GoSilent);
        let injector = Arc::new(RecordingInjector::new());

        let outcome = run_reader(
            open_shared(device),
            Liveness::new(),
            actions(&injector, FrameSchema::Extended),
            reader_config(),
            Vec::new(),
        );

        assert_eq!(outcome.stats.rejected, 1);
        assert_eq!(outcome.stats.dispatched, 1);
        assert!(matches!(outcome.error, Some(LinkError::IdleTimeout { .. })));
    }

    #[test]
    fn test_reader_reports_bytes_dropped_by_buffer_bound() {
        // Arrange
        let device = FakeDevice::joystick()
            .with_stream(["line-noise-here", "S+1:+1:0:0:0E"])
            .then(AfterScript::GoSilent);
        let injector = Arc::new(RecordingInjector::new());
        let config = ReaderConfig {
            max_buffer_len: 8,
            ..reader_config()
        };

        // Act
        let outcome = run_reader(
            open_shared(device),
            Liveness::new(),
            actions(&injector, FrameSchema::Extended),
            config,
            Vec::new(),
        );

        // Assert
        assert_eq!(outcome.stats.discarded_bytes, 15);
        assert_eq!(outcome.stats.dispatched, 1);
    }

    #[test]
    fn test_reader_stops_on_transport_error() {
        let device = FakeDevice::joystick().then(AfterScript::FailReads);
        let injector = Arc::new(RecordingInjector::new());

        let outcome = run_reader(
            open_shared(device),
            Liveness::new(),
            actions(&injector, FrameSchema::Legacy),
            reader_config(),
            Vec::new(),
        );

        assert!(matches!(outcome.error, Some(LinkError::Transport(_))));
    }

    #[test]
    fn test_reader_stops_on_invalid_utf8() {
        let device = FakeDevice::joystick()
            .with_stream([vec![b'S', 0xFF, 0xFE, b'E']])
            .then(AfterScript::GoSilent);
        let injector = Arc::new(RecordingInjector::new());

        let outcome = run_reader(
            open_shared(device),
            Liveness::new(),
            actions(&injector, FrameSchema::Legacy),
            reader_config(),
            Vec::new(),
        );

        assert!(matches!(outcome.error, Some(LinkError::Decode { .. })));
    }

    #[test]
    fn test_reader_exits_cleanly_when_already_revoked() {
        let device = FakeDevice::joystick().then(AfterScript::RepeatLast);
        let injector = Arc::new(RecordingInjector::new());
        let liveness = Liveness::new();
        liveness.revoke();

        let outcome = run_reader(
            open_shared(device),
            liveness,
            actions(&injector, FrameSchema::Legacy),
            reader_config(),
            Vec::new(),
        );

        assert!(outcome.error.is_none());
    }

    #[test]
    fn test_reader_decodes_initial_bytes_first() {
        let device = FakeDevice::joystick().then(AfterScript::GoSilent);
        let injector = Arc::new(RecordingInjector::new());

        let outcome = run_reader(
            open_shared(device),
            Liveness::new(),
            actions(&injector, FrameSchema::Legacy),
            reader_config(),
            b"S+1:+1:0E".to_vec(),
        );

        assert_eq!(outcome.stats.dispatched, 1);
    }

    // ── Start burst ───────────────────────────────────────────────────────────

    #[test]
    fn test_start_streaming_writes_start_byte_repeat_count_times() {
        // Arrange
        let device = FakeDevice::joystick().with_stream(["S+1:+1:0E"]);
        let transport = MockTransport::new().with_device("COM7", device.clone());
        let link: SharedLink = Arc::new(Mutex::new(transport.open("COM7").unwrap()));
        let config = HandshakeConfig {
            repeat_count: 5,
            repeat_delay: Duration::from_millis(1),
            settle_delay: Duration::ZERO,
        };

        // Act
        let received = start_streaming(&link, &config).unwrap();

        // Assert
        assert_eq!(device.count_of(HostCommand::StartStreaming), 5);
        assert_eq!(received, b"S+1:+1:0E");
    }

    // ── Heartbeat ─────────────────────────────────────────────────────────────

    #[tokio::test]
    async fn test_heartbeat_writes_until_revoked() {
        // Arrange
        let device = FakeDevice::joystick();
        let link = open_shared(device.clone());
        let liveness = Liveness::new();
        let task = tokio::spawn(run_heartbeat(
            link,
            liveness.clone(),
            Duration::from_millis(10),
        ));

        // Act
        tokio::time::sleep(Duration::from_millis(60)).await;
        liveness.revoke();
        let result = tokio::time::timeout(Duration::from_secs(1), task).await;

        // Assert
        assert!(matches!(result, Ok(Ok(Ok(())))));
        assert!(device.count_of(HostCommand::KeepAlive) >= 2);
    }

    #[tokio::test]
    async fn test_heartbeat_sends_nothing_after_revoke() {
        let device = FakeDevice::joystick();
        let liveness = Liveness::new();
        liveness.revoke();

        run_heartbeat(open_shared(device.clone()), liveness, Duration::from_millis(10))
            .await
            .unwrap();

        assert_eq!(device.count_of(HostCommand::KeepAlive), 0);
    }
}
