//! LinkSupervisor: the scan → probe → connected → lost state machine.
//!
//! ```text
//!            candidates found
//!  Scanning ────────────────▶ Probing ── handshake ok ──▶ Connected
//!     ▲  ▲                       │                           │
//!     │  └── none answered ──────┘          transport error, │
//!     │                                     bad bytes, idle  ▼
//!     └──────────────────────────────────────────────────── Lost
//! ```
//!
//! The supervisor is the only owner of the link.  While connected it runs a
//! blocking reader and an async heartbeat, waits for either to revoke the
//! connection's [`Liveness`], then joins both before dropping (closing) the
//! link.  It never gives up: every failure ends in `Scanning` again, until
//! the shared `running` flag is cleared or the event receiver is dropped.
//!
//! Transitions and connection outcomes are published as [`LinkEvent`]s.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use joypointer_core::FrameSchema;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use super::liveness::Liveness;
use super::prober::{HandshakeConfig, HandshakeProber};
use super::scanner::{CandidateSource, PortScanner};
use super::session::{run_heartbeat, run_reader, start_streaming, LinkError, ReaderConfig, SharedLink};
use super::transport::{SerialLink, SerialTransport};
use crate::application::pointer_actions::{FrameStats, InputInjector, PointerActionsUseCase};

/// Where the supervisor is in its cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConnectionState {
    Scanning,
    Probing,
    Connected,
    Lost,
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ConnectionState::Scanning => "scanning",
            ConnectionState::Probing => "probing",
            ConnectionState::Connected => "connected",
            ConnectionState::Lost => "lost",
        })
    }
}

/// Observable supervisor activity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LinkEvent {
    StateChanged {
        from: ConnectionState,
        to: ConnectionState,
    },
    /// A handshake succeeded on `port`.
    Connected { port: String },
    /// The connection on `port` ended.
    Lost {
        port: String,
        reason: String,
        stats: FrameStats,
    },
}

/// Everything the supervisor needs to know about timing and framing.
#[derive(Debug, Clone)]
pub struct SupervisorConfig {
    pub schema: FrameSchema,
    pub handshake: HandshakeConfig,
    pub read_poll: Duration,
    pub idle_timeout: Duration,
    pub heartbeat_interval: Duration,
    /// Pause after a scan cycle that found no device.
    pub rescan_backoff: Duration,
    pub max_buffer_len: usize,
}

impl Default for SupervisorConfig {
    fn default() -> Self {
        Self {
            schema: FrameSchema::default(),
            handshake: HandshakeConfig::default(),
            read_poll: Duration::from_millis(100),
            idle_timeout: Duration::from_secs(10),
            heartbeat_interval: Duration::from_secs(3),
            rescan_backoff: Duration::from_millis(500),
            max_buffer_len: joypointer_core::protocol::decoder::DEFAULT_MAX_BUFFER_LEN,
        }
    }
}

impl SupervisorConfig {
    fn reader(&self) -> ReaderConfig {
        ReaderConfig {
            read_poll: self.read_poll,
            idle_timeout: self.idle_timeout,
            max_buffer_len: self.max_buffer_len,
        }
    }
}

/// Drives the link lifecycle for the whole process lifetime.
pub struct LinkSupervisor {
    config: SupervisorConfig,
    scanner: Arc<PortScanner>,
    prober: Arc<HandshakeProber>,
    injector: Arc<dyn InputInjector>,
    state: ConnectionState,
    last_port: Option<String>,
}

impl LinkSupervisor {
    pub fn new(
        config: SupervisorConfig,
        candidates: Arc<dyn CandidateSource>,
        transport: Arc<dyn SerialTransport>,
        injector: Arc<dyn InputInjector>,
    ) -> Self {
        let scanner = PortScanner::new(candidates, Arc::clone(&transport));
        let prober = HandshakeProber::new(transport, config.handshake);
        Self {
            config,
            scanner: Arc::new(scanner),
            prober: Arc::new(prober),
            injector,
            state: ConnectionState::Scanning,
            last_port: None,
        }
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    /// Spawns the supervisor loop and returns its event stream.
    ///
    /// The loop runs until `running` is cleared, and the receiver then yields
    /// `None`.  Dropping the receiver stops the loop as well, closing any
    /// open link.
    pub fn start(self, running: Arc<AtomicBool>) -> mpsc::Receiver<LinkEvent> {
        let (tx, rx) = mpsc::channel(128);
        tokio::spawn(self.run(running, tx));
        rx
    }

    async fn run(mut self, running: Arc<AtomicBool>, tx: mpsc::Sender<LinkEvent>) {
        info!(schema = %self.config.schema, "link supervisor started");

        while keep_running(&running, &tx) {
            let Some(link) = self.acquire(&running, &tx).await else {
                self.transition(ConnectionState::Scanning, &tx).await;
                if keep_running(&running, &tx) {
                    tokio::time::sleep(self.config.rescan_backoff).await;
                }
                continue;
            };

            let port = link.port().to_string();
            self.last_port = Some(port.clone());
            self.transition(ConnectionState::Connected, &tx).await;
            info!(port = %port, "joystick link established");
            publish(&tx, LinkEvent::Connected { port: port.clone() }).await;

            let (reason, stats) = self.run_connection(link, &running, &tx).await;

            self.transition(ConnectionState::Lost, &tx).await;
            warn!(
                port = %port,
                dispatched = stats.dispatched,
                rejected = stats.rejected,
                discarded_bytes = stats.discarded_bytes,
                "joystick link lost: {reason}"
            );
            publish(
                &tx,
                LinkEvent::Lost {
                    port,
                    reason,
                    stats,
                },
            )
            .await;
            self.transition(ConnectionState::Scanning, &tx).await;
        }

        info!("link supervisor stopped");
    }

    /// One scan cycle followed by probing each candidate in order.
    async fn acquire(
        &mut self,
        running: &Arc<AtomicBool>,
        tx: &mpsc::Sender<LinkEvent>,
    ) -> Option<Box<dyn SerialLink>> {
        let scanner = Arc::clone(&self.scanner);
        let owned = self.last_port.clone();
        let candidates = match tokio::task::spawn_blocking(move || scanner.scan(owned.as_deref())).await {
            Ok(candidates) => candidates,
            Err(e) => {
                warn!("port scan task failed: {e}");
                return None;
            }
        };
        if candidates.is_empty() {
            return None;
        }

        self.transition(ConnectionState::Probing, tx).await;
        for port in candidates {
            if !keep_running(running, tx) {
                return None;
            }
            let prober = Arc::clone(&self.prober);
            let probe_port = port.clone();
            match tokio::task::spawn_blocking(move || prober.handshake(&probe_port)).await {
                Ok(Ok(link)) => return Some(link),
                Ok(Err(e)) => debug!(port = %port, "candidate rejected: {e}"),
                Err(e) => warn!(port = %port, "probe task failed: {e}"),
            }
        }
        None
    }

    /// Runs the start burst, reader, and heartbeat on `link` until the
    /// connection ends.  Returns the reason and frame counters.
    async fn run_connection(
        &self,
        link: Box<dyn SerialLink>,
        running: &Arc<AtomicBool>,
        tx: &mpsc::Sender<LinkEvent>,
    ) -> (String, FrameStats) {
        let link: SharedLink = Arc::new(Mutex::new(link));

        let burst_link = Arc::clone(&link);
        let handshake = self.config.handshake;
        let initial = match tokio::task::spawn_blocking(move || start_streaming(&burst_link, &handshake)).await {
            Ok(Ok(bytes)) => bytes,
            Ok(Err(e)) => return (LinkError::from(e).to_string(), FrameStats::default()),
            Err(e) => return (LinkError::Task(e.to_string()).to_string(), FrameStats::default()),
        };

        let liveness = Liveness::new();
        let actions = PointerActionsUseCase::new(Arc::clone(&self.injector), self.config.schema);
        let reader = {
            let link = Arc::clone(&link);
            let liveness = liveness.clone();
            let config = self.config.reader();
            tokio::task::spawn_blocking(move || run_reader(link, liveness, actions, config, initial))
        };
        let heartbeat = tokio::spawn(run_heartbeat(
            Arc::clone(&link),
            liveness.clone(),
            self.config.heartbeat_interval,
        ));

        loop {
            tokio::select! {
                _ = liveness.revoked() => break,
                _ = tx.closed() => {
                    liveness.revoke();
                    break;
                }
                _ = tokio::time::sleep(self.config.read_poll) => {
                    if !running.load(Ordering::Relaxed) {
                        liveness.revoke();
                        break;
                    }
                }
            }
        }

        let reader = reader.await;
        let heartbeat = heartbeat.await;
        // Both tasks are joined; this is the last handle and closes the port.
        drop(link);

        let (reader_error, stats) = match reader {
            Ok(outcome) => (outcome.error, outcome.stats),
            Err(e) => (Some(LinkError::Task(e.to_string())), FrameStats::default()),
        };
        let heartbeat_error = match heartbeat {
            Ok(result) => result.err(),
            Err(e) => Some(LinkError::Task(e.to_string())),
        };

        let reason = reader_error
            .or(heartbeat_error)
            .map(|e| e.to_string())
            .unwrap_or_else(|| "shutdown requested".to_string());
        (reason, stats)
    }

    async fn transition(&mut self, to: ConnectionState, tx: &mpsc::Sender<LinkEvent>) {
        let from = self.state;
        if from == to {
            return;
        }
        self.state = to;
        info!(%from, %to, "connection state changed");
        publish(tx, LinkEvent::StateChanged { from, to }).await;
    }
}

fn keep_running(running: &AtomicBool, tx: &mpsc::Sender<LinkEvent>) -> bool {
    running.load(Ordering::Relaxed) && !tx.is_closed()
}

/// Sends `event`; a dropped receiver is picked up by [`keep_running`].
async fn publish(tx: &mpsc::Sender<LinkEvent>, event: LinkEvent) {
    if tx.send(event).await.is_err() {
        debug!("link event receiver dropped");
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
