//! JoyPointer entry point.
//!
//! Loads the configuration, picks the pointer injection backend, and runs the
//! link supervisor until Ctrl+C.
//!
//! # Usage
//!
//! ```text
//! joypointer [OPTIONS]
//!
//! Options:
//!   --config <PATH>    Config file [default: platform config dir]
//!   --schema <SCHEMA>  legacy | extended
//!   --port <PATH>      Probe only this port (repeatable)
//!   --dry-run          Log pointer events instead of injecting them
//!   --save-config      Write the effective configuration and exit
//! ```
//!
//! | Variable             | Equivalent flag |
//! |----------------------|-----------------|
//! | `JOYPOINTER_CONFIG`  | `--config`      |
//! | `JOYPOINTER_SCHEMA`  | `--schema`      |
//! | `JOYPOINTER_PORTS`   | `--port` (comma separated) |
//!
//! Flags take precedence over the config file.
//!
//! # Architecture
//!
//! ```text
//! main()
//!  └─ LinkSupervisor::start()       -- scan / probe / connected / lost loop
//!       ├─ reader (blocking pool)   -- frames → PointerActionsUseCase → injector
//!       └─ heartbeat (async task)   -- '2' every heartbeat interval
//!  └─ LinkEvent loop                -- logs connections and losses
//! ```

use std::path::PathBuf;
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};

use anyhow::Context;
use clap::Parser;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use joypointer::application::InputInjector;
use joypointer::infrastructure::input_injection::{ButtonMap, LoggingInputInjector};
use joypointer::infrastructure::serial::{
    CandidateSource, LinkEvent, LinkSupervisor, NativeTransport, PinnedCandidates,
    PlatformCandidates,
};
use joypointer::infrastructure::storage::config::{
    config_file_path, load_config_from, save_config_to, AppConfig,
};
use joypointer_core::FrameSchema;

// ── CLI argument definitions ──────────────────────────────────────────────────

/// Serial joystick to host pointer bridge.
#[derive(Debug, Parser)]
#[command(
    name = "joypointer",
    about = "Drives the host pointer from a serial joystick",
    version
)]
struct Cli {
    /// Path of the TOML config file.
    #[arg(long, env = "JOYPOINTER_CONFIG")]
    config: Option<PathBuf>,

    /// Frame schema the device speaks: `legacy` or `extended`.
    #[arg(long, env = "JOYPOINTER_SCHEMA")]
    schema: Option<FrameSchema>,

    /// Probe only these ports instead of enumerating the platform's.
    #[arg(long = "port", env = "JOYPOINTER_PORTS", value_delimiter = ',')]
    ports: Vec<String>,

    /// Log pointer events instead of injecting them.
    #[arg(long)]
    dry_run: bool,

    /// Write the effective configuration to the config path and exit.
    #[arg(long)]
    save_config: bool,
}

impl Cli {
    /// Resolves the config path: the flag if given, the platform path otherwise.
    fn config_path(&self) -> anyhow::Result<PathBuf> {
        match &self.config {
            Some(path) => Ok(path.clone()),
            None => config_file_path().context("no config path given and no platform config dir"),
        }
    }

    /// Applies flag overrides on top of the file configuration.
    fn apply(&self, mut config: AppConfig) -> AppConfig {
        if let Some(schema) = self.schema {
            config.link.schema = schema;
        }
        if !self.ports.is_empty() {
            config.link.candidate_ports = self.ports.clone();
        }
        config
    }
}

// ── Wiring ────────────────────────────────────────────────────────────────────

fn candidate_source(config: &AppConfig) -> Arc<dyn CandidateSource> {
    if config.link.candidate_ports.is_empty() {
        Arc::new(PlatformCandidates)
    } else {
        Arc::new(PinnedCandidates(config.link.candidate_ports.clone()))
    }
}

/// Picks the native backend for this OS, or the logging injector for dry
/// runs and when the native backend is unavailable.
fn build_injector(dry_run: bool, buttons: ButtonMap) -> Arc<dyn InputInjector> {
    if dry_run {
        info!("dry run: pointer events will only be logged");
        return Arc::new(LoggingInputInjector::new(buttons));
    }

    match native_injector(buttons) {
        Ok(injector) => injector,
        Err(e) => {
            warn!("native pointer injection unavailable, falling back to logging: {e}");
            Arc::new(LoggingInputInjector::new(buttons))
        }
    }
}

#[cfg(target_os = "windows")]
fn native_injector(buttons: ButtonMap) -> anyhow::Result<Arc<dyn InputInjector>> {
    use joypointer::infrastructure::input_injection::windows::WindowsInputInjector;
    Ok(Arc::new(WindowsInputInjector::new(buttons)))
}

#[cfg(target_os = "linux")]
fn native_injector(buttons: ButtonMap) -> anyhow::Result<Arc<dyn InputInjector>> {
    use joypointer::infrastructure::input_injection::linux::LinuxXTestInjector;
    let injector = LinuxXTestInjector::new(buttons).context("XTest injector")?;
    Ok(Arc::new(injector))
}

#[cfg(target_os = "macos")]
fn native_injector(buttons: ButtonMap) -> anyhow::Result<Arc<dyn InputInjector>> {
    use joypointer::infrastructure::input_injection::macos::MacosInputInjector;
    let injector = MacosInputInjector::new(buttons).context("Core Graphics injector")?;
    Ok(Arc::new(injector))
}

#[cfg(not(any(target_os = "windows", target_os = "linux", target_os = "macos")))]
fn native_injector(_buttons: ButtonMap) -> anyhow::Result<Arc<dyn InputInjector>> {
    anyhow::bail!("no native pointer backend for this platform")
}

// ── Entry point ───────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let path = cli.config_path()?;
    let config = cli.apply(
        load_config_from(&path)
            .with_context(|| format!("loading config from {}", path.display()))?,
    );

    // RUST_LOG wins over the configured level.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(&config.logging.level)),
        )
        .init();

    if cli.save_config {
        save_config_to(&path, &config)
            .with_context(|| format!("writing config to {}", path.display()))?;
        info!("configuration written to {}", path.display());
        return Ok(());
    }

    info!(
        schema = %config.link.schema,
        baud = config.link.baud_rate,
        "JoyPointer starting"
    );

    let injector = build_injector(cli.dry_run, config.buttons);
    let supervisor = LinkSupervisor::new(
        config.to_supervisor_config(),
        candidate_source(&config),
        Arc::new(NativeTransport::new(config.link_settings())),
        injector,
    );

    // ── Shutdown flag ─────────────────────────────────────────────────────────
    let running = Arc::new(AtomicBool::new(true));
    let running_clone = Arc::clone(&running);
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                info!("received Ctrl+C, shutting down");
                running_clone.store(false, Ordering::Relaxed);
            }
            Err(e) => error!("failed to listen for Ctrl+C signal: {e}"),
        }
    });

    // ── Event loop ────────────────────────────────────────────────────────────
    let mut events = supervisor.start(Arc::clone(&running));
    while let Some(event) = events.recv().await {
        match event {
            LinkEvent::Connected { port } => info!(port = %port, "pointer control active"),
            LinkEvent::Lost {
                port,
                reason,
                stats,
            } => info!(
                port = %port,
                dispatched = stats.dispatched,
                rejected = stats.rejected,
                injection_failures = stats.injection_failures,
                discarded_bytes = stats.discarded_bytes,
                "pointer control stopped: {reason}"
            ),
            LinkEvent::StateChanged { .. } => {}
        }
    }

    info!("JoyPointer stopped");
    Ok(())
}

// ── Tests ─────────────────────────────────────────────────────────────────────
