//! LG display emulator: entry point.
//!
//! Starts a set of virtual LG displays, a raw TCP control port that speaks the
//! LG network control protocol (`ka 01 01\r`), and a WebSocket endpoint that
//! streams every display change to browser dashboards.
//!
//! # Usage
//!
//! ```text
//! lgdisplay-emulator [OPTIONS]
//!
//! Options:
//!   --config <PATH>             TOML configuration file
//!   --command-bind <ADDR>       Control port address [default: 0.0.0.0:9761]
//!   --dashboard-bind <ADDR>     Dashboard WebSocket address [default: 0.0.0.0:3000]
//!   --ack                       Reply OK/NG to valid control commands
//!   --displays <N>              Displays created at startup [default: 1]
//!   --reboot-secs <SECS>        Restart duration [default: 30]
//!   --sweep-interval-ms <MS>    Restart completion check interval [default: 1000]
//!   --session-buffer <N>        Outbound frames buffered per viewer [default: 25]
//! ```
//!
//! Command-line values override the configuration file, which overrides the
//! built-in defaults.  Each option can also be set through the environment:
//!
//! | Variable                      | Option                |
//! |-------------------------------|-----------------------|
//! | `LGDISPLAY_CONFIG`            | `--config`            |
//! | `LGDISPLAY_COMMAND_BIND`      | `--command-bind`      |
//! | `LGDISPLAY_DASHBOARD_BIND`    | `--dashboard-bind`    |
//! | `LGDISPLAY_ACK`               | `--ack`               |
//! | `LGDISPLAY_DISPLAYS`          | `--displays`          |
//! | `LGDISPLAY_REBOOT_SECS`       | `--reboot-secs`       |
//! | `LGDISPLAY_SWEEP_INTERVAL_MS` | `--sweep-interval-ms` |
//! | `LGDISPLAY_SESSION_BUFFER`    | `--session-buffer`    |
//!
//! The log filter comes from `RUST_LOG`, falling back to the file's
//! `log_level`.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use lgdisplay_emulator::application::{run_sweep, DisplayRegistry, EventBus, NotificationHub};
use lgdisplay_emulator::domain::EmulatorConfig;
use lgdisplay_emulator::infrastructure::storage::config::{load_config, validate, FileConfig};
use lgdisplay_emulator::infrastructure::{CommandServer, DashboardServer};

// ── CLI argument definitions ──────────────────────────────────────────────────

/// Networked LG display emulator.
#[derive(Debug, Parser)]
#[command(
    name = "lgdisplay-emulator",
    about = "Emulates LG displays on a TCP control port with a live WebSocket dashboard",
    version
)]
struct Cli {
    /// TOML configuration file.
    #[arg(long, env = "LGDISPLAY_CONFIG")]
    config: Option<PathBuf>,

    /// Address of the raw TCP control port.
    #[arg(long, env = "LGDISPLAY_COMMAND_BIND")]
    command_bind: Option<String>,

    /// Address of the dashboard WebSocket listener.
    #[arg(long, env = "LGDISPLAY_DASHBOARD_BIND")]
    dashboard_bind: Option<String>,

    /// Reply `OK`/`NG` frames to valid control commands.
    #[arg(long, env = "LGDISPLAY_ACK")]
    ack: bool,

    /// Number of displays created at startup.
    #[arg(long, env = "LGDISPLAY_DISPLAYS")]
    displays: Option<u32>,

    /// Seconds a restarting display takes to come back on.
    #[arg(long, env = "LGDISPLAY_REBOOT_SECS")]
    reboot_secs: Option<u64>,

    /// Milliseconds between checks for finished restarts.
    #[arg(long, env = "LGDISPLAY_SWEEP_INTERVAL_MS")]
    sweep_interval_ms: Option<u64>,

    /// Outbound frames buffered per dashboard viewer before it is evicted.
    #[arg(long, env = "LGDISPLAY_SESSION_BUFFER")]
    session_buffer: Option<usize>,
}

impl Cli {
    /// Merges the configuration file (if any) with command-line overrides.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be loaded, an address does not
    /// parse, or a value is out of range.
    fn into_emulator_config(self) -> anyhow::Result<EmulatorConfig> {
        let file = match &self.config {
            Some(path) => load_config(path)
                .with_context(|| format!("failed to load config {}", path.display()))?,
            None => FileConfig::default(),
        };
        let mut config = file
            .into_emulator_config()
            .context("invalid configuration file")?;

        if let Some(bind) = &self.command_bind {
            config.command_bind_addr = parse_addr(bind, "--command-bind")?;
        }
        if let Some(bind) = &self.dashboard_bind {
            config.dashboard_bind_addr = parse_addr(bind, "--dashboard-bind")?;
        }
        if self.ack {
            config.ack = true;
        }
        if let Some(displays) = self.displays {
            config.initial_displays = displays;
        }
        if let Some(secs) = self.reboot_secs {
            config.reboot_duration = Duration::from_secs(secs);
        }
        if let Some(ms) = self.sweep_interval_ms {
            config.sweep_interval = Duration::from_millis(ms);
        }
        if let Some(buffer) = self.session_buffer {
            config.session_buffer = buffer;
        }

        validate(&config).context("invalid command-line option")?;
        Ok(config)
    }
}

fn parse_addr(value: &str, option: &str) -> anyhow::Result<SocketAddr> {
    value
        .parse()
        .with_context(|| format!("invalid {option} address: '{value}'"))
}

// ── Entry point ───────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Cli::parse().into_emulator_config()?;

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(&config.log_level)),
        )
        .init();

    info!(
        "LG display emulator starting: control={}, dashboard={}, displays={}, ack={}",
        config.command_bind_addr, config.dashboard_bind_addr, config.initial_displays, config.ack
    );

    // ── Core services ─────────────────────────────────────────────────────────
    let bus = Arc::new(EventBus::new());
    let registry = Arc::new(DisplayRegistry::with_reboot_duration(
        Arc::clone(&bus),
        config.reboot_duration,
    ));
    let (hub, hub_handle) = NotificationHub::new(registry.clone());
    let _hub_task = hub.start(&bus);

    // ── Listeners (bind failure aborts startup) ───────────────────────────────
    let command_server = CommandServer::bind(config.command_bind_addr, registry.clone(), config.ack)
        .await
        .context("failed to start control port")?;
    let dashboard_server =
        DashboardServer::bind(config.dashboard_bind_addr, hub_handle, config.session_buffer)
            .await
            .context("failed to start dashboard")?;

    for _ in 0..config.initial_displays {
        registry.create_display().await;
    }

    // ── Graceful shutdown flag ────────────────────────────────────────────────
    let running = Arc::new(AtomicBool::new(true));
    let running_clone = Arc::clone(&running);
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                info!("received Ctrl+C; shutting down");
                running_clone.store(false, Ordering::Relaxed);
            }
            Err(e) => error!("failed to listen for Ctrl+C signal: {e}"),
        }
    });

    let sweep = tokio::spawn(run_sweep(
        Arc::clone(&registry),
        config.sweep_interval,
        Arc::clone(&running),
    ));

    tokio::join!(
        command_server.run(Arc::clone(&running)),
        dashboard_server.run(Arc::clone(&running)),
    );
    sweep.await.context("restart sweep task failed")?;

    info!("LG display emulator stopped");
    Ok(())
}

// ── Tests ─────────────────────────────────────────────────────────────────────
