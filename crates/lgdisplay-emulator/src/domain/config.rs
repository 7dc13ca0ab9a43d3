//! Emulator configuration types.
//!
//! [`EmulatorConfig`] is the single source of truth for runtime settings.
//! `main.rs` builds it from the optional TOML file and the CLI; tests build it
//! directly or start from [`EmulatorConfig::default`].

use std::net::SocketAddr;
use std::time::Duration;

use lgdisplay_core::REBOOT_DURATION;

/// All runtime configuration for the emulator.
///
/// # Example
///
/// ```rust
/// use lgdisplay_emulator::domain::EmulatorConfig;
///
/// let cfg = EmulatorConfig::default();
/// assert_eq!(cfg.command_bind_addr.port(), 9761);
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct EmulatorConfig {
    /// Address of the raw TCP control port.
    pub command_bind_addr: SocketAddr,

    /// Address of the dashboard WebSocket listener.
    pub dashboard_bind_addr: SocketAddr,

    /// Reply `OK`/`NG` frames to valid control commands.
    ///
    /// Off by default: the emulated device silently accepts commands.
    pub ack: bool,

    /// Displays created at startup.
    pub initial_displays: u32,

    /// How long a restart takes before the display is back on.
    pub reboot_duration: Duration,

    /// How often the registry looks for finished restarts.
    pub sweep_interval: Duration,

    /// Outbound buffer per dashboard session.  A session whose buffer fills
    /// up is evicted.
    pub session_buffer: usize,

    /// `tracing` filter used when `RUST_LOG` is unset.
    pub log_level: String,
}

impl Default for EmulatorConfig {
    /// | Field               | Default          |
    /// |---------------------|------------------|
    /// | command_bind_addr   | `0.0.0.0:9761`   |
    /// | dashboard_bind_addr | `0.0.0.0:3000`   |
    /// | ack                 | `false`          |
    /// | initial_displays    | `1`              |
    /// | reboot_duration     | 30 seconds       |
    /// | sweep_interval      | 1 second         |
    /// | session_buffer      | `25`             |
    /// | log_level           | `info`           |
    fn default() -> Self {
        Self {
            // Compile-time-known valid socket address strings.
            command_bind_addr: "0.0.0.0:9761".parse().unwrap(),
            dashboard_bind_addr: "0.0.0.0:3000".parse().unwrap(),
            ack: false,
            initial_displays: 1,
            reboot_duration: REBOOT_DURATION,
            sweep_interval: Duration::from_secs(1),
            session_buffer: 25,
            log_level: "info".to_string(),
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
