//! TOML configuration file for the emulator.
//!
//! Every field is optional; missing fields take the same defaults as
//! [`EmulatorConfig::default`].
//!
//! ```toml
//! log_level = "debug"
//!
//! [command]
//! bind = "0.0.0.0:9761"
//! ack = true
//!
//! [dashboard]
//! bind = "0.0.0.0:3000"
//! session_buffer = 25
//!
//! [emulation]
//! displays = 4
//! reboot_secs = 30
//! sweep_interval_ms = 1000
//! ```

use std::net::{AddrParseError, SocketAddr};
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::EmulatorConfig;

/// Error type for configuration loading and validation.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A file system I/O error occurred.
    #[error("I/O error accessing config at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The TOML content could not be parsed.
    #[error("failed to parse config TOML: {0}")]
    Parse(#[from] toml::de::Error),

    /// A bind address is not `host:port`.
    #[error("invalid {field} address {value:?}: {source}")]
    InvalidAddress {
        field: &'static str,
        value: String,
        #[source]
        source: AddrParseError,
    },

    /// A value is out of range.
    #[error("invalid {field}: {reason}")]
    Invalid {
        field: &'static str,
        reason: &'static str,
    },
}

// ── Config schema types ───────────────────────────────────────────────────────

/// Top-level layout of the configuration file.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FileConfig {
    /// `tracing` filter used when `RUST_LOG` is unset.
    #[serde(default = "default_log_level")]
    pub log_level: String,
    #[serde(default)]
    pub command: CommandSection,
    #[serde(default)]
    pub dashboard: DashboardSection,
    #[serde(default)]
    pub emulation: EmulationSection,
}

/// `[command]`: the raw TCP control port.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CommandSection {
    #[serde(default = "default_command_bind")]
    pub bind: String,
    /// Reply `OK`/`NG` to valid commands.
    #[serde(default)]
    pub ack: bool,
}

/// `[dashboard]`: the viewer WebSocket listener.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DashboardSection {
    #[serde(default = "default_dashboard_bind")]
    pub bind: String,
    /// Outbound frames buffered per viewer before it is evicted.
    #[serde(default = "default_session_buffer")]
    pub session_buffer: usize,
}

/// `[emulation]`: display count and timing.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EmulationSection {
    /// Displays created at startup.
    #[serde(default = "default_displays")]
    pub displays: u32,
    #[serde(default = "default_reboot_secs")]
    pub reboot_secs: u64,
    #[serde(default = "default_sweep_interval_ms")]
    pub sweep_interval_ms: u64,
}

// ── Default helpers ───────────────────────────────────────────────────────────

fn default_log_level() -> String {
    "info".to_string()
}
fn default_command_bind() -> String {
    "0.0.0.0:9761".to_string()
}
fn default_dashboard_bind() -> String {
    "0.0.0.0:3000".to_string()
}
fn default_session_buffer() -> usize {
    25
}
fn default_displays() -> u32 {
    1
}
fn default_reboot_secs() -> u64 {
    30
}
fn default_sweep_interval_ms() -> u64 {
    1000
}

impl Default for FileConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            command: CommandSection::default(),
            dashboard: DashboardSection::default(),
            emulation: EmulationSection::default(),
        }
    }
}

impl Default for CommandSection {
    fn default() -> Self {
        Self {
            bind: default_command_bind(),
            ack: false,
        }
    }
}

impl Default for DashboardSection {
    fn default() -> Self {
        Self {
            bind: default_dashboard_bind(),
            session_buffer: default_session_buffer(),
        }
    }
}

impl Default for EmulationSection {
    fn default() -> Self {
        Self {
            displays: default_displays(),
            reboot_secs: default_reboot_secs(),
            sweep_interval_ms: default_sweep_interval_ms(),
        }
    }
}

impl FileConfig {
    /// Parses configuration text.
    ///
    /// # Errors
    ///
    /// [`ConfigError::Parse`] if the TOML is malformed or has wrong types.
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(content)?)
    }

    /// Converts the file layout into a validated [`EmulatorConfig`].
    ///
    /// # Errors
    ///
    /// [`ConfigError::InvalidAddress`] or [`ConfigError::Invalid`].
    pub fn into_emulator_config(self) -> Result<EmulatorConfig, ConfigError> {
        let config = EmulatorConfig {
            command_bind_addr: parse_addr("command.bind", &self.command.bind)?,
            dashboard_bind_addr: parse_addr("dashboard.bind", &self.dashboard.bind)?,
            ack: self.command.ack,
            initial_displays: self.emulation.displays,
            reboot_duration: Duration::from_secs(self.emulation.reboot_secs),
            sweep_interval: Duration::from_millis(self.emulation.sweep_interval_ms),
            session_buffer: self.dashboard.session_buffer,
            log_level: self.log_level,
        };
        validate(&config)?;
        Ok(config)
    }
}

/// Reads and parses the configuration file at `path`.
///
/// # Errors
///
/// [`ConfigError::Io`] if the file cannot be read, [`ConfigError::Parse`] if
/// it is not valid TOML for [`FileConfig`].
pub fn load_config(path: &Path) -> Result<FileConfig, ConfigError> {
    let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    FileConfig::from_toml_str(&content)
}

/// Checks the values the runtime cannot work with.
///
/// # Errors
///
/// [`ConfigError::Invalid`] naming the first offending field.
pub fn validate(config: &EmulatorConfig) -> Result<(), ConfigError> {
    if config.session_buffer == 0 {
        return Err(ConfigError::Invalid {
            field: "session_buffer",
            reason: "must be at least 1",
        });
    }
    if config.sweep_interval.is_zero() {
        return Err(ConfigError::Invalid {
            field: "sweep_interval",
            reason: "must be greater than zero",
        });
    }
    if config.initial_displays > u32::from(u8::MAX) {
        return Err(ConfigError::Invalid {
            field: "displays",
            reason: "set ids are limited to 255",
        });
    }
    Ok(())
}

fn parse_addr(field: &'static str, value: &str) -> Result<SocketAddr, ConfigError> {
    value.parse().map_err(|source| ConfigError::InvalidAddress {
        field,
        value: value.to_string(),
        source,
    })
}

// ── Tests ─────────────────────────────────────────────────────────────────────
