//! The per-display finite state machine.
//!
//! A [`Display`] owns one emulated device's power state, selected input
//! source, and an append-only queue of [`DisplayEvent`]s.  Power moves along
//! a strict cycle:
//!
//! ```text
//!        power_on                 restart
//!  OFF ───────────►  ON  ─────────────────►  RESTARTING
//!   ▲                │ ▲                          │
//!   └────────────────┘ └──────────────────────────┘
//!       power_off        power_on_after_restart
//!                        (reboot duration elapsed)
//! ```
//!
//! Every operation either succeeds and appends exactly one event, or fails
//! with a [`DisplayError`] and leaves the display untouched.

use std::fmt;
use std::str::FromStr;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use super::events::DisplayEvent;

/// Registry-assigned display identifier (smallest unused positive integer).
pub type DisplayId = u32;

/// How long a real display takes to come back after a restart command.
pub const REBOOT_DURATION: Duration = Duration::from_secs(30);

/// Power state of a display.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PowerState {
    Off,
    On,
    Restarting,
}

impl fmt::Display for PowerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            PowerState::Off => "off",
            PowerState::On => "on",
            PowerState::Restarting => "restarting",
        })
    }
}

/// Selectable input source.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum InputSource {
    #[default]
    #[serde(rename = "HDMI1")]
    Hdmi1,
    #[serde(rename = "HDMI2")]
    Hdmi2,
    #[serde(rename = "HDMI3")]
    Hdmi3,
    #[serde(rename = "DP1")]
    DisplayPort1,
}

impl InputSource {
    /// Short name as shown on the dashboard.
    pub fn name(self) -> &'static str {
        match self {
            InputSource::Hdmi1 => "HDMI1",
            InputSource::Hdmi2 => "HDMI2",
            InputSource::Hdmi3 => "HDMI3",
            InputSource::DisplayPort1 => "DP1",
        }
    }
}

impl fmt::Display for InputSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Returned when a string does not name an input source.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown input source: {0:?}")]
pub struct UnknownInput(pub String);

impl FromStr for InputSource {
    type Err = UnknownInput;

    /// Parses a dashboard input name (case-insensitive).
    ///
    /// Accepts `HDMI1`, `HDMI2`, `HDMI3`, and `DP1` or `DISPLAYPORT1`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "HDMI1" => Ok(InputSource::Hdmi1),
            "HDMI2" => Ok(InputSource::Hdmi2),
            "HDMI3" => Ok(InputSource::Hdmi3),
            "DP1" | "DISPLAYPORT1" => Ok(InputSource::DisplayPort1),
            _ => Err(UnknownInput(s.to_string())),
        }
    }
}

/// Reasons a display operation is rejected.
///
/// A rejected operation never mutates the display and never records an event.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DisplayError {
    /// The requested power operation is not legal from the current state.
    #[error("cannot {action} a display that is {from}")]
    InvalidTransition {
        from: PowerState,
        action: &'static str,
    },

    /// The requested input is already selected.
    #[error("input already set to {0}")]
    NoChange(InputSource),
}

/// Owned, lock-free copy of a display's externally visible state.
///
/// The registry hands these out instead of references into its locked map.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DisplaySnapshot {
    pub id: DisplayId,
    pub serial: String,
    pub power: PowerState,
    pub input: InputSource,
}

/// One emulated display.
#[derive(Debug)]
pub struct Display {
    id: DisplayId,
    serial: String,
    power: PowerState,
    input: InputSource,
    power_changed_at: Instant,
    reboot_duration: Duration,
    events: Vec<DisplayEvent>,
}

impl Display {
    /// Creates a powered-off display on HDMI1 and records a `Created` event.
    pub fn new(id: DisplayId) -> Self {
        Self::with_reboot_duration(id, REBOOT_DURATION)
    }

    /// Like [`Display::new`] but with a custom reboot duration.
    pub fn with_reboot_duration(id: DisplayId, reboot_duration: Duration) -> Self {
        let mut display = Self {
            id,
            serial: Uuid::new_v4().to_string(),
            power: PowerState::Off,
            input: InputSource::default(),
            power_changed_at: Instant::now(),
            reboot_duration,
            events: Vec::new(),
        };
        display.events.push(DisplayEvent::Created { id });
        display
    }

    pub fn id(&self) -> DisplayId {
        self.id
    }

    pub fn serial(&self) -> &str {
        &self.serial
    }

    pub fn power(&self) -> PowerState {
        self.power
    }

    pub fn input(&self) -> InputSource {
        self.input
    }

    /// When the power state last changed.
    pub fn power_changed_at(&self) -> Instant {
        self.power_changed_at
    }

    pub fn snapshot(&self) -> DisplaySnapshot {
        DisplaySnapshot {
            id: self.id,
            serial: self.serial.clone(),
            power: self.power,
            input: self.input,
        }
    }

    /// Events recorded since the last [`Display::take_events`].
    pub fn pending_events(&self) -> &[DisplayEvent] {
        &self.events
    }

    /// Drains the outbound event queue.
    pub fn take_events(&mut self) -> Vec<DisplayEvent> {
        std::mem::take(&mut self.events)
    }

    /// OFF → ON.
    ///
    /// # Errors
    ///
    /// [`DisplayError::InvalidTransition`] unless the display is off.
    pub fn power_on(&mut self) -> Result<(), DisplayError> {
        self.transition(PowerState::Off, PowerState::On, "power on")
    }

    /// RESTARTING → ON.  Only the registry sweep calls this.
    ///
    /// # Errors
    ///
    /// [`DisplayError::InvalidTransition`] unless the display is restarting.
    pub fn power_on_after_restart(&mut self) -> Result<(), DisplayError> {
        self.transition(
            PowerState::Restarting,
            PowerState::On,
            "finish restarting",
        )
    }

    /// ON → OFF.
    ///
    /// # Errors
    ///
    /// [`DisplayError::InvalidTransition`] unless the display is on.
    pub fn power_off(&mut self) -> Result<(), DisplayError> {
        self.transition(PowerState::On, PowerState::Off, "power off")
    }

    /// ON → RESTARTING.
    ///
    /// # Errors
    ///
    /// [`DisplayError::InvalidTransition`] unless the display is on.
    pub fn restart(&mut self) -> Result<(), DisplayError> {
        self.transition(PowerState::On, PowerState::Restarting, "restart")
    }

    /// True once a restart has been running for longer than the reboot
    /// duration.  Never mutates.
    pub fn restart_finished(&self) -> bool {
        self.restart_finished_at(Instant::now())
    }

    /// [`Display::restart_finished`] evaluated at `now`.
    pub fn restart_finished_at(&self, now: Instant) -> bool {
        self.power == PowerState::Restarting
            && now.saturating_duration_since(self.power_changed_at) > self.reboot_duration
    }

    /// Switches the input source.  Legal in every power state.
    ///
    /// # Errors
    ///
    /// [`DisplayError::NoChange`] if `input` is already selected.
    pub fn set_input(&mut self, input: InputSource) -> Result<(), DisplayError> {
        if self.input == input {
            return Err(DisplayError::NoChange(input));
        }
        self.input = input;
        self.events.push(DisplayEvent::InputChanged {
            id: self.id,
            new_input: input,
        });
        Ok(())
    }

    fn transition(
        &mut self,
        from: PowerState,
        to: PowerState,
        action: &'static str,
    ) -> Result<(), DisplayError> {
        if self.power != from {
            return Err(DisplayError::InvalidTransition {
                from: self.power,
                action,
            });
        }
        self.power = to;
        self.power_changed_at = Instant::now();
        self.events.push(DisplayEvent::PowerStateChanged {
            id: self.id,
            new_state: to,
        });
        Ok(())
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
