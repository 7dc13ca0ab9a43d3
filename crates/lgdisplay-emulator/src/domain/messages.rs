//! JSON message types for the dashboard WebSocket channel.
//!
//! # Message flow
//!
//! ```text
//! Viewer → Hub:   JSON text frame  →  ActionRequest  →  DashboardAction
//! Hub    → Viewer: DashboardMsg    →  JSON text frame
//! ```
//!
//! Viewer requests use the flat shape the dashboard page already sends:
//!
//! ```json
//! {"action":"SetInput","id":2,"input":"HDMI3"}
//! ```
//!
//! Outbound messages carry a `"type"` discriminant and the full display
//! snapshot, so the page can render a card without keeping its own state.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use lgdisplay_core::{DisplayId, DisplaySnapshot, InputSource, UnknownInput};

// ── Viewer → Hub ──────────────────────────────────────────────────────────────

/// Raw request as sent by a dashboard viewer.
///
/// `id` and `input` are optional in the JSON; `AddDisplay` needs neither.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionRequest {
    pub action: String,
    #[serde(default)]
    pub id: DisplayId,
    #[serde(default)]
    pub input: String,
}

/// Reasons an [`ActionRequest`] does not map onto a [`DashboardAction`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ActionError {
    #[error("unknown action {0:?}")]
    UnknownAction(String),

    #[error(transparent)]
    UnknownInput(#[from] UnknownInput),
}

/// A recognized viewer action.  Each maps to exactly one registry call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DashboardAction {
    AddDisplay,
    PowerOn(DisplayId),
    PowerOff(DisplayId),
    Restart(DisplayId),
    SetInput(DisplayId, InputSource),
}

impl ActionRequest {
    /// Resolves the action name (and input name for `SetInput`).
    ///
    /// # Errors
    ///
    /// [`ActionError`] for an unrecognized action or input name.
    pub fn parse_action(&self) -> Result<DashboardAction, ActionError> {
        match self.action.as_str() {
            "AddDisplay" => Ok(DashboardAction::AddDisplay),
            "PowerOnDisplay" => Ok(DashboardAction::PowerOn(self.id)),
            "PowerOffDisplay" => Ok(DashboardAction::PowerOff(self.id)),
            "PowerRestartDisplay" => Ok(DashboardAction::Restart(self.id)),
            "SetInput" => Ok(DashboardAction::SetInput(self.id, self.input.parse()?)),
            other => Err(ActionError::UnknownAction(other.to_string())),
        }
    }
}

// ── Hub → Viewer ──────────────────────────────────────────────────────────────

/// Messages pushed to dashboard viewers.
///
/// ```json
/// {"type":"Snapshot","displays":[{"id":1,"serial":"…","power":"off","input":"HDMI1"}]}
/// {"type":"DisplayAdded","display":{"id":2,"serial":"…","power":"off","input":"HDMI1"}}
/// {"type":"DisplayUpdated","display":{"id":1,"serial":"…","power":"on","input":"HDMI1"}}
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum DashboardMsg {
    /// Every display, sent once to a viewer right after it connects.
    Snapshot { displays: Vec<DisplaySnapshot> },

    /// Render a card for a newly created display.
    DisplayAdded { display: DisplaySnapshot },

    /// Replace an existing card after a power or input change.
    DisplayUpdated { display: DisplaySnapshot },
}

// ── Tests ─────────────────────────────────────────────────────────────────────
