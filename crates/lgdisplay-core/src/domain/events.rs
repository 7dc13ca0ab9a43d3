//! Domain events emitted by the display state machine.
//!
//! Every externally visible change to a [`Display`](super::display::Display)
//! is recorded as one [`DisplayEvent`].  Events are immutable once built and
//! are moved onto the event bus by the registry.
//!
//! The set of event kinds is closed: consumers match on [`DisplayEvent`]
//! exhaustively, so adding a kind is a compile-time-checked change.

use std::fmt;

use serde::{Deserialize, Serialize};

use super::display::{DisplayId, InputSource, PowerState};

/// Stable subscription key identifying one kind of [`DisplayEvent`].
///
/// The bus maps each topic to its subscriber list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EventTopic {
    /// A display was added to the registry.
    DisplayCreated,
    /// A display's power state moved along the OFF/ON/RESTARTING cycle.
    PowerStateChanged,
    /// A display switched to a different input source.
    InputChanged,
}

impl EventTopic {
    /// Every topic, in declaration order.
    pub const ALL: [EventTopic; 3] = [
        EventTopic::DisplayCreated,
        EventTopic::PowerStateChanged,
        EventTopic::InputChanged,
    ];

    /// Returns the string key for this topic.
    pub fn key(self) -> &'static str {
        match self {
            EventTopic::DisplayCreated => "newDisplayEvent",
            EventTopic::PowerStateChanged => "DisplayPowerStateChangedEvent",
            EventTopic::InputChanged => "DisplayInputChangedEvent",
        }
    }
}

impl fmt::Display for EventTopic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

/// A state change recorded by a display.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum DisplayEvent {
    /// The display was created (always powered off, on HDMI1).
    Created {
        /// Id of the new display.
        id: DisplayId,
    },

    /// The display's power state changed.
    PowerStateChanged {
        /// Id of the affected display.
        id: DisplayId,
        /// Power state after the transition.
        new_state: PowerState,
    },

    /// The display's input source changed.
    InputChanged {
        /// Id of the affected display.
        id: DisplayId,
        /// Input source after the change.
        new_input: InputSource,
    },
}

impl DisplayEvent {
    /// Returns the topic this event is published under.
    pub fn topic(&self) -> EventTopic {
        match self {
            DisplayEvent::Created { .. } => EventTopic::DisplayCreated,
            DisplayEvent::PowerStateChanged { .. } => EventTopic::PowerStateChanged,
            DisplayEvent::InputChanged { .. } => EventTopic::InputChanged,
        }
    }

    /// Returns the id of the display this event refers to.
    pub fn display_id(&self) -> DisplayId {
        match *self {
            DisplayEvent::Created { id }
            | DisplayEvent::PowerStateChanged { id, .. }
            | DisplayEvent::InputChanged { id, .. } => id,
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
