//! # lgdisplay-core
//!
//! Shared library for the LG display emulator containing the per-display
//! state machine, the domain events it emits, and the line-framed control
//! protocol spoken on the raw TCP port.
//!
//! This crate has no dependencies on sockets, async runtimes, or the web
//! dashboard.  Everything here is synchronous and can be tested in isolation.
//!
//! # Architecture overview
//!
//! - **`domain`** – The [`Display`] state machine (power and input source) and
//!   the closed set of [`DisplayEvent`]s it records whenever its externally
//!   visible state changes.
//!
//! - **`protocol`** – Carriage-return framing and parsing of the two-letter
//!   command grammar (`ka 01 01\r`), plus the optional acknowledgement frame.

pub mod domain;
pub mod protocol;

pub use domain::display::{
    Display, DisplayError, DisplayId, DisplaySnapshot, InputSource, PowerState, UnknownInput,
    REBOOT_DURATION,
};
pub use domain::events::{DisplayEvent, EventTopic};
pub use protocol::command::{
    decode_frame, encode_ack, CommandError, ControlCommand, FrameError, PowerAction, RawCommand,
};
