//! Domain layer for lgdisplay-emulator.
//!
//! Plain data types with no I/O: the runtime configuration and the JSON
//! messages exchanged with dashboard viewers.

pub mod config;
pub mod messages;

pub use config::EmulatorConfig;
pub use messages::{ActionError, ActionRequest, DashboardAction, DashboardMsg};
