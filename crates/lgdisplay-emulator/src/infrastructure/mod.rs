//! Infrastructure layer for lgdisplay-emulator.
//!
//! Everything that touches a socket or the file system lives here:
//!
//! - `command_server` – the raw TCP control port
//! - `ws_server` – the dashboard WebSocket listener and session pumps
//! - `storage` – TOML configuration file loading
//!
//! Protocol parsing lives in `lgdisplay-core`; display state and fan-out live
//! in the application layer.

pub mod command_server;
pub mod storage;
pub mod ws_server;

pub use command_server::{CommandServer, ServerError};
pub use ws_server::DashboardServer;
