//! Application layer for lgdisplay-emulator.
//!
//! # Responsibilities
//!
//! - **`event_bus`** – Topic-keyed publish/subscribe for display events.
//! - **`display_registry`** – Owns every display, serializes mutation, drains
//!   display events onto the bus, and completes restarts in a periodic sweep.
//! - **`notification_hub`** – Single coordinating task that fans display
//!   changes out to dashboard sessions and feeds viewer actions back into the
//!   registry.
//!
//! # What does NOT belong here?
//!
//! - Binding sockets, framing bytes, WebSocket handshakes (infrastructure).

pub mod display_registry;
pub mod event_bus;
pub mod notification_hub;

pub use display_registry::{run_sweep, DisplayRegistry, DisplayService};
pub use event_bus::EventBus;
pub use notification_hub::{HubHandle, NotificationHub, SessionId};
