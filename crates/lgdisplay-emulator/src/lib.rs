//! lgdisplay-emulator library crate.
//!
//! Emulates any number of networked LG displays.  Each display accepts the
//! LG line-oriented control protocol on a raw TCP port, and every state
//! change is pushed live to browser dashboards over WebSocket.
//!
//! # Architecture
//!
//! ```text
//! Control client (ka 01 01\r over TCP)     Browser dashboard (JSON over WebSocket)
//!         │                                         ▲      │
//!         ▼                                         │      ▼
//!   infrastructure::command_server        infrastructure::ws_server
//!         │                                         ▲      │
//!         │                      application::notification_hub
//!         │                                         ▲      │
//!         ▼                                         │      ▼
//!   application::display_registry ──► application::event_bus
//!         │
//!         ▼
//!   lgdisplay_core::Display (state machine)
//! ```
//!
//! # Layer rules
//!
//! - `domain` holds plain data: configuration and dashboard message types.
//! - `application` owns the registry, bus, and hub; it knows nothing about
//!   sockets.
//! - `infrastructure` binds listeners, frames bytes, and spawns per-connection
//!   tasks.

/// Domain layer: configuration and dashboard message types (no I/O).
pub mod domain;

/// Application layer: event bus, display registry, notification hub.
pub mod application;

/// Infrastructure layer: TCP control port, WebSocket dashboard, config file.
pub mod infrastructure;
