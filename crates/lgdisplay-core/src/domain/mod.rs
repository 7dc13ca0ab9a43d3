//! Domain entities for the display emulator.
//!
//! Pure business logic with no infrastructure dependencies.  The registry in
//! `lgdisplay-emulator` is the only caller of these types at runtime; it
//! serializes access, so nothing here needs internal synchronization.

/// The per-display power/input state machine.
pub mod display;

/// Domain events recorded by a [`display::Display`] and published on the bus.
pub mod events;
