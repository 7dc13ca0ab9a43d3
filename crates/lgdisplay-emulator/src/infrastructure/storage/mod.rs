//! Storage infrastructure: configuration file loading.
//!
//! The emulator keeps no persistent state; the only file it reads is the
//! optional TOML configuration passed with `--config`.

pub mod config;
