//! Relaykit Settings Crate
//!
//! Loads and saves bus and logging settings. Supports JSON and TOML files;
//! the default location is the platform config directory.

pub mod config;

pub use config::{LoggingSettings, Settings};
