//! Error handling for relaykit
//!
//! Provides the error types shared by the dispatch engine and its hosts:
//! - Bus errors (subscription contract violations, runaway nesting)
//! - Configuration errors (loading and validating settings)
//!
//! All error types use `thiserror` for ergonomic error handling.
//! Unsubscribing something that was never subscribed is not an error
//! anywhere in this crate.

use thiserror::Error;

/// Bus error type
///
/// Raised by subscribe and send operations on an [`EventBus`](crate::EventBus).
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BusError {
    /// The subscriber cannot be registered
    #[error("Invalid subscriber {subscriber}: {reason}")]
    InvalidSubscriber {
        /// Identity of the rejected subscriber.
        subscriber: String,
        /// Why the subscriber was rejected.
        reason: String,
    },

    /// Nested buses forwarded deeper than the configured limit
    #[error("Dispatch depth {depth} exceeded on bus '{bus}'")]
    DepthExceeded {
        /// Name of the bus that refused to forward.
        bus: String,
        /// Nesting depth at which forwarding stopped.
        depth: usize,
    },
}

/// Configuration error type
///
/// Represents errors found while loading or validating bus settings.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// The file extension does not name a known format
    #[error("Unsupported config format '{extension}', expected .json or .toml")]
    UnsupportedFormat {
        /// The extension that was found.
        extension: String,
    },

    /// The file contents could not be parsed or serialized
    #[error("Invalid {format} config: {reason}")]
    Malformed {
        /// The format being read or written.
        format: String,
        /// Parser or serializer message.
        reason: String,
    },

    /// A field holds a value outside its allowed range
    #[error("Invalid value for {field}: {reason}")]
    InvalidValue {
        /// The offending field.
        field: String,
        /// Why the value is rejected.
        reason: String,
    },
}

/// Main error type for relaykit
///
/// A unified error type that can represent any error from all layers.
/// This is the primary error type used in public APIs.
#[derive(Error, Debug)]
pub enum Error {
    /// Bus error
    #[error(transparent)]
    Bus(#[from] BusError),

    /// Configuration error
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Standard I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Check if this is a bus error
    pub fn is_bus_error(&self) -> bool {
        matches!(self, Error::Bus(_))
    }

    /// Check if this is a configuration error
    pub fn is_config_error(&self) -> bool {
        matches!(self, Error::Config(_))
    }

    /// Check if nested dispatch hit the depth limit
    pub fn is_depth_exceeded(&self) -> bool {
        matches!(self, Error::Bus(BusError::DepthExceeded { .. }))
    }
}

/// Result type using Error
pub type Result<T> = std::result::Result<T, Error>;
