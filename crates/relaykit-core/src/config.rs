//! Bus configuration.

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// What happens when a subscriber panics during a send
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InvocationPolicy {
    /// Let the panic unwind out of `send`
    Propagate,
    /// Log the panic and continue with the next subscriber
    LogAndContinue,
}

impl Default for InvocationPolicy {
    /// Loud in debug builds, isolated in release builds
    fn default() -> Self {
        if cfg!(debug_assertions) {
            Self::Propagate
        } else {
            Self::LogAndContinue
        }
    }
}

impl std::fmt::Display for InvocationPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Propagate => write!(f, "propagate"),
            Self::LogAndContinue => write!(f, "log_and_continue"),
        }
    }
}

/// Configuration for an event bus
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BusConfig {
    /// Name used in logs and diagnostics.
    pub name: String,
    /// Priority of this bus when nested into another bus.
    pub order: i32,
    /// Handling of subscriber panics.
    pub invocation_policy: InvocationPolicy,
    /// Maximum number of nested buses an event may pass through.
    pub max_depth: usize,
    /// Maximum number of free bus wrappers kept for reuse.
    pub pool_capacity: usize,
}

impl Default for BusConfig {
    fn default() -> Self {
        Self {
            name: "bus".to_string(),
            order: 0,
            invocation_policy: InvocationPolicy::default(),
            max_depth: 32,
            pool_capacity: 64,
        }
    }
}

impl BusConfig {
    /// Default configuration with a name and nesting priority
    pub fn named(name: impl Into<String>, order: i32) -> Self {
        Self {
            name: name.into(),
            order,
            ..Self::default()
        }
    }

    /// Set the panic handling policy
    pub fn with_policy(mut self, policy: InvocationPolicy) -> Self {
        self.invocation_policy = policy;
        self
    }

    /// Set the nesting depth limit
    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.name.trim().is_empty() {
            return Err(ConfigError::InvalidValue {
                field: "name".to_string(),
                reason: "must not be empty".to_string(),
            });
        }

        if self.max_depth == 0 {
            return Err(ConfigError::InvalidValue {
                field: "max_depth".to_string(),
                reason: "must be > 0".to_string(),
            });
        }

        Ok(())
    }
}
