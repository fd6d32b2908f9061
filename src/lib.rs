//! # Relaykit
//!
//! Priority ordered, in-process publish/subscribe with nestable buses.
//!
//! ## Architecture
//!
//! Relaykit is organized as a workspace with multiple crates:
//!
//! 1. **relaykit-core** - Event bus, registrations, ordered dispatch
//! 2. **relaykit-settings** - JSON/TOML settings files
//! 3. **relaykit** - Re-exports and logging setup
//!
//! ## Features
//!
//! - **Typed Events**: Listeners are keyed by the event's Rust type
//! - **Deterministic Order**: `(order, subscription index)` across listeners and buses
//! - **Nested Buses**: A bus subscribed to another bus re-dispatches every event
//! - **Weak Subscribers**: Dropped or disabled subscribers are skipped, not invoked
//! - **Reentrancy**: Handlers may subscribe, unsubscribe and send during a send

pub use relaykit_core::{
    Bus, BusConfig, BusError, ConfigError, DeliverAll, DeliverIf, Error, EventBus, EventType,
    Installation, InvocationPolicy, Invoker, ListenerRegistration, PoolStats, RegistrationTable,
    Registrations, Result, SortKey, StorageKey, Subscriber, SubscriberInfo, SubscriberKind,
    SubscriptionId,
};
pub use relaykit_settings::{LoggingSettings, Settings};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Initialize logging from settings
///
/// Sets up structured logging with:
/// - `RUST_LOG` support, falling back to the configured level
/// - Human readable or JSON line output on stdout
pub fn init_logging(settings: &LoggingSettings) -> anyhow::Result<()> {
    use tracing_subscriber::fmt;
    use tracing_subscriber::prelude::*;
    use tracing_subscriber::EnvFilter;

    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&settings.level))?;

    let json_layer = settings.json.then(|| {
        fmt::layer()
            .json()
            .with_writer(std::io::stdout)
            .with_target(true)
            .with_thread_names(true)
    });
    let text_layer = (!settings.json).then(|| {
        fmt::layer()
            .with_writer(std::io::stdout)
            .with_target(true)
            .with_level(true)
            .with_thread_ids(true)
            .with_line_number(true)
    });

    tracing_subscriber::registry()
        .with(env_filter)
        .with(json_layer)
        .with(text_layer)
        .try_init()?;

    Ok(())
}
