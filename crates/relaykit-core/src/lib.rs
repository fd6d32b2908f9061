//! # Relaykit Core
//!
//! Priority ordered, in-process publish/subscribe dispatch.
//!
//! ## Overview
//!
//! An [`EventBus`] delivers a sent event to every active registration for
//! its type, one after the other on the sending thread:
//! - Listeners are keyed by event type and carry an integer order
//! - Buses can be nested into other buses and re-dispatch every event
//! - Listeners and buses share one `(order, index)` total order, lowest
//!   first, ties broken by subscription order
//! - Subscribers are held weakly and skipped once they go inactive
//!
//! ## Usage
//!
//! ```rust,ignore
//! use relaykit_core::{EventBus, Registrations, Subscriber};
//!
//! struct Connected { port: String }
//!
//! let bus = EventBus::new();
//!
//! // Closure listener, removed with its handle
//! let id = bus.listen::<Connected, _>(0, |e| println!("connected on {}", e.port));
//!
//! // Nested bus, entered at its own order
//! let ui = Arc::new(EventBus::named("ui", 10));
//! bus.subscribe(&ui)?;
//!
//! bus.send(&Connected { port: "/dev/ttyUSB0".into() })?;
//!
//! bus.unlisten(id);
//! bus.unsubscribe(&ui);
//! ```

pub mod bus;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod ordered_set;
pub mod pool;
pub mod registration;
pub mod registry;
pub mod subscriber;
pub mod table;

pub use bus::{EventBus, SubscriptionId};
pub use config::{BusConfig, InvocationPolicy};
pub use dispatch::{Bus, DeliverAll, DeliverIf, Invoker};
pub use error::{BusError, ConfigError, Error, Result};
pub use ordered_set::OrderedSet;
pub use pool::{BusWrapper, PoolStats, WrapperPool};
pub use registration::{EventType, Keyed, ListenerRegistration, SortKey, StorageKey};
pub use registry::{Registry, Snapshot};
pub use subscriber::{Registrations, Subscriber, SubscriberInfo, SubscriberKind};
pub use table::{Installation, RegistrationTable};
