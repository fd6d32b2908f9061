//! Event Bus implementation.
//!
//! Provides the [`EventBus`] facade: subscribe, unsubscribe and send,
//! delegating storage to the [`Registry`] and delivery to the merge
//! dispatch. Buses are explicit handles; there is no process-wide
//! instance.

use std::any::Any;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::config::BusConfig;
use crate::dispatch::{Bus, DeliverAll, DeliverIf, Dispatch, Invoker};
use crate::error::{BusError, Result};
use crate::pool::PoolStats;
use crate::registration::{EventType, Keyed, ListenerRegistration, StorageKey};
use crate::registry::Registry;
use crate::subscriber::{Subscriber, SubscriberInfo};

/// Subscription handle for unsubscribing a closure listener
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId {
    target: StorageKey,
    event_type: EventType,
}

impl SubscriptionId {
    /// Identity of the listener
    pub fn target(&self) -> &StorageKey {
        &self.target
    }

    /// Event type the listener receives
    pub fn event_type(&self) -> EventType {
        self.event_type
    }
}

impl std::fmt::Display for SubscriptionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.target {
            StorageKey::Token(token) => write!(f, "Sub({})", &token.to_string()[..8]),
            StorageKey::Address(addr) => write!(f, "Sub(0x{:x})", addr),
        }
    }
}

/// Priority ordered publish/subscribe bus
///
/// Listeners are keyed by event type; nested buses receive every event and
/// re-dispatch it through their own registrations. One send delivers to
/// every active registration in `(order, index)` order.
///
/// Handlers run on the sending thread. They may subscribe and unsubscribe
/// on the same bus while a send is in progress: the send works on a
/// snapshot taken when it started, so changes only affect later sends.
pub struct EventBus {
    config: BusConfig,
    registry: Mutex<Registry>,
}

impl EventBus {
    /// Create a new event bus with default configuration
    pub fn new() -> Self {
        Self::with_config(BusConfig::default())
    }

    /// Create a new event bus with custom configuration
    pub fn with_config(config: BusConfig) -> Self {
        let registry = Registry::new(config.pool_capacity);
        Self {
            config,
            registry: Mutex::new(registry),
        }
    }

    /// Create a bus with a name and a priority for when it is nested
    pub fn named(name: impl Into<String>, order: i32) -> Self {
        Self::with_config(BusConfig::named(name, order))
    }

    /// Bus name used in logs
    pub fn name(&self) -> &str {
        &self.config.name
    }

    /// Get the current configuration
    pub fn config(&self) -> &BusConfig {
        &self.config
    }

    /// Subscribe every registration a subscriber exposes.
    ///
    /// Subscribers that are buses are added to the bus list instead.
    /// A subscriber with no registrations that is not a bus is rejected.
    pub fn subscribe<S>(&self, subscriber: &Arc<S>) -> Result<()>
    where
        S: Subscriber + ?Sized,
    {
        if let Some(bus) = Arc::clone(subscriber).as_bus() {
            return self.subscribe_bus(bus);
        }

        let registrations = Arc::clone(subscriber).registrations();
        if registrations.is_empty() {
            return Err(BusError::InvalidSubscriber {
                subscriber: StorageKey::of(subscriber).to_string(),
                reason: "exposes no registrations and is not a bus".to_string(),
            }
            .into());
        }

        let mut registry = self.registry.lock();
        for registration in registrations {
            let name = registration.name().to_string();
            let event_type = registration.event_type();
            let key = registry.subscribe_listener(registration);
            tracing::debug!(
                bus = self.name(),
                listener = %name,
                event = event_type.name(),
                "Listener subscribed at {}",
                key
            );
        }
        Ok(())
    }

    /// Remove every registration of a subscriber.
    ///
    /// Returns true if anything was removed. Unknown subscribers are a
    /// no-op.
    pub fn unsubscribe<S>(&self, subscriber: &Arc<S>) -> bool
    where
        S: Subscriber + ?Sized,
    {
        if let Some(bus) = Arc::clone(subscriber).as_bus() {
            return self.unsubscribe_bus(&bus);
        }

        let templates = Arc::clone(subscriber).registrations();
        let removed: Vec<_> = {
            let mut registry = self.registry.lock();
            templates
                .iter()
                .filter_map(|t| registry.unsubscribe_listener(t.event_type(), t.target()))
                .collect()
        };

        for registration in &removed {
            tracing::debug!(
                bus = self.name(),
                listener = registration.name(),
                event = registration.event_type().name(),
                "Listener unsubscribed"
            );
        }
        !removed.is_empty()
    }

    /// Nest another bus into this one
    pub fn subscribe_bus(&self, bus: Arc<dyn Bus>) -> Result<()> {
        let target = StorageKey::of(&bus);
        if target == StorageKey::of_ref(self) {
            return Err(BusError::InvalidSubscriber {
                subscriber: bus.name().to_string(),
                reason: "a bus cannot be nested into itself".to_string(),
            }
            .into());
        }

        let order = bus.order();
        let key = self.registry.lock().subscribe_bus(Arc::clone(&bus), order);
        tracing::debug!(
            bus = self.name(),
            nested = bus.name(),
            "Bus subscribed at {}",
            key
        );
        Ok(())
    }

    /// Remove a nested bus. Returns true if it was registered.
    pub fn unsubscribe_bus<B>(&self, bus: &Arc<B>) -> bool
    where
        B: Bus + ?Sized,
    {
        let removed = self.registry.lock().unsubscribe_bus(&StorageKey::of(bus));
        if removed {
            tracing::debug!(bus = self.name(), nested = bus.name(), "Bus unsubscribed");
        }
        removed
    }

    /// Subscribe a closure to events of type `E`
    pub fn listen<E, F>(&self, order: i32, handler: F) -> SubscriptionId
    where
        E: Any,
        F: Fn(&E) + Send + Sync + 'static,
    {
        self.insert_closure(ListenerRegistration::new::<E, F>(
            StorageKey::token(),
            order,
            handler,
        ))
    }

    /// Subscribe a closure to events of type `E` under a diagnostic name
    pub fn listen_named<E, F>(
        &self,
        name: impl Into<Arc<str>>,
        order: i32,
        handler: F,
    ) -> SubscriptionId
    where
        E: Any,
        F: Fn(&E) + Send + Sync + 'static,
    {
        self.insert_closure(
            ListenerRegistration::new::<E, F>(StorageKey::token(), order, handler).named(name),
        )
    }

    fn insert_closure(&self, registration: ListenerRegistration) -> SubscriptionId {
        let id = SubscriptionId {
            target: *registration.target(),
            event_type: registration.event_type(),
        };
        let name = registration.name().to_string();
        let key = self.registry.lock().subscribe_listener(registration);
        tracing::debug!(
            bus = self.name(),
            listener = %name,
            event = id.event_type.name(),
            "Subscription {} added at {}",
            id,
            key
        );
        id
    }

    /// Unsubscribe a closure listener
    ///
    /// Returns true if the subscription was found and removed.
    pub fn unlisten(&self, id: SubscriptionId) -> bool {
        let removed = self
            .registry
            .lock()
            .unsubscribe_listener(id.event_type, &id.target);
        match removed {
            Some(_) => {
                tracing::debug!(bus = self.name(), "Subscription {} removed", id);
                true
            }
            None => false,
        }
    }

    /// Send an event to every active subscriber.
    ///
    /// Returns the number of listener invocations, nested buses included.
    pub fn send<E: Any>(&self, event: &E) -> Result<usize> {
        self.send_with(event, &mut DeliverAll)
    }

    /// Send an event only to listeners accepted by `predicate`
    pub fn send_if<E, P>(&self, event: &E, predicate: P) -> Result<usize>
    where
        E: Any,
        P: FnMut(&ListenerRegistration) -> bool,
    {
        self.send_with(event, &mut DeliverIf::new(predicate))
    }

    /// Send an event through a custom invocation strategy
    pub fn send_with<E, I>(&self, event: &E, invoker: &mut I) -> Result<usize>
    where
        E: Any,
        I: Invoker,
    {
        self.dispatch(event, EventType::of::<E>(), invoker, 0)
    }

    fn dispatch(
        &self,
        event: &dyn Any,
        event_type: EventType,
        invoker: &mut dyn Invoker,
        depth: usize,
    ) -> Result<usize> {
        if depth > self.config.max_depth {
            tracing::warn!(
                bus = self.name(),
                event = event_type.name(),
                "Dropping event at nesting depth {}",
                depth
            );
            return Err(BusError::DepthExceeded {
                bus: self.config.name.clone(),
                depth,
            }
            .into());
        }

        let snapshot = self.registry.lock().snapshot(event_type);
        tracing::trace!(
            bus = self.name(),
            event = event_type.name(),
            listeners = snapshot.listeners.len(),
            buses = snapshot.buses.len(),
            depth,
            "Dispatching"
        );

        Dispatch {
            bus: self.name(),
            policy: self.config.invocation_policy,
            depth,
        }
        .run(
            event,
            event_type,
            &snapshot.listeners,
            &snapshot.buses,
            invoker,
        )
    }

    /// Describe every current registration, listeners and buses, in
    /// dispatch order
    pub fn subscribers(&self) -> Vec<SubscriberInfo> {
        let (listeners, buses) = self.registry.lock().entries();
        SubscriberInfo::describe(&listeners, &buses)
    }

    /// Log every current registration
    pub fn log_subscribers(&self) {
        for subscriber in self.subscribers() {
            tracing::info!(bus = self.name(), "{}", subscriber);
        }
    }

    /// Get the number of registrations, listeners and buses
    pub fn subscriber_count(&self) -> usize {
        let registry = self.registry.lock();
        registry.listener_count() + registry.bus_count()
    }

    /// Remove every registration whose target is no longer active.
    ///
    /// Inactive registrations are otherwise kept until unsubscribed.
    /// Liveness is checked without the lock held, so a predicate may use
    /// this bus. Returns the number of registrations removed.
    pub fn compact(&self) -> usize {
        let (listeners, buses) = self.registry.lock().entries();
        let listeners: Vec<_> = listeners.into_iter().filter(|l| !l.is_active()).collect();
        let buses: Vec<_> = buses.into_iter().filter(|w| !w.is_active()).collect();
        if listeners.is_empty() && buses.is_empty() {
            return 0;
        }

        let (removed, buses_removed, detached) = {
            let mut registry = self.registry.lock();
            let before = registry.bus_count();
            let (removed, detached) = registry.remove_entries(&listeners, buses);
            (removed, before - registry.bus_count(), detached)
        };

        let count = removed.len() + buses_removed;
        tracing::debug!(
            bus = self.name(),
            "Compacted {} inactive registrations, {} buses detached",
            count,
            detached.len()
        );
        count
    }

    /// Wrapper pool counters
    pub fn pool_stats(&self) -> PoolStats {
        self.registry.lock().pool_stats()
    }

    /// Release every registration. The bus stays usable afterwards.
    pub fn dispose(&self) {
        let (listeners, buses) = self.registry.lock().clear();
        tracing::debug!(
            bus = self.name(),
            "Disposed {} listeners and {} buses",
            listeners.len(),
            buses.len()
        );
    }
}

impl Bus for EventBus {
    fn forward(
        &self,
        event: &dyn Any,
        event_type: EventType,
        invoker: &mut dyn Invoker,
        depth: usize,
    ) -> Result<usize> {
        self.dispatch(event, event_type, invoker, depth)
    }

    fn order(&self) -> i32 {
        self.config.order
    }

    fn name(&self) -> &str {
        &self.config.name
    }
}

impl Subscriber for EventBus {
    fn registrations(self: Arc<Self>) -> Vec<ListenerRegistration> {
        Vec::new()
    }

    fn as_bus(self: Arc<Self>) -> Option<Arc<dyn Bus>> {
        Some(self)
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for EventBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventBus")
            .field("subscribers", &self.subscriber_count())
            .field("config", &self.config)
            .finish()
    }
}
