//! Subscriber interface and diagnostics view.

use std::any::Any;
use std::fmt;
use std::sync::{Arc, Weak};

use crate::dispatch::Bus;
use crate::pool::BusWrapper;
use crate::registration::{EventType, Keyed, ListenerRegistration, SortKey, StorageKey};

/// An object that wants to receive events.
///
/// A subscriber either exposes typed listener registrations or identifies
/// itself as a nested [`Bus`]; buses are routed to the bus list instead of
/// the per-type listener sets.
pub trait Subscriber: Send + Sync + 'static {
    /// The listener registrations this subscriber wants.
    ///
    /// Also called on unsubscribe to build lookup templates, so it must
    /// return the same event types and target on every call.
    fn registrations(self: Arc<Self>) -> Vec<ListenerRegistration>;

    /// This subscriber as a nested bus, if it is one
    fn as_bus(self: Arc<Self>) -> Option<Arc<dyn Bus>> {
        None
    }
}

type SharedHandler<S> = Arc<dyn Fn(&S, &dyn Any) + Send + Sync>;
type SharedPredicate<S> = Arc<dyn Fn(&S) -> bool + Send + Sync>;

struct Pending<S> {
    event_type: EventType,
    order: i32,
    name: Option<Arc<str>>,
    handler: SharedHandler<S>,
}

/// Builder for the registrations of one shared subscriber.
///
/// Registrations hold only a weak reference to the subscriber. They stop
/// being active when the subscriber is dropped, and while they exist the
/// subscriber's allocation cannot be reused for another target.
///
/// ```rust,ignore
/// impl Subscriber for Inventory {
///     fn registrations(self: Arc<Self>) -> Vec<ListenerRegistration> {
///         Registrations::new(&self)
///             .on::<ItemAdded, _>(0, |inv, e| inv.add(e))
///             .on::<ItemRemoved, _>(10, |inv, e| inv.remove(e))
///             .alive_when(|inv| inv.is_open())
///             .finish()
///     }
/// }
/// ```
pub struct Registrations<S> {
    target: Weak<S>,
    alive: Option<SharedPredicate<S>>,
    pending: Vec<Pending<S>>,
}

impl<S: Send + Sync + 'static> Registrations<S> {
    /// Start collecting registrations for `target`
    pub fn new(target: &Arc<S>) -> Self {
        Self {
            target: Arc::downgrade(target),
            alive: None,
            pending: Vec::new(),
        }
    }

    /// Handle events of type `E`
    pub fn on<E, F>(self, order: i32, handler: F) -> Self
    where
        E: Any,
        F: Fn(&S, &E) + Send + Sync + 'static,
    {
        self.push::<E, F>(None, order, handler)
    }

    /// Handle events of type `E` under a diagnostic name
    pub fn on_named<E, F>(self, name: impl Into<Arc<str>>, order: i32, handler: F) -> Self
    where
        E: Any,
        F: Fn(&S, &E) + Send + Sync + 'static,
    {
        self.push::<E, F>(Some(name.into()), order, handler)
    }

    /// Only deliver while `predicate` holds for the subscriber
    pub fn alive_when<P>(mut self, predicate: P) -> Self
    where
        P: Fn(&S) -> bool + Send + Sync + 'static,
    {
        self.alive = Some(Arc::new(predicate));
        self
    }

    fn push<E, F>(mut self, name: Option<Arc<str>>, order: i32, handler: F) -> Self
    where
        E: Any,
        F: Fn(&S, &E) + Send + Sync + 'static,
    {
        self.pending.push(Pending {
            event_type: EventType::of::<E>(),
            order,
            name,
            handler: Arc::new(move |target: &S, event: &dyn Any| {
                if let Some(event) = event.downcast_ref::<E>() {
                    handler(target, event);
                }
            }),
        });
        self
    }

    /// Build the registrations
    pub fn finish(self) -> Vec<ListenerRegistration> {
        let key = StorageKey::of_weak(&self.target);
        let mut registrations = Vec::with_capacity(self.pending.len());

        for pending in self.pending {
            let alive_target = self.target.clone();
            let alive = self.alive.clone();
            let handler_target = self.target.clone();
            let handler = pending.handler;

            registrations.push(ListenerRegistration::from_parts(
                pending.event_type,
                key,
                pending.order,
                pending.name,
                Box::new(move || match alive_target.upgrade() {
                    Some(target) => alive.as_ref().is_none_or(|p| p(&target)),
                    None => false,
                }),
                Box::new(move |event: &dyn Any| {
                    if let Some(target) = handler_target.upgrade() {
                        handler(&target, event);
                    }
                }),
            ));
        }

        registrations
    }
}

/// Kind of a registered subscriber
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubscriberKind {
    /// A listener for one event type
    Listener(EventType),
    /// A nested bus receiving every event type
    Bus,
}

/// Point-in-time description of one registration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubscriberInfo {
    /// Diagnostic name.
    pub name: String,
    /// Listener or bus.
    pub kind: SubscriberKind,
    /// Target identity.
    pub target: StorageKey,
    /// Dispatch position.
    pub key: SortKey,
    /// Whether the registration would be invoked right now.
    pub active: bool,
}

impl SubscriberInfo {
    /// Describe registrations copied out of a registry, in dispatch order.
    ///
    /// Evaluates liveness predicates and bus names, so the registry must
    /// not be locked while this runs.
    pub fn describe(
        listeners: &[Arc<ListenerRegistration>],
        buses: &[Arc<BusWrapper>],
    ) -> Vec<Self> {
        let listeners = listeners.iter().map(|l| Self {
            name: l.name().to_string(),
            kind: SubscriberKind::Listener(l.event_type()),
            target: *l.target(),
            key: l.sort_key(),
            active: l.is_active(),
        });
        let buses = buses.iter().filter_map(|w| {
            let bus = w.bus()?;
            Some(Self {
                name: bus.name().to_string(),
                kind: SubscriberKind::Bus,
                target: *w.target()?,
                key: w.sort_key(),
                active: w.is_active(),
            })
        });

        let mut all: Vec<_> = listeners.chain(buses).collect();
        all.sort_by_key(|info| info.key);
        all
    }
}

impl fmt::Display for SubscriberInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = if self.active { "active" } else { "inactive" };
        match self.kind {
            SubscriberKind::Listener(event_type) => write!(
                f,
                "{} {} listener<{}> {} ({})",
                self.key, self.name, event_type, self.target, state
            ),
            SubscriberKind::Bus => write!(
                f,
                "{} {} bus {} ({})",
                self.key, self.name, self.target, state
            ),
        }
    }
}
