//! Registration records and the keys used to order and find them.
//!
//! Ordering and identity are deliberately separate types:
//! - [`SortKey`] orders entries by `(order, index)`
//! - [`StorageKey`] identifies the target an entry was created for
//!
//! A removal lookup only ever compares [`StorageKey`]s, so a template built
//! purely to unsubscribe matches the stored entry regardless of its index.

use std::any::{Any, TypeId};
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::{Arc, Weak};

use uuid::Uuid;

/// Identifies an event type for per-type listener lookup.
///
/// Equality and hashing use the [`TypeId`] only; the type name is carried
/// for diagnostics.
#[derive(Debug, Clone, Copy)]
pub struct EventType {
    id: TypeId,
    name: &'static str,
}

impl EventType {
    /// The event type of `E`
    pub fn of<E: Any>() -> Self {
        Self {
            id: TypeId::of::<E>(),
            name: std::any::type_name::<E>(),
        }
    }

    /// Type identifier used as the registry key
    pub fn id(&self) -> TypeId {
        self.id
    }

    /// Fully qualified type name
    pub fn name(&self) -> &'static str {
        self.name
    }
}

impl PartialEq for EventType {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for EventType {}

impl Hash for EventType {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name)
    }
}

/// Dispatch position of a registration.
///
/// Lower `order` runs first; equal orders fall back to the subscribe
/// sequence `index`. The derived ordering compares fields in that order.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SortKey {
    /// Caller supplied priority.
    pub order: i32,
    /// Sequence number assigned at subscribe time.
    pub index: u64,
}

impl SortKey {
    /// Create a sort key
    pub fn new(order: i32, index: u64) -> Self {
        Self { order, index }
    }

    /// Whether an entry with this key is invoked before one with `other`
    pub fn precedes(&self, other: &SortKey) -> bool {
        self < other
    }
}

impl fmt::Display for SortKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, #{})", self.order, self.index)
    }
}

/// Identity of a subscription target.
///
/// Shared targets are identified by the address of their allocation.
/// Free-standing closures have no shared target and get a random token.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StorageKey {
    /// Address of the target's shared allocation
    Address(usize),
    /// Generated identity for targets without an allocation of their own
    Token(Uuid),
}

impl StorageKey {
    /// Identity of a shared target
    pub fn of<T: ?Sized>(target: &Arc<T>) -> Self {
        Self::Address(Arc::as_ptr(target).cast::<()>() as usize)
    }

    /// Identity of a target behind a weak reference.
    ///
    /// Matches [`StorageKey::of`] for the `Arc` the weak handle came from.
    pub fn of_weak<T: ?Sized>(target: &Weak<T>) -> Self {
        Self::Address(Weak::as_ptr(target).cast::<()>() as usize)
    }

    /// Identity of a borrowed target; equals [`StorageKey::of`] when the
    /// reference points into an `Arc`.
    pub fn of_ref<T: ?Sized>(target: &T) -> Self {
        Self::Address(std::ptr::from_ref(target).cast::<()>() as usize)
    }

    /// Fresh identity for a target with no allocation
    pub fn token() -> Self {
        Self::Token(Uuid::new_v4())
    }
}

impl fmt::Display for StorageKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StorageKey::Address(addr) => write!(f, "Target(0x{:x})", addr),
            StorageKey::Token(token) => write!(f, "Target({})", &token.to_string()[..8]),
        }
    }
}

/// An entry that can live in an [`OrderedSet`](crate::OrderedSet).
pub trait Keyed {
    /// Position of the entry in dispatch order
    fn sort_key(&self) -> SortKey;

    /// Whether the entry was created for the target identified by `key`
    fn matches(&self, key: &StorageKey) -> bool;

    /// Whether the entry should be invoked right now
    fn is_active(&self) -> bool;
}

type Handler = Box<dyn Fn(&dyn Any) + Send + Sync>;
type Liveness = Box<dyn Fn() -> bool + Send + Sync>;

/// A single typed listener: event type, priority, liveness check and
/// handler, bound to one target.
///
/// Registrations are built by subscribers (usually through
/// [`Registrations`](crate::Registrations)) with index 0; the registry
/// assigns the real index when the registration is stored.
pub struct ListenerRegistration {
    event_type: EventType,
    order: i32,
    index: u64,
    target: StorageKey,
    name: Arc<str>,
    alive: Liveness,
    handler: Handler,
}

impl ListenerRegistration {
    /// Create an always-alive registration for events of type `E`.
    ///
    /// The name defaults to a generated unique string.
    pub fn new<E, F>(target: StorageKey, order: i32, handler: F) -> Self
    where
        E: Any,
        F: Fn(&E) + Send + Sync + 'static,
    {
        Self::from_parts(
            EventType::of::<E>(),
            target,
            order,
            None,
            Box::new(|| true),
            Box::new(move |event: &dyn Any| {
                if let Some(event) = event.downcast_ref::<E>() {
                    handler(event);
                }
            }),
        )
    }

    pub(crate) fn from_parts(
        event_type: EventType,
        target: StorageKey,
        order: i32,
        name: Option<Arc<str>>,
        alive: Liveness,
        handler: Handler,
    ) -> Self {
        Self {
            event_type,
            order,
            index: 0,
            target,
            name: name.unwrap_or_else(|| Arc::from(Uuid::new_v4().to_string())),
            alive,
            handler,
        }
    }

    /// Replace the diagnostic name
    pub fn named(mut self, name: impl Into<Arc<str>>) -> Self {
        self.name = name.into();
        self
    }

    /// Gate delivery on a liveness predicate
    pub fn alive_when<P>(mut self, predicate: P) -> Self
    where
        P: Fn() -> bool + Send + Sync + 'static,
    {
        self.alive = Box::new(predicate);
        self
    }

    /// Event type this registration listens to
    pub fn event_type(&self) -> EventType {
        self.event_type
    }

    /// Caller supplied priority
    pub fn order(&self) -> i32 {
        self.order
    }

    /// Subscribe sequence number, 0 until stored in a registry
    pub fn index(&self) -> u64 {
        self.index
    }

    /// Identity of the target this registration delivers to
    pub fn target(&self) -> &StorageKey {
        &self.target
    }

    /// Diagnostic name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Deliver an event to the handler.
    ///
    /// Events of another type are ignored.
    pub fn react(&self, event: &dyn Any) {
        (self.handler)(event);
    }

    pub(crate) fn assign_index(&mut self, index: u64) {
        self.index = index;
    }
}

impl Keyed for ListenerRegistration {
    fn sort_key(&self) -> SortKey {
        SortKey::new(self.order, self.index)
    }

    fn matches(&self, key: &StorageKey) -> bool {
        self.target == *key
    }

    fn is_active(&self) -> bool {
        (self.alive)()
    }
}

impl fmt::Debug for ListenerRegistration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ListenerRegistration")
            .field("name", &self.name)
            .field("event_type", &self.event_type.name)
            .field("order", &self.order)
            .field("index", &self.index)
            .field("target", &self.target)
            .finish()
    }
}
