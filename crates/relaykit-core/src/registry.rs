//! Subscription storage for one bus.
//!
//! Owns the per-type listener sets, the bus set, the wrapper pool and the
//! index counter shared by listeners and buses, which gives both families
//! a single total order.

use std::collections::HashMap;
use std::sync::Arc;

use crate::dispatch::Bus;
use crate::ordered_set::OrderedSet;
use crate::pool::{BusWrapper, PoolStats, WrapperPool};
use crate::registration::{EventType, Keyed, ListenerRegistration, SortKey, StorageKey};

/// Entries detached from a registry, dropped by the caller once no lock is
/// held.
pub type Detached = (Vec<Arc<ListenerRegistration>>, Vec<Arc<BusWrapper>>);

/// Snapshot of everything one send may reach
#[derive(Debug, Default)]
pub struct Snapshot {
    /// Listeners for the sent event type, in dispatch order.
    pub listeners: Vec<Arc<ListenerRegistration>>,
    /// Nested buses, in dispatch order.
    pub buses: Vec<Arc<BusWrapper>>,
}

/// Listener sets, bus set and index counter of one bus
#[derive(Debug)]
pub struct Registry {
    listeners: HashMap<EventType, OrderedSet<ListenerRegistration>>,
    buses: OrderedSet<BusWrapper>,
    pool: WrapperPool,
    next_index: u64,
}

impl Registry {
    /// Create an empty registry keeping at most `pool_capacity` free bus
    /// wrappers
    pub fn new(pool_capacity: usize) -> Self {
        Self {
            listeners: HashMap::new(),
            buses: OrderedSet::new(),
            pool: WrapperPool::new(pool_capacity),
            next_index: 0,
        }
    }

    fn next_index(&mut self) -> u64 {
        let index = self.next_index;
        self.next_index += 1;
        index
    }

    /// Store a listener under its event type, assigning its index
    pub fn subscribe_listener(&mut self, mut registration: ListenerRegistration) -> SortKey {
        registration.assign_index(self.next_index());
        let key = registration.sort_key();
        self.listeners
            .entry(registration.event_type())
            .or_default()
            .add(Arc::new(registration));
        key
    }

    /// Remove the first listener of `event_type` created for `target`.
    ///
    /// A set left empty is dropped from the map.
    pub fn unsubscribe_listener(
        &mut self,
        event_type: EventType,
        target: &StorageKey,
    ) -> Option<Arc<ListenerRegistration>> {
        let set = self.listeners.get_mut(&event_type)?;
        let removed = set.remove(target);
        if set.is_empty() {
            self.listeners.remove(&event_type);
        }
        removed
    }

    /// Store a nested bus at `order`, wrapped by a pooled wrapper.
    ///
    /// The order is read by the caller, before locking.
    pub fn subscribe_bus(&mut self, bus: Arc<dyn Bus>, order: i32) -> SortKey {
        let key = SortKey::new(order, self.next_index());
        let wrapper = self.pool.acquire(bus, key);
        self.buses.add(wrapper);
        key
    }

    /// Remove the bus identified by `target` and return its wrapper to the
    /// pool
    pub fn unsubscribe_bus(&mut self, target: &StorageKey) -> bool {
        match self.buses.remove(target) {
            Some(wrapper) => {
                self.pool.release(wrapper);
                true
            }
            None => false,
        }
    }

    #[cfg(test)]
    fn contains_bus(&self, target: &StorageKey) -> bool {
        self.buses.contains(target)
    }

    /// Copy the sets a send of `event_type` walks
    pub fn snapshot(&self, event_type: EventType) -> Snapshot {
        Snapshot {
            listeners: self
                .listeners
                .get(&event_type)
                .map(OrderedSet::snapshot)
                .unwrap_or_default(),
            buses: self.buses.snapshot(),
        }
    }

    /// Copy every registration, listeners of all event types and buses.
    ///
    /// Nothing user supplied is called, so this is safe under a lock;
    /// liveness and names are read from the copies afterwards.
    pub fn entries(&self) -> Detached {
        let listeners = self
            .listeners
            .values()
            .flat_map(|set| set.iter().cloned())
            .collect();
        (listeners, self.buses.snapshot())
    }

    /// Number of listener registrations across all event types
    pub fn listener_count(&self) -> usize {
        self.listeners.values().map(OrderedSet::len).sum()
    }

    /// Number of nested buses
    pub fn bus_count(&self) -> usize {
        self.buses.len()
    }

    #[cfg(test)]
    fn event_type_count(&self) -> usize {
        self.listeners.len()
    }

    /// Remove exactly the given entries, matched by allocation.
    ///
    /// Bus wrappers go back to the pool. The removed listeners and the
    /// buses the wrappers held are returned so they can be dropped outside
    /// any lock. Entries no longer present are ignored.
    pub fn remove_entries(
        &mut self,
        listeners: &[Arc<ListenerRegistration>],
        buses: Vec<Arc<BusWrapper>>,
    ) -> (Vec<Arc<ListenerRegistration>>, Vec<Arc<dyn Bus>>) {
        let mut removed = Vec::new();
        for listener in listeners {
            let event_type = listener.event_type();
            let Some(set) = self.listeners.get_mut(&event_type) else {
                continue;
            };
            removed.extend(set.remove_entry(listener));
            if set.is_empty() {
                self.listeners.remove(&event_type);
            }
        }

        let mut detached = Vec::new();
        for wrapper in buses {
            let stored = self.buses.remove_entry(&wrapper);
            // The caller's copy would keep the stored wrapper from recycling
            drop(wrapper);
            if let Some(stored) = stored {
                detached.extend(self.pool.release(stored));
            }
        }

        (removed, detached)
    }

    /// Detach every registration. Bus wrappers are not returned to the
    /// pool. The index counter keeps running.
    pub fn clear(&mut self) -> Detached {
        let listeners = self
            .listeners
            .drain()
            .flat_map(|(_, mut set)| set.drain())
            .collect();
        (listeners, self.buses.drain())
    }

    /// Wrapper pool counters
    pub fn pool_stats(&self) -> PoolStats {
        self.pool.stats()
    }
}

impl Default for Registry {
    fn default() -> Self {
        Self::new(64)
    }
}
