//! Bus wrappers and the free list that recycles them.
//!
//! Only nested-bus subscriptions go through the pool. Listener
//! registrations are built by their subscribers and simply dropped.

use std::fmt;
use std::sync::Arc;

use crate::dispatch::Bus;
use crate::registration::{Keyed, SortKey, StorageKey};

/// Registry entry for a nested bus.
///
/// A wrapper that went back to the pool holds no bus and is never active.
#[derive(Default)]
pub struct BusWrapper {
    bus: Option<Arc<dyn Bus>>,
    target: Option<StorageKey>,
    key: SortKey,
}

impl BusWrapper {
    fn init(&mut self, bus: Arc<dyn Bus>, key: SortKey) {
        self.target = Some(StorageKey::of(&bus));
        self.bus = Some(bus);
        self.key = key;
    }

    fn clear(&mut self) -> Option<Arc<dyn Bus>> {
        self.target = None;
        self.key = SortKey::default();
        self.bus.take()
    }

    /// The wrapped bus, if the wrapper is in use
    pub fn bus(&self) -> Option<&Arc<dyn Bus>> {
        self.bus.as_ref()
    }

    /// Identity of the wrapped bus
    pub fn target(&self) -> Option<&StorageKey> {
        self.target.as_ref()
    }
}

impl Keyed for BusWrapper {
    fn sort_key(&self) -> SortKey {
        self.key
    }

    fn matches(&self, key: &StorageKey) -> bool {
        self.target.as_ref() == Some(key)
    }

    fn is_active(&self) -> bool {
        self.bus.as_ref().is_some_and(|bus| bus.is_active())
    }
}

impl fmt::Debug for BusWrapper {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BusWrapper")
            .field("bus", &self.bus.as_ref().map(|bus| bus.name().to_string()))
            .field("target", &self.target)
            .field("key", &self.key)
            .finish()
    }
}

/// Counters describing pool usage
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PoolStats {
    /// Wrappers allocated because the free list was empty.
    pub allocated: usize,
    /// Acquisitions served from the free list.
    pub reused: usize,
    /// Wrappers handed back through [`WrapperPool::release`].
    pub released: usize,
    /// Wrappers currently waiting on the free list.
    pub free: usize,
}

/// Free list of [`BusWrapper`]s.
///
/// Only wrappers that nothing else references are recycled. A wrapper
/// still held by an in-flight dispatch snapshot is dropped instead, so the
/// snapshot never sees it re-initialized for another bus.
#[derive(Debug)]
pub struct WrapperPool {
    free: Vec<Arc<BusWrapper>>,
    capacity: usize,
    allocated: usize,
    reused: usize,
    released: usize,
}

impl WrapperPool {
    /// Create a pool retaining at most `capacity` free wrappers
    pub fn new(capacity: usize) -> Self {
        Self {
            free: Vec::new(),
            capacity,
            allocated: 0,
            reused: 0,
            released: 0,
        }
    }

    /// Take a wrapper for `bus`, reusing a free one when available
    pub fn acquire(&mut self, bus: Arc<dyn Bus>, key: SortKey) -> Arc<BusWrapper> {
        if let Some(mut wrapper) = self.free.pop() {
            if let Some(slot) = Arc::get_mut(&mut wrapper) {
                slot.init(bus, key);
                self.reused += 1;
                return wrapper;
            }
        }

        self.allocated += 1;
        let mut wrapper = BusWrapper::default();
        wrapper.init(bus, key);
        Arc::new(wrapper)
    }

    /// Clear a wrapper and push it onto the free list.
    ///
    /// Returns the bus the wrapper held so the caller decides where it is
    /// dropped.
    pub fn release(&mut self, mut wrapper: Arc<BusWrapper>) -> Option<Arc<dyn Bus>> {
        self.released += 1;

        let Some(slot) = Arc::get_mut(&mut wrapper) else {
            tracing::trace!("Bus wrapper still in use by a dispatch, not recycled");
            return None;
        };
        let bus = slot.clear();

        if self.free.len() < self.capacity {
            self.free.push(wrapper);
        }
        bus
    }

    /// Current counters
    pub fn stats(&self) -> PoolStats {
        PoolStats {
            allocated: self.allocated,
            reused: self.reused,
            released: self.released,
            free: self.free.len(),
        }
    }
}

impl Default for WrapperPool {
    fn default() -> Self {
        Self::new(64)
    }
}
