//! Priority sorted, insertion stable collection of registrations.
//!
//! Used for each per-type listener group and for the bus list of a
//! registry. Iterating the backing vector always yields entries sorted by
//! [`SortKey`](crate::SortKey).

use std::sync::Arc;

use crate::registration::{Keyed, StorageKey};

/// Sorted set of shared entries.
///
/// Entries are stored behind `Arc` so a dispatch snapshot is a cheap
/// pointer copy that stays valid while the live set is mutated.
#[derive(Debug)]
pub struct OrderedSet<T> {
    entries: Vec<Arc<T>>,
}

impl<T> Default for OrderedSet<T> {
    fn default() -> Self {
        Self {
            entries: Vec::new(),
        }
    }
}

impl<T: Keyed> OrderedSet<T> {
    /// Create an empty set
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert an entry at its sorted position.
    ///
    /// Entries with an equal key stay behind the ones already present.
    /// No duplicate check is made.
    pub fn add(&mut self, entry: Arc<T>) {
        let key = entry.sort_key();
        let at = self.entries.partition_point(|e| e.sort_key() <= key);
        self.entries.insert(at, entry);
    }

    /// Remove and return the first entry created for `target`
    pub fn remove(&mut self, target: &StorageKey) -> Option<Arc<T>> {
        let pos = self.entries.iter().position(|e| e.matches(target))?;
        Some(self.entries.remove(pos))
    }

    /// Whether any entry was created for `target`
    pub fn contains(&self, target: &StorageKey) -> bool {
        self.entries.iter().any(|e| e.matches(target))
    }

    /// Point-in-time copy of the entries, in dispatch order
    pub fn snapshot(&self) -> Vec<Arc<T>> {
        self.entries.clone()
    }

    /// Remove this exact entry, compared by allocation rather than target
    pub fn remove_entry(&mut self, entry: &Arc<T>) -> Option<Arc<T>> {
        let pos = self.entries.iter().position(|e| Arc::ptr_eq(e, entry))?;
        Some(self.entries.remove(pos))
    }

    /// Remove every entry
    pub fn drain(&mut self) -> Vec<Arc<T>> {
        std::mem::take(&mut self.entries)
    }

    /// Iterate entries in dispatch order
    pub fn iter(&self) -> impl Iterator<Item = &Arc<T>> {
        self.entries.iter()
    }

    /// Number of entries, active or not
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the set holds no entries
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registration::SortKey;

    #[derive(Debug)]
    struct Entry {
        key: SortKey,
        target: StorageKey,
        active: bool,
    }

    fn entry(order: i32, index: u64) -> Arc<Entry> {
        Arc::new(Entry {
            key: SortKey::new(order, index),
            target: StorageKey::Address(index as usize),
            active: true,
        })
    }

    impl Keyed for Entry {
        fn sort_key(&self) -> SortKey {
            self.key
        }

        fn matches(&self, key: &StorageKey) -> bool {
            self.target == *key
        }

        fn is_active(&self) -> bool {
            self.active
        }
    }

    fn keys(set: &OrderedSet<Entry>) -> Vec<(i32, u64)> {
        set.iter().map(|e| (e.key.order, e.key.index)).collect()
    }

    #[test]
    fn test_add_keeps_sorted_order() {
        let mut set = OrderedSet::new();
        set.add(entry(5, 0));
        set.add(entry(-1, 1));
        set.add(entry(5, 2));
        set.add(entry(0, 3));
        set.add(entry(-1, 4));

        assert_eq!(keys(&set), vec![(-1, 1), (-1, 4), (0, 3), (5, 0), (5, 2)]);
    }

    #[test]
    fn test_remove_by_identity() {
        let mut set = OrderedSet::new();
        set.add(entry(0, 0));
        set.add(entry(0, 1));
        set.add(entry(0, 2));

        let removed = set.remove(&StorageKey::Address(1)).expect("entry 1 present");
        assert_eq!(removed.key.index, 1);
        assert_eq!(keys(&set), vec![(0, 0), (0, 2)]);

        // Unknown targets are a no-op
        assert!(set.remove(&StorageKey::Address(1)).is_none());
        assert!(set.remove(&StorageKey::token()).is_none());
        assert_eq!(set.len(), 2);
    }

    #[test]
    fn test_snapshot_is_detached_from_live_set() {
        let mut set = OrderedSet::new();
        set.add(entry(0, 0));
        let snapshot = set.snapshot();

        set.add(entry(0, 1));
        set.remove(&StorageKey::Address(0));

        assert_eq!(snapshot.len(), 1);
        assert_eq!(snapshot[0].key.index, 0);
        assert_eq!(keys(&set), vec![(0, 1)]);
    }

    #[test]
    fn test_remove_entry_ignores_shared_target() {
        let mut set = OrderedSet::new();
        let first = entry(0, 0);
        let twin = Arc::new(Entry {
            key: SortKey::new(1, 1),
            target: StorageKey::Address(0),
            active: false,
        });
        set.add(first.clone());
        set.add(twin.clone());

        let removed = set.remove_entry(&twin).expect("twin present");
        assert!(Arc::ptr_eq(&removed, &twin));
        assert_eq!(keys(&set), vec![(0, 0)]);
        assert!(set.remove_entry(&twin).is_none());
        assert!(set.contains(&StorageKey::Address(0)));
    }
}
