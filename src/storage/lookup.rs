//! Lookup Table
//!
//! Maps each key to the id of its current record. This is the single source
//! of truth for whether a key exists: a key is removed here in the same
//! critical section that tombstones its record.

use crate::storage::arena::RecordId;
use std::collections::HashMap;
use std::hash::Hash;

/// Key to current-record mapping.
#[derive(Debug)]
pub(crate) struct LookupTable<K> {
    map: HashMap<K, RecordId>,
}

impl<K: Eq + Hash> LookupTable<K> {
    pub(crate) fn new() -> Self {
        Self {
            map: HashMap::new(),
        }
    }

    #[inline]
    pub(crate) fn get(&self, key: &K) -> Option<RecordId> {
        self.map.get(key).copied()
    }

    #[inline]
    pub(crate) fn contains(&self, key: &K) -> bool {
        self.map.contains_key(key)
    }

    /// Maps `key` to `id`. Returns false, leaving the table unchanged, if the key is present.
    pub(crate) fn insert(&mut self, key: K, id: RecordId) -> bool {
        match self.map.entry(key) {
            std::collections::hash_map::Entry::Occupied(_) => false,
            std::collections::hash_map::Entry::Vacant(slot) => {
                slot.insert(id);
                true
            }
        }
    }

    /// Removes `key` only if it still maps to `id`.
    pub(crate) fn remove_if(&mut self, key: &K, id: RecordId) -> bool {
        if self.map.get(key) == Some(&id) {
            self.map.remove(key);
            true
        } else {
            false
        }
    }

    /// Keeps only the entries for which `keep` returns true.
    pub(crate) fn retain(&mut self, mut keep: impl FnMut(RecordId) -> bool) {
        self.map.retain(|_, id| keep(*id));
    }

    #[inline]
    pub(crate) fn len(&self) -> usize {
        self.map.len()
    }

    pub(crate) fn clear(&mut self) {
        self.map.clear();
    }

    #[cfg(test)]
    pub(crate) fn ids(&self) -> impl Iterator<Item = RecordId> + '_ {
        self.map.values().copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::arena::RecordArena;
    use crate::storage::record::{Record, Ttl};
    use std::time::SystemTime;

    #[test]
    fn test_insert_never_overwrites() {
        let mut arena = RecordArena::new();
        let a = arena.alloc(Record::new("k", 1, Ttl::Never, SystemTime::UNIX_EPOCH), 1);
        let b = arena.alloc(Record::new("k", 2, Ttl::Never, SystemTime::UNIX_EPOCH), 1);

        let mut table = LookupTable::new();
        assert!(table.insert("k", a));
        assert!(!table.insert("k", b));
        assert_eq!(table.get(&"k"), Some(a));
    }

    #[test]
    fn test_remove_if_matches_id() {
        let mut arena = RecordArena::new();
        let old = arena.alloc(Record::new("k", 1, Ttl::Never, SystemTime::UNIX_EPOCH), 1);
        let new = arena.alloc(Record::new("k", 2, Ttl::Never, SystemTime::UNIX_EPOCH), 1);

        let mut table = LookupTable::new();
        table.insert("k", new);

        // A superseded record must not remove its successor
        assert!(!table.remove_if(&"k", old));
        assert!(table.contains(&"k"));

        assert!(table.remove_if(&"k", new));
        assert!(!table.contains(&"k"));
        assert_eq!(table.len(), 0);
    }
}
