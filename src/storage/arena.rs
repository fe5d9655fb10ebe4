//! Record Arena
//!
//! Owns every record the store still references. The three indices hold
//! [`RecordId`]s instead of pointers; each slot counts how many indices
//! still reference it and is freed when the last one lets go.
//!
//! Records are handed out as `Arc`s so range and order queries can keep
//! reading a snapshot after the store lock is released.

use crate::storage::clock::Timestamp;
use crate::storage::record::Record;
use std::collections::HashMap;
use std::sync::Arc;

/// Stable identifier of a record inside a store.
///
/// Ids are never reused, so they also encode allocation order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RecordId(u64);

#[derive(Debug)]
struct Slot<K, V> {
    record: Arc<Record<K, V>>,
    /// Number of indices still holding this id
    refs: u8,
}

/// Arena of records indexed by [`RecordId`].
#[derive(Debug)]
pub(crate) struct RecordArena<K, V> {
    slots: HashMap<RecordId, Slot<K, V>>,
    next_id: u64,
    /// Tombstoned records that are still resident
    tombstoned: usize,
}

impl<K, V> RecordArena<K, V> {
    pub(crate) fn new() -> Self {
        Self {
            slots: HashMap::new(),
            next_id: 0,
            tombstoned: 0,
        }
    }

    /// Stores `record`, referenced by `refs` indices.
    pub(crate) fn alloc(&mut self, record: Record<K, V>, refs: u8) -> RecordId {
        debug_assert!(refs > 0);
        let id = RecordId(self.next_id);
        self.next_id += 1;
        self.slots.insert(
            id,
            Slot {
                record: Arc::new(record),
                refs,
            },
        );
        id
    }

    #[inline]
    pub(crate) fn get(&self, id: RecordId) -> Option<&Arc<Record<K, V>>> {
        self.slots.get(&id).map(|slot| &slot.record)
    }

    /// Returns true if `id` is resident and live at `now`.
    #[inline]
    pub(crate) fn is_live(&self, id: RecordId, now: Timestamp) -> bool {
        self.get(id).is_some_and(|record| record.is_live(now))
    }

    /// Tombstones the record. Returns true if this call killed it.
    pub(crate) fn tombstone(&mut self, id: RecordId) -> bool {
        let killed = self
            .slots
            .get(&id)
            .is_some_and(|slot| slot.record.tombstone());
        if killed {
            self.tombstoned += 1;
        }
        killed
    }

    /// Drops one index reference, freeing the slot when none remain.
    pub(crate) fn release(&mut self, id: RecordId) {
        let Some(slot) = self.slots.get_mut(&id) else {
            return;
        };
        slot.refs = slot.refs.saturating_sub(1);
        if slot.refs == 0 {
            if let Some(slot) = self.slots.remove(&id) {
                if slot.record.is_tombstoned() {
                    self.tombstoned -= 1;
                }
            }
        }
    }

    #[inline]
    pub(crate) fn len(&self) -> usize {
        self.slots.len()
    }

    #[inline]
    pub(crate) fn tombstoned(&self) -> usize {
        self.tombstoned
    }

    /// Tombstones and frees everything. Returns how many records were resident.
    pub(crate) fn clear(&mut self) -> usize {
        let resident = self.slots.len();
        for slot in self.slots.values() {
            slot.record.tombstone();
        }
        self.slots.clear();
        self.tombstoned = 0;
        resident
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::record::Ttl;
    use std::time::{Duration, SystemTime};

    fn record(key: u32) -> Record<u32, &'static str> {
        Record::new(key, "v", Ttl::Never, SystemTime::UNIX_EPOCH)
    }

    #[test]
    fn test_ids_are_unique_and_ordered() {
        let mut arena = RecordArena::new();
        let a = arena.alloc(record(1), 1);
        let b = arena.alloc(record(2), 1);
        assert_ne!(a, b);
        assert!(a < b);
        assert_eq!(arena.len(), 2);
    }

    #[test]
    fn test_release_frees_after_last_reference() {
        let mut arena = RecordArena::new();
        let id = arena.alloc(record(1), 3);

        arena.release(id);
        arena.release(id);
        assert!(arena.get(id).is_some());

        arena.release(id);
        assert!(arena.get(id).is_none());
        assert_eq!(arena.len(), 0);

        // Releasing a freed id is a no-op
        arena.release(id);
    }

    #[test]
    fn test_tombstone_counting() {
        let mut arena = RecordArena::new();
        let id = arena.alloc(record(1), 2);

        assert!(arena.tombstone(id));
        assert!(!arena.tombstone(id));
        assert_eq!(arena.tombstoned(), 1);
        assert!(!arena.is_live(id, SystemTime::UNIX_EPOCH));

        arena.release(id);
        assert_eq!(arena.tombstoned(), 1);
        arena.release(id);
        assert_eq!(arena.tombstoned(), 0);
    }

    #[test]
    fn test_snapshot_outlives_slot() {
        let mut arena = RecordArena::new();
        let id = arena.alloc(record(7), 1);
        let held = Arc::clone(arena.get(id).unwrap());

        arena.tombstone(id);
        arena.release(id);

        assert_eq!(*held.key(), 7);
        assert!(held.is_tombstoned());
    }

    #[test]
    fn test_is_live_respects_expiry() {
        let mut arena = RecordArena::new();
        let t0 = SystemTime::UNIX_EPOCH;
        let id = arena.alloc(Record::new(1, "v", Ttl::millis(10), t0), 1);
        assert!(arena.is_live(id, t0 + Duration::from_millis(10)));
        assert!(!arena.is_live(id, t0 + Duration::from_millis(11)));
    }

    #[test]
    fn test_clear_tombstones_everything() {
        let mut arena = RecordArena::new();
        let id = arena.alloc(record(1), 3);
        let held = Arc::clone(arena.get(id).unwrap());

        assert_eq!(arena.clear(), 1);
        assert_eq!(arena.len(), 0);
        assert!(held.is_tombstoned());
    }
}
