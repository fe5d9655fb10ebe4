//! Order Index
//!
//! Record ids in ascending insert-time order. New records are only ever
//! appended at the tail with a timestamp no older than the current tail,
//! so the sequence stays sorted and time ranges can be found by binary
//! search.
//!
//! Like the expiry index, it may hold ids of dead records. Readers filter
//! them out; the reclaimer compacts them.

use crate::storage::arena::RecordId;
use crate::storage::clock::Timestamp;
use std::collections::VecDeque;
use std::ops::Range;

#[derive(Debug, Clone, Copy)]
struct Slot {
    inserted_at: Timestamp,
    id: RecordId,
}

/// Record ids sorted by insert time.
#[derive(Debug, Default)]
pub(crate) struct OrderIndex {
    entries: VecDeque<Slot>,
}

impl OrderIndex {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Appends a record at the tail.
    pub(crate) fn push_back(&mut self, id: RecordId, inserted_at: Timestamp) {
        debug_assert!(
            self.entries
                .back()
                .map_or(true, |tail| tail.inserted_at <= inserted_at),
            "order index must stay sorted by insert time"
        );
        self.entries.push_back(Slot { inserted_at, id });
    }

    /// Positions of the records with `start <= inserted_at <= end`.
    ///
    /// Both bounds are inclusive. An inverted range yields an empty range.
    pub(crate) fn range(&self, start: Timestamp, end: Timestamp) -> Range<usize> {
        if start > end {
            return 0..0;
        }
        let low = self.entries.partition_point(|slot| slot.inserted_at < start);
        let high = self.entries.partition_point(|slot| slot.inserted_at <= end);
        low..high
    }

    /// Ids in `range`, in ascending insert order.
    pub(crate) fn ids_in(
        &self,
        range: Range<usize>,
    ) -> impl DoubleEndedIterator<Item = RecordId> + '_ {
        self.entries.range(range).map(|slot| slot.id)
    }

    /// All ids, in ascending insert order.
    pub(crate) fn ids(&self) -> impl DoubleEndedIterator<Item = RecordId> + '_ {
        self.entries.iter().map(|slot| slot.id)
    }

    /// Removes ids from the head while `evict` returns true. Returns them.
    pub(crate) fn evict_front_while(
        &mut self,
        mut evict: impl FnMut(RecordId) -> bool,
    ) -> Vec<RecordId> {
        let mut evicted = Vec::new();
        while let Some(slot) = self.entries.front() {
            if !evict(slot.id) {
                break;
            }
            evicted.push(slot.id);
            self.entries.pop_front();
        }
        evicted
    }

    /// Removes ids from the tail while `evict` returns true. Returns them.
    pub(crate) fn evict_back_while(
        &mut self,
        mut evict: impl FnMut(RecordId) -> bool,
    ) -> Vec<RecordId> {
        let mut evicted = Vec::new();
        while let Some(slot) = self.entries.back() {
            if !evict(slot.id) {
                break;
            }
            evicted.push(slot.id);
            self.entries.pop_back();
        }
        evicted
    }

    /// Keeps only the ids for which `keep` returns true, preserving order.
    pub(crate) fn retain(&mut self, mut keep: impl FnMut(RecordId) -> bool) {
        self.entries.retain(|slot| keep(slot.id));
    }

    #[inline]
    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }

    pub(crate) fn clear(&mut self) {
        self.entries.clear();
    }
}
