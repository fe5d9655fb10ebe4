//! Expiry Index
//!
//! A min-heap of record ids keyed by expiry deadline. It answers "what is
//! the next thing to expire" in O(1) and drops it in O(log n).
//!
//! Erase and update never touch the heap. Ids of dead records stay in it
//! until the reclaimer pops them off the top or a full sweep rebuilds it.

use crate::storage::arena::RecordId;
use crate::storage::clock::Timestamp;
use std::cmp::Reverse;
use std::collections::BinaryHeap;

/// Heap entry. Field order matters for the derived `Ord`: records that
/// never expire sort after every record with a deadline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
struct Deadline {
    never: bool,
    at: Option<Timestamp>,
    id: RecordId,
}

/// Record ids ordered by ascending expiry deadline.
#[derive(Debug, Default)]
pub(crate) struct ExpiryIndex {
    heap: BinaryHeap<Reverse<Deadline>>,
}

impl ExpiryIndex {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Adds a record. `expires_at == None` means it never expires.
    pub(crate) fn push(&mut self, id: RecordId, expires_at: Option<Timestamp>) {
        self.heap.push(Reverse(Deadline {
            never: expires_at.is_none(),
            at: expires_at,
            id,
        }));
    }

    /// The id with the earliest deadline.
    #[inline]
    pub(crate) fn peek(&self) -> Option<RecordId> {
        self.heap.peek().map(|Reverse(entry)| entry.id)
    }

    pub(crate) fn pop(&mut self) -> Option<RecordId> {
        self.heap.pop().map(|Reverse(entry)| entry.id)
    }

    /// Keeps only the ids for which `keep` returns true.
    pub(crate) fn retain(&mut self, mut keep: impl FnMut(RecordId) -> bool) {
        self.heap.retain(|Reverse(entry)| keep(entry.id));
    }

    #[inline]
    pub(crate) fn len(&self) -> usize {
        self.heap.len()
    }

    pub(crate) fn clear(&mut self) {
        self.heap.clear();
    }
}
