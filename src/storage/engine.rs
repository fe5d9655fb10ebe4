//! Thread-Safe TTL Store
//!
//! This module implements the core store for ChronoKV. Every key is
//! reachable through three structures that must always agree:
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                     Store (one Mutex)                       │
//! │                                                             │
//! │  ┌─────────────┐  ┌──────────────┐  ┌──────────────────┐    │
//! │  │ LookupTable │  │ ExpiryIndex  │  │   OrderIndex     │    │
//! │  │ key -> id   │  │ min-heap by  │  │ deque sorted by  │    │
//! │  │             │  │ deadline     │  │ insert time      │    │
//! │  └──────┬──────┘  └──────┬───────┘  └────────┬─────────┘    │
//! │         └────────────────┼───────────────────┘              │
//! │                          ▼                                  │
//! │                 ┌─────────────────┐                         │
//! │                 │  RecordArena    │                         │
//! │                 │  id -> Record   │                         │
//! │                 └─────────────────┘                         │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Design Decisions
//!
//! 1. **One Lock**: a single mutex covers all three structures, so they are
//!    always observed and mutated as a unit.
//! 2. **Tombstones**: removing a key tombstones its record and drops it from
//!    the lookup table right away. The expiry and order indices keep the
//!    stale id until the reclaimer compacts them.
//! 3. **Append-only Updates**: an update retires the old record and appends
//!    a new one, so both secondary indices only ever grow at the tail.
//! 4. **Snapshot Reads**: range and order queries copy record handles under
//!    the lock and filter them after releasing it.

use crate::config::StoreConfig;
use crate::error::Result;
use crate::storage::arena::{RecordArena, RecordId};
use crate::storage::clock::{ClockSource, SystemClock, Timestamp};
use crate::storage::expiry::ExpiryIndex;
use crate::storage::lookup::LookupTable;
use crate::storage::order::OrderIndex;
use crate::storage::record::{Record, RecordView, Ttl, TtlPolicy};
use std::hash::Hash;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::trace;

/// Number of indices a freshly inserted record is referenced by.
const INDEX_COUNT: u8 = 3;

/// Sizes of the internal structures at one point in time.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IndexSizes {
    /// Keys in the lookup table
    pub lookup: usize,
    /// Entries in the expiry heap, including stale ones
    pub expiry: usize,
    /// Entries in the order index, including stale ones
    pub order: usize,
    /// Records still resident in memory
    pub arena: usize,
    /// Resident records that are tombstoned
    pub tombstoned: usize,
}

/// Operation counters.
#[derive(Debug, Clone, Default)]
pub struct StoreStats {
    pub inserts: u64,
    pub updates: u64,
    pub erased: u64,
    pub gets: u64,
    /// Records found expired, by lookups or by the reclaimer
    pub expired: u64,
}

/// The three indices plus the records they point at.
struct Inner<K, V> {
    arena: RecordArena<K, V>,
    lookup: LookupTable<K>,
    expiry: ExpiryIndex,
    order: OrderIndex,
    /// Insert time of the newest record ever appended
    last_stamp: Option<Timestamp>,
}

impl<K: Eq + Hash + Clone, V> Inner<K, V> {
    fn new() -> Self {
        Self {
            arena: RecordArena::new(),
            lookup: LookupTable::new(),
            expiry: ExpiryIndex::new(),
            order: OrderIndex::new(),
            last_stamp: None,
        }
    }

    /// Next insert time: the clock reading, never older than the previous stamp.
    fn stamp(&mut self, now: Timestamp) -> Timestamp {
        let stamp = self.last_stamp.map_or(now, |last| last.max(now));
        self.last_stamp = Some(stamp);
        stamp
    }

    fn insert(&mut self, key: K, value: V, ttl: Ttl, stamp: Timestamp) -> bool {
        if self.lookup.contains(&key) {
            return false;
        }

        let record = Record::new(key.clone(), value, ttl, stamp);
        let expires_at = record.expires_at();
        let id = self.arena.alloc(record, INDEX_COUNT);

        self.order.push_back(id, stamp);
        self.expiry.push(id, expires_at);
        self.lookup.insert(key, id);
        true
    }

    fn sizes(&self) -> IndexSizes {
        IndexSizes {
            lookup: self.lookup.len(),
            expiry: self.expiry.len(),
            order: self.order.len(),
            arena: self.arena.len(),
            tombstoned: self.arena.tombstoned(),
        }
    }
}

/// Tombstones a record and, if it is still the key's current record, removes
/// the key from the lookup table.
///
/// Returns true if the key was removed from the lookup table.
fn retire<K: Eq + Hash, V>(
    arena: &mut RecordArena<K, V>,
    lookup: &mut LookupTable<K>,
    id: RecordId,
) -> bool {
    let Some(record) = arena.get(id).map(Arc::clone) else {
        return false;
    };
    arena.tombstone(id);
    if lookup.remove_if(record.key(), id) {
        arena.release(id);
        true
    } else {
        false
    }
}

/// Thread-safe key-value store with per-entry TTL.
///
/// The store is designed to be wrapped in an `Arc` and shared between
/// threads. Every operation holds the store lock for a short, bounded time
/// and never blocks on anything else.
///
/// # Example
///
/// ```
/// use chronokv::storage::{Store, Ttl, TtlPolicy};
/// use std::time::Duration;
///
/// let store = Store::new();
///
/// assert!(store.insert("session", "abc", Ttl::After(Duration::from_secs(60))));
/// assert!(!store.insert("session", "xyz", Ttl::Never)); // insert never overwrites
/// assert_eq!(store.get(&"session"), Some("abc"));
///
/// assert!(store.update(&"session", "def", TtlPolicy::KeepExisting));
/// assert_eq!(store.get(&"session"), Some("def"));
///
/// assert!(store.erase_by_key(&"session"));
/// assert_eq!(store.get(&"session"), None);
/// ```
pub struct Store<K, V> {
    inner: Mutex<Inner<K, V>>,
    clock: Arc<dyn ClockSource>,
    config: StoreConfig,

    insert_count: AtomicU64,
    update_count: AtomicU64,
    erased_count: AtomicU64,
    get_count: AtomicU64,
    expired_count: AtomicU64,
}

impl<K, V> std::fmt::Debug for Store<K, V> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Store")
            .field("config", &self.config)
            .field("insert_count", &self.insert_count.load(Ordering::Relaxed))
            .field("get_count", &self.get_count.load(Ordering::Relaxed))
            .finish()
    }
}

impl<K, V> Default for Store<K, V>
where
    K: Eq + Hash + Clone,
    V: Clone,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<K, V> Store<K, V>
where
    K: Eq + Hash + Clone,
    V: Clone,
{
    /// Creates a store with the default configuration and the system clock.
    pub fn new() -> Self {
        Self::build(StoreConfig::default(), Arc::new(SystemClock))
    }

    /// Creates a store with a custom configuration.
    pub fn with_config(config: StoreConfig) -> Result<Self> {
        Self::with_clock(config, Arc::new(SystemClock))
    }

    /// Creates a store that reads time from `clock`.
    pub fn with_clock(config: StoreConfig, clock: Arc<dyn ClockSource>) -> Result<Self> {
        config.validate()?;
        Ok(Self::build(config, clock))
    }

    fn build(config: StoreConfig, clock: Arc<dyn ClockSource>) -> Self {
        Self {
            inner: Mutex::new(Inner::new()),
            clock,
            config,
            insert_count: AtomicU64::new(0),
            update_count: AtomicU64::new(0),
            erased_count: AtomicU64::new(0),
            get_count: AtomicU64::new(0),
            expired_count: AtomicU64::new(0),
        }
    }

    /// Acquires the store lock.
    ///
    /// A panic can only happen while cloning caller values, after the
    /// structures are consistent again, so a poisoned lock is still usable.
    #[inline]
    fn lock(&self) -> MutexGuard<'_, Inner<K, V>> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    #[inline]
    fn now(&self) -> Timestamp {
        self.clock.now()
    }

    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    // ========================================================================
    // WRITES
    // ========================================================================

    /// Inserts a new key.
    ///
    /// Returns `false` without changing anything if the key is already in
    /// the lookup table, even if its record has expired but has not been
    /// reclaimed yet.
    pub fn insert(&self, key: K, value: V, ttl: impl Into<Ttl>) -> bool {
        self.insert_count.fetch_add(1, Ordering::Relaxed);
        let ttl = ttl.into();

        let mut inner = self.lock();
        let stamp = inner.stamp(self.now());
        inner.insert(key, value, ttl, stamp)
    }

    /// Replaces the value of an existing key.
    ///
    /// The old record is tombstoned and a new one is appended with a fresh
    /// insert time, so the key moves to the newest end of the order index.
    /// Returns `false` if the key is absent.
    pub fn update(&self, key: &K, value: V, policy: TtlPolicy) -> bool {
        self.update_count.fetch_add(1, Ordering::Relaxed);

        let mut guard = self.lock();
        let stamp = guard.stamp(self.now());
        let inner = &mut *guard;

        let Some(old_id) = inner.lookup.get(key) else {
            return false;
        };
        let ttl = match inner.arena.get(old_id) {
            Some(old) => old.successor_ttl(policy),
            None => return false,
        };

        retire(&mut inner.arena, &mut inner.lookup, old_id);
        let inserted = inner.insert(key.clone(), value, ttl, stamp);
        debug_assert!(inserted);
        trace!(?ttl, "record replaced");
        inserted
    }

    /// Removes a key. Returns `false` if it was absent.
    pub fn erase_by_key(&self, key: &K) -> bool {
        let mut guard = self.lock();
        let inner = &mut *guard;

        let Some(id) = inner.lookup.get(key) else {
            return false;
        };
        let removed = retire(&mut inner.arena, &mut inner.lookup, id);
        if removed {
            self.erased_count.fetch_add(1, Ordering::Relaxed);
        }
        removed
    }

    /// Removes every record inserted within `[start, end]`.
    ///
    /// Both bounds are inclusive. Returns the number of keys removed from the
    /// lookup table; records in range that were already dead are tombstoned
    /// again (a no-op) but not counted. An inverted range removes nothing.
    pub fn erase_by_time_range(&self, start: Timestamp, end: Timestamp) -> usize {
        if start > end {
            return 0;
        }

        let mut guard = self.lock();
        let Inner {
            arena,
            lookup,
            order,
            ..
        } = &mut *guard;

        let mut removed = 0;
        for id in order.ids_in(order.range(start, end)) {
            if retire(arena, lookup, id) {
                removed += 1;
            }
        }

        self.erased_count.fetch_add(removed as u64, Ordering::Relaxed);
        trace!(removed, "erased by time range");
        removed
    }

    /// Removes up to `n` live records, oldest first if `ascending`, newest first otherwise.
    ///
    /// Dead records are skipped and never counted. Returns the number removed.
    pub fn erase_by_order(&self, n: usize, ascending: bool) -> usize {
        if n == 0 {
            return 0;
        }

        let mut guard = self.lock();
        let now = self.now();
        let Inner {
            arena,
            lookup,
            order,
            ..
        } = &mut *guard;

        let ids: Box<dyn Iterator<Item = RecordId> + '_> = if ascending {
            Box::new(order.ids())
        } else {
            Box::new(order.ids().rev())
        };

        let mut removed = 0;
        for id in ids {
            if !arena.is_live(id, now) {
                continue;
            }
            if retire(arena, lookup, id) {
                removed += 1;
                if removed >= n {
                    break;
                }
            }
        }

        self.erased_count.fetch_add(removed as u64, Ordering::Relaxed);
        trace!(removed, ascending, "erased by order");
        removed
    }

    // ========================================================================
    // READS
    // ========================================================================

    /// Returns a copy of the value for `key`.
    ///
    /// This implements lazy expiry: if the key is present but its record has
    /// expired, the record is tombstoned, the key is removed, and `None` is
    /// returned.
    pub fn get(&self, key: &K) -> Option<V> {
        self.get_count.fetch_add(1, Ordering::Relaxed);

        let mut guard = self.lock();
        let now = self.now();
        let inner = &mut *guard;

        let id = inner.lookup.get(key)?;
        let record = Arc::clone(inner.arena.get(id)?);
        if record.is_live(now) {
            return Some(record.value().clone());
        }

        retire(&mut inner.arena, &mut inner.lookup, id);
        self.expired_count.fetch_add(1, Ordering::Relaxed);
        None
    }

    /// Returns true if `key` is present and live. Does not reclaim anything.
    pub fn contains_key(&self, key: &K) -> bool {
        let inner = self.lock();
        let now = self.now();
        let live = inner
            .lookup
            .get(key)
            .is_some_and(|id| inner.arena.is_live(id, now));
        live
    }

    /// Returns the live records inserted within `[start, end]`.
    ///
    /// Results are ordered by insert time, oldest first if `ascending`. The
    /// scan runs on a snapshot taken under the lock, so writers are not
    /// blocked while it filters. This never mutates the store.
    pub fn get_by_time_range(
        &self,
        start: Timestamp,
        end: Timestamp,
        ascending: bool,
    ) -> Vec<RecordView<K, V>> {
        if start > end {
            return Vec::new();
        }

        let (snapshot, now): (Vec<Arc<Record<K, V>>>, Timestamp) = {
            let inner = self.lock();
            let records = inner
                .order
                .ids_in(inner.order.range(start, end))
                .filter_map(|id| inner.arena.get(id).map(Arc::clone))
                .collect();
            (records, self.now())
        };

        let live = snapshot.iter().filter(|record| record.is_live(now));
        if ascending {
            live.map(|record| record.view()).collect()
        } else {
            live.rev().map(|record| record.view()).collect()
        }
    }

    /// Returns up to `n` live records, oldest first if `ascending`, newest first otherwise.
    ///
    /// Like [`get_by_time_range`](Self::get_by_time_range), this filters a
    /// snapshot outside the lock and never mutates the store.
    pub fn get_by_order(&self, n: usize, ascending: bool) -> Vec<RecordView<K, V>> {
        if n == 0 {
            return Vec::new();
        }

        let (snapshot, now): (Vec<Arc<Record<K, V>>>, Timestamp) = {
            let inner = self.lock();
            let records = inner
                .order
                .ids()
                .filter_map(|id| inner.arena.get(id).map(Arc::clone))
                .collect();
            (records, self.now())
        };

        let live = snapshot.iter().filter(|record| record.is_live(now));
        if ascending {
            live.take(n).map(|record| record.view()).collect()
        } else {
            live.rev().take(n).map(|record| record.view()).collect()
        }
    }

    // ========================================================================
    // RECLAMATION
    // ========================================================================

    /// Incremental trim: pops dead records off the top of the expiry index
    /// until the top one is live, then drops dead records from both ends of
    /// the order index.
    ///
    /// Cheap, but records that are dead yet neither near the top of the
    /// heap nor at an end of the order index stay resident until a
    /// [`full_sweep`](Self::full_sweep). Returns the number of records freed.
    pub fn trim_expired(&self) -> usize {
        let mut guard = self.lock();
        let now = self.now();
        let Inner {
            arena,
            lookup,
            expiry,
            order,
            ..
        } = &mut *guard;
        let resident = arena.len();
        let mut expired = 0u64;

        while let Some(id) = expiry.peek() {
            if arena.is_live(id, now) {
                break;
            }
            expiry.pop();
            if retire(arena, lookup, id) {
                expired += 1;
            }
            arena.release(id);
        }

        let mut evicted = order.evict_front_while(|id| !arena.is_live(id, now));
        evicted.extend(order.evict_back_while(|id| !arena.is_live(id, now)));
        for id in evicted {
            if retire(arena, lookup, id) {
                expired += 1;
            }
            arena.release(id);
        }

        self.expired_count.fetch_add(expired, Ordering::Relaxed);
        resident - arena.len()
    }

    /// Full sweep: rebuilds all three structures, dropping every dead record.
    ///
    /// O(n) in the number of resident records. Afterwards no tombstoned
    /// record is resident. Returns the number of records freed.
    pub fn full_sweep(&self) -> usize {
        let mut guard = self.lock();
        let now = self.now();
        let Inner {
            arena,
            lookup,
            expiry,
            order,
            ..
        } = &mut *guard;
        let resident = arena.len();
        let mut expired = 0u64;

        lookup.retain(|id| {
            if arena.is_live(id, now) {
                return true;
            }
            if arena.tombstone(id) {
                expired += 1;
            }
            arena.release(id);
            false
        });

        let mut drop_dead = |id: RecordId| {
            if arena.is_live(id, now) {
                return true;
            }
            arena.tombstone(id);
            arena.release(id);
            false
        };
        expiry.retain(&mut drop_dead);
        order.retain(&mut drop_dead);

        debug_assert_eq!(arena.tombstoned(), 0);
        self.expired_count.fetch_add(expired, Ordering::Relaxed);
        resident - arena.len()
    }

    /// Drops every record from every structure. Returns how many keys were present.
    ///
    /// Snapshots already handed to readers stay valid but see the records as
    /// dead.
    pub fn clear(&self) -> usize {
        let mut inner = self.lock();
        let keys = inner.lookup.len();
        inner.lookup.clear();
        inner.expiry.clear();
        inner.order.clear();
        inner.arena.clear();
        keys
    }

    // ========================================================================
    // INTROSPECTION
    // ========================================================================

    /// Number of keys in the lookup table.
    ///
    /// May include keys whose records have expired but have not been
    /// noticed yet by a lookup or the reclaimer.
    pub fn len(&self) -> usize {
        self.lock().lookup.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Current sizes of the internal structures.
    pub fn sizes(&self) -> IndexSizes {
        self.lock().sizes()
    }

    /// Fraction of resident records that are tombstoned.
    pub fn stale_ratio(&self) -> f64 {
        let inner = self.lock();
        let resident = inner.arena.len();
        if resident == 0 {
            0.0
        } else {
            inner.arena.tombstoned() as f64 / resident as f64
        }
    }

    /// Returns operation counters.
    pub fn stats(&self) -> StoreStats {
        StoreStats {
            inserts: self.insert_count.load(Ordering::Relaxed),
            updates: self.update_count.load(Ordering::Relaxed),
            erased: self.erased_count.load(Ordering::Relaxed),
            gets: self.get_count.load(Ordering::Relaxed),
            expired: self.expired_count.load(Ordering::Relaxed),
        }
    }

    /// Checks that the three structures agree. Used by tests.
    #[cfg(test)]
    pub(crate) fn assert_consistent(&self) {
        let inner = self.lock();
        let order_ids: std::collections::HashSet<RecordId> = inner.order.ids().collect();
        inner.lookup.ids().for_each(|id| {
            let record = inner.arena.get(id).expect("lookup id must be resident");
            assert!(!record.is_tombstoned(), "lookup maps to a tombstoned record");
            assert!(order_ids.contains(&id), "lookup id missing from order index");
        });
        let mut last = None;
        for id in inner.order.ids() {
            let at = inner
                .arena
                .get(id)
                .expect("order id must be resident")
                .inserted_at();
            assert!(
                last.map_or(true, |last| last <= at),
                "order index out of order"
            );
            last = Some(at);
        }
    }
}

/// Builds a store from key-value pairs that never expire.
///
/// Pairs are inserted in iteration order, so that is also their order in the
/// order index. A later pair with an already present key is dropped, as with
/// [`Store::insert`].
impl<K, V> FromIterator<(K, V)> for Store<K, V>
where
    K: Eq + Hash + Clone,
    V: Clone,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut store = Store::new();
        store.extend(iter);
        store
    }
}

impl<K, V> Extend<(K, V)> for Store<K, V>
where
    K: Eq + Hash + Clone,
    V: Clone,
{
    fn extend<I: IntoIterator<Item = (K, V)>>(&mut self, iter: I) {
        for (key, value) in iter {
            self.insert(key, value, Ttl::Never);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::clock::ManualClock;
    use std::time::{Duration, SystemTime};

    fn t0() -> Timestamp {
        SystemTime::UNIX_EPOCH + Duration::from_secs(1_000)
    }

    fn manual_store() -> (Store<u32, String>, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::new(t0()));
        let store = Store::with_clock(StoreConfig::default(), clock.clone()).unwrap();
        (store, clock)
    }

    /// Inserts keys 1..=n, one millisecond apart, starting at t0 + 1ms.
    fn fill(store: &Store<u32, String>, clock: &ManualClock, n: u32) {
        for key in 1..=n {
            clock.advance(Duration::from_millis(1));
            assert!(store.insert(key, format!("v{key}"), Ttl::Never));
        }
    }

    fn keys(views: &[RecordView<u32, String>]) -> Vec<u32> {
        views.iter().map(|view| view.key).collect()
    }

    fn ms(n: u64) -> Timestamp {
        t0() + Duration::from_millis(n)
    }

    #[test]
    fn test_insert_and_get() {
        let (store, _) = manual_store();
        assert!(store.insert(1, "a".into(), Ttl::Never));
        assert_eq!(store.get(&1), Some("a".to_string()));
        assert_eq!(store.get(&2), None);
        assert_eq!(store.len(), 1);
        store.assert_consistent();
    }

    #[test]
    fn test_insert_does_not_overwrite() {
        let (store, _) = manual_store();
        assert!(store.insert(1, "a".into(), Ttl::Never));
        assert!(!store.insert(1, "b".into(), Ttl::Never));
        assert_eq!(store.get(&1), Some("a".to_string()));
        assert_eq!(store.sizes().order, 1);
    }

    #[test]
    fn test_insert_blocked_by_unreclaimed_expired_key() {
        let (store, clock) = manual_store();
        store.insert(1, "a".into(), Ttl::millis(10));
        clock.advance(Duration::from_millis(20));

        assert!(!store.insert(1, "b".into(), Ttl::Never));
        // A lookup notices the expiry and frees the key
        assert_eq!(store.get(&1), None);
        assert!(store.insert(1, "b".into(), Ttl::Never));
    }

    #[test]
    fn test_lazy_expiry_on_get() {
        let (store, clock) = manual_store();
        store.insert(1, "a".into(), Ttl::millis(50));

        clock.advance(Duration::from_millis(50));
        assert_eq!(store.get(&1), Some("a".to_string()));

        clock.advance(Duration::from_millis(1));
        assert!(!store.contains_key(&1));
        assert_eq!(store.len(), 1);
        assert_eq!(store.get(&1), None);
        assert_eq!(store.len(), 0);
        assert_eq!(store.stats().expired, 1);
        store.assert_consistent();
    }

    #[test]
    fn test_update_reinserts_at_tail() {
        let (store, clock) = manual_store();
        fill(&store, &clock, 3);

        clock.advance(Duration::from_millis(1));
        assert!(store.update(&1, "new".into(), TtlPolicy::KeepExisting));
        assert_eq!(store.get(&1), Some("new".to_string()));
        assert_eq!(keys(&store.get_by_order(3, true)), vec![2, 3, 1]);

        // Old record stays in the secondary indices until reclaimed
        let sizes = store.sizes();
        assert_eq!(sizes.lookup, 3);
        assert_eq!(sizes.order, 4);
        assert_eq!(sizes.tombstoned, 1);
        store.assert_consistent();
    }

    #[test]
    fn test_update_missing_key() {
        let (store, _) = manual_store();
        assert!(!store.update(&9, "x".into(), TtlPolicy::KeepExisting));
        assert_eq!(store.sizes(), IndexSizes::default());
    }

    #[test]
    fn test_update_keep_existing_rebases_ttl() {
        let (store, clock) = manual_store();
        store.insert(1, "a".into(), Ttl::millis(10));

        clock.advance(Duration::from_millis(8));
        assert!(store.update(&1, "b".into(), TtlPolicy::KeepExisting));

        let view = store.get_by_order(1, true).pop().unwrap();
        assert_eq!(view.inserted_at, ms(8));
        assert_eq!(view.expires_at, Some(ms(18)));

        // Past the original deadline, still alive
        clock.advance(Duration::from_millis(5));
        assert_eq!(store.get(&1), Some("b".to_string()));
    }

    #[test]
    fn test_update_explicit_ttl() {
        let (store, clock) = manual_store();
        store.insert(1, "a".into(), Ttl::millis(10));
        assert!(store.update(&1, "b".into(), TtlPolicy::Explicit(Ttl::Never)));

        clock.advance(Duration::from_secs(3600));
        assert_eq!(store.get(&1), Some("b".to_string()));
    }

    #[test]
    fn test_erase_by_key_is_lazy() {
        let (store, clock) = manual_store();
        fill(&store, &clock, 2);

        assert!(store.erase_by_key(&1));
        assert!(!store.erase_by_key(&1));
        assert_eq!(store.get(&1), None);

        let sizes = store.sizes();
        assert_eq!(sizes.lookup, 1);
        assert_eq!(sizes.order, 2);
        assert_eq!(sizes.expiry, 2);
        store.assert_consistent();
    }

    #[test]
    fn test_erase_by_time_range() {
        let (store, clock) = manual_store();
        fill(&store, &clock, 5);

        assert_eq!(store.erase_by_time_range(ms(2), ms(4)), 3);
        for key in [2, 3, 4] {
            assert_eq!(store.get(&key), None);
        }
        assert_eq!(store.get(&1), Some("v1".to_string()));
        assert_eq!(store.get(&5), Some("v5".to_string()));

        // Already erased records are not counted again
        assert_eq!(store.erase_by_time_range(ms(2), ms(4)), 0);
        store.assert_consistent();
    }

    #[test]
    fn test_erase_by_time_range_inverted() {
        let (store, clock) = manual_store();
        fill(&store, &clock, 3);
        assert_eq!(store.erase_by_time_range(ms(3), ms(1)), 0);
        assert_eq!(store.len(), 3);
    }

    #[test]
    fn test_erase_by_time_range_spares_successor() {
        let (store, clock) = manual_store();
        fill(&store, &clock, 2);

        clock.advance(Duration::from_millis(10));
        store.update(&1, "newer".into(), TtlPolicy::KeepExisting);

        // Only the superseded version of key 1 lies in this range
        assert_eq!(store.erase_by_time_range(ms(1), ms(1)), 0);
        assert_eq!(store.get(&1), Some("newer".to_string()));
        store.assert_consistent();
    }

    #[test]
    fn test_erase_by_order() {
        let (store, clock) = manual_store();
        fill(&store, &clock, 5);

        assert_eq!(store.erase_by_order(2, true), 2);
        assert_eq!(keys(&store.get_by_order(10, true)), vec![3, 4, 5]);

        assert_eq!(store.erase_by_order(1, false), 1);
        assert_eq!(keys(&store.get_by_order(10, true)), vec![3, 4]);

        assert_eq!(store.erase_by_order(10, true), 2);
        assert!(store.is_empty());
        assert_eq!(store.erase_by_order(10, true), 0);
        store.assert_consistent();
    }

    #[test]
    fn test_erase_by_order_skips_dead() {
        let (store, clock) = manual_store();
        fill(&store, &clock, 4);
        store.erase_by_key(&1);
        store.erase_by_key(&2);

        assert_eq!(store.erase_by_order(1, true), 1);
        assert_eq!(store.get(&3), None);
        assert_eq!(store.get(&4), Some("v4".to_string()));
        assert_eq!(store.erase_by_order(0, true), 0);
    }

    #[test]
    fn test_get_by_order() {
        let (store, clock) = manual_store();
        fill(&store, &clock, 5);

        assert_eq!(keys(&store.get_by_order(3, true)), vec![1, 2, 3]);
        assert_eq!(keys(&store.get_by_order(2, false)), vec![5, 4]);
        assert_eq!(keys(&store.get_by_order(10, true)), vec![1, 2, 3, 4, 5]);
        assert!(store.get_by_order(0, true).is_empty());
    }

    #[test]
    fn test_get_by_order_skips_dead_without_mutating() {
        let (store, clock) = manual_store();
        store.insert(1, "a".into(), Ttl::millis(1));
        clock.advance(Duration::from_millis(1));
        store.insert(2, "b".into(), Ttl::Never);
        clock.advance(Duration::from_millis(5));

        assert_eq!(keys(&store.get_by_order(2, true)), vec![2]);
        // Pure read: the expired key is still in the lookup table
        assert_eq!(store.len(), 2);
    }

    #[test]
    fn test_get_by_time_range() {
        let (store, clock) = manual_store();
        fill(&store, &clock, 5);

        assert_eq!(keys(&store.get_by_time_range(ms(2), ms(4), true)), vec![2, 3, 4]);
        assert_eq!(keys(&store.get_by_time_range(ms(2), ms(4), false)), vec![4, 3, 2]);
        assert!(store.get_by_time_range(ms(4), ms(2), true).is_empty());

        store.erase_by_key(&3);
        assert_eq!(keys(&store.get_by_time_range(ms(0), ms(10), true)), vec![1, 2, 4, 5]);
    }

    #[test]
    fn test_backwards_clock_keeps_order_sorted() {
        let (store, clock) = manual_store();
        clock.advance(Duration::from_millis(10));
        store.insert(1, "a".into(), Ttl::Never);

        clock.set(t0());
        store.insert(2, "b".into(), Ttl::Never);

        let views = store.get_by_order(2, true);
        assert_eq!(keys(&views), vec![1, 2]);
        assert_eq!(views[1].inserted_at, ms(10));
        store.assert_consistent();
    }

    #[test]
    fn test_trim_pops_expired_top() {
        let (store, clock) = manual_store();
        store.insert(1, "a".into(), Ttl::millis(5));
        store.insert(2, "b".into(), Ttl::millis(10));
        store.insert(3, "c".into(), Ttl::Never);

        clock.advance(Duration::from_millis(6));
        assert_eq!(store.trim_expired(), 1);

        let sizes = store.sizes();
        assert_eq!(sizes.lookup, 2);
        assert_eq!(sizes.expiry, 2);
        assert_eq!(sizes.order, 2);
        assert_eq!(sizes.arena, 2);
        store.assert_consistent();
    }

    #[test]
    fn test_trim_leaves_buried_tombstones() {
        let (store, clock) = manual_store();
        store.insert(1, "a".into(), Ttl::millis(100));
        clock.advance(Duration::from_millis(1));
        store.insert(2, "b".into(), Ttl::millis(200));
        clock.advance(Duration::from_millis(1));
        store.insert(3, "c".into(), Ttl::millis(300));

        // Key 2 is dead but sits behind a live heap top and away from both ends
        store.erase_by_key(&2);
        assert_eq!(store.trim_expired(), 0);
        assert_eq!(store.sizes().tombstoned, 1);

        assert_eq!(store.full_sweep(), 1);
        assert_eq!(store.sizes().tombstoned, 0);
        store.assert_consistent();
    }

    #[test]
    fn test_trim_compacts_order_ends() {
        let (store, clock) = manual_store();
        fill(&store, &clock, 5);
        store.erase_by_order(2, true);
        store.erase_by_order(1, false);

        // Erased keys 1 and 2 head the heap and the order index and are
        // freed; key 5 leaves the order tail but is still held by the heap
        assert_eq!(store.trim_expired(), 2);
        let sizes = store.sizes();
        assert_eq!(sizes.order, 2);
        assert_eq!(sizes.expiry, 3);
        assert_eq!(sizes.arena, 3);
        assert_eq!(keys(&store.get_by_order(10, true)), vec![3, 4]);
        store.assert_consistent();
    }

    #[test]
    fn test_full_sweep_drops_everything_dead() {
        let (store, clock) = manual_store();
        for key in 0..10 {
            let ttl = if key % 2 == 0 { Ttl::millis(5) } else { Ttl::Never };
            store.insert(key, format!("v{key}"), ttl);
        }
        store.update(&1, "x".into(), TtlPolicy::KeepExisting);
        store.erase_by_key(&3);

        clock.advance(Duration::from_millis(10));
        let freed = store.full_sweep();
        // five expired, one superseded, one erased
        assert_eq!(freed, 7);

        let sizes = store.sizes();
        assert_eq!(sizes.lookup, 4);
        assert_eq!(sizes.expiry, 4);
        assert_eq!(sizes.order, 4);
        assert_eq!(sizes.arena, 4);
        assert_eq!(sizes.tombstoned, 0);
        assert_eq!(store.stale_ratio(), 0.0);
        store.assert_consistent();
    }

    #[test]
    fn test_stale_ratio() {
        let (store, clock) = manual_store();
        assert_eq!(store.stale_ratio(), 0.0);
        fill(&store, &clock, 4);
        store.erase_by_key(&1);
        assert_eq!(store.stale_ratio(), 0.25);
    }

    #[test]
    fn test_clear_drops_everything() {
        let (store, clock) = manual_store();
        fill(&store, &clock, 3);
        assert_eq!(store.clear(), 3);
        assert_eq!(store.sizes(), IndexSizes::default());
        assert!(store.get_by_order(10, true).is_empty());
        assert!(store.insert(1, "again".into(), Ttl::Never));
    }

    #[test]
    fn test_rejects_invalid_config() {
        let config = StoreConfig::default().with_full_sweep_every(0);
        assert!(Store::<u32, u32>::with_config(config).is_err());
    }

    #[test]
    fn test_concurrent_writers_stay_consistent() {
        let store = Arc::new(Store::<u64, u64>::new());

        std::thread::scope(|s| {
            for t in 0..4u64 {
                let store = &store;
                s.spawn(move || {
                    for i in 0..500u64 {
                        let key = (t * 500 + i) % 700;
                        store.insert(key, i, Ttl::millis(i % 7));
                        store.update(&key, i + 1, TtlPolicy::KeepExisting);
                        if i % 5 == 0 {
                            store.erase_by_key(&key);
                        }
                        if i % 50 == 0 {
                            store.trim_expired();
                        }
                    }
                });
            }
        });

        store.assert_consistent();
        store.full_sweep();
        store.assert_consistent();
        assert_eq!(store.sizes().tombstoned, 0);
    }

    #[test]
    fn test_from_iter_keeps_order_and_first_duplicate() {
        let store: Store<u32, String> = [(3, "c"), (1, "a"), (3, "dup"), (2, "b")]
            .into_iter()
            .map(|(key, value)| (key, value.to_string()))
            .collect();

        assert_eq!(keys(&store.get_by_order(10, true)), vec![3, 1, 2]);
        assert_eq!(store.get(&3), Some("c".to_string()));
        assert_eq!(store.sizes().order, 3);
        assert!(store
            .get_by_order(10, true)
            .iter()
            .all(|view| view.expires_at.is_none()));
        store.assert_consistent();
    }

    #[test]
    fn test_extend_skips_present_keys() {
        let (mut store, clock) = manual_store();
        fill(&store, &clock, 2);

        store.extend([(2, "x".to_string()), (5, "e".to_string())]);
        assert_eq!(store.get(&2), Some("v2".to_string()));
        assert_eq!(keys(&store.get_by_order(10, true)), vec![1, 2, 5]);
        store.assert_consistent();
    }

    #[test]
    fn test_huge_ttl_never_expires() {
        let (store, clock) = manual_store();
        assert!(store.insert(1, "a".into(), Ttl::After(Duration::MAX)));
        store.insert(2, "b".into(), Ttl::millis(10));
        assert!(store.update(&2, "c".into(), TtlPolicy::Explicit(Ttl::After(Duration::MAX))));

        clock.advance(Duration::from_secs(86_400 * 365 * 100));
        assert_eq!(store.get(&1), Some("a".to_string()));
        assert_eq!(store.get(&2), Some("c".to_string()));
        assert!(store.update(&1, "z".into(), TtlPolicy::KeepExisting));
        assert_eq!(store.get(&1), Some("z".to_string()));

        assert_eq!(store.full_sweep(), 2);
        assert_eq!(store.len(), 2);
        store.assert_consistent();
    }

    #[test]
    fn test_update_keep_existing_on_absolute_deadline() {
        let (store, clock) = manual_store();
        store.insert(1, "a".into(), Ttl::At(ms(30)));
        store.insert(2, "b".into(), Ttl::At(ms(10)));

        clock.advance(Duration::from_millis(5));
        assert!(store.update(&1, "a2".into(), TtlPolicy::KeepExisting));
        let view = store.get_by_order(1, false).pop().unwrap();
        assert_eq!(view.inserted_at, ms(5));
        assert_eq!(view.expires_at, Some(ms(35)));

        // Still live past the old absolute deadline
        clock.advance(Duration::from_millis(30));
        assert_eq!(store.get(&1), Some("a2".to_string()));
        clock.advance(Duration::from_millis(1));
        assert_eq!(store.get(&1), None);

        // A deadline already passed at insert time leaves a zero interval
        store.insert(3, "c".into(), Ttl::At(ms(20)));
        assert!(store.update(&3, "c2".into(), TtlPolicy::KeepExisting));
        let view = store.get_by_order(1, false).pop().unwrap();
        assert_eq!(view.expires_at, Some(view.inserted_at));
    }

    #[test]
    fn test_liveness_judged_after_lock_wait() {
        let (store, clock) = manual_store();
        store.insert(1, "a".into(), Ttl::millis(10));

        let guard = store.lock();
        std::thread::scope(|s| {
            let reader = s.spawn(|| store.get(&1));
            // The deadline passes while the reader waits for the lock
            clock.advance(Duration::from_millis(11));
            drop(guard);
            assert_eq!(reader.join().unwrap(), None);
        });
        assert_eq!(store.stats().expired, 1);
    }
}
