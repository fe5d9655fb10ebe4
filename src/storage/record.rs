//! Records
//!
//! A [`Record`] is one version of one key. Its key, value and timestamps are
//! fixed at construction; the only thing that ever changes is the tombstone
//! flag, which flips from `false` to `true` exactly once.
//!
//! An update never edits a record in place. It tombstones the current record
//! and creates a fresh one with a new insert time, so every index stays
//! append-only.

use crate::storage::clock::Timestamp;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

/// How long a new record should live.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Ttl {
    /// The record never expires
    Never,
    /// The record expires this long after its insert time
    After(Duration),
    /// The record expires at an absolute point in time
    At(Timestamp),
}

impl Ttl {
    /// Shorthand for `Ttl::After(Duration::from_millis(ms))`.
    pub fn millis(ms: u64) -> Self {
        Ttl::After(Duration::from_millis(ms))
    }
}

impl From<Duration> for Ttl {
    fn from(ttl: Duration) -> Self {
        Ttl::After(ttl)
    }
}

impl From<Option<Duration>> for Ttl {
    fn from(ttl: Option<Duration>) -> Self {
        ttl.map_or(Ttl::Never, Ttl::After)
    }
}

/// How an update chooses the TTL of the replacement record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TtlPolicy {
    /// Reuse the old record's TTL interval, counted from the new insert time.
    ///
    /// This restarts the countdown; the old absolute deadline is not kept.
    KeepExisting,
    /// Use the given TTL
    Explicit(Ttl),
}

/// One version of a key-value pair.
#[derive(Debug)]
pub struct Record<K, V> {
    key: K,
    value: V,
    inserted_at: Timestamp,
    expires_at: Option<Timestamp>,
    ttl: Option<Duration>,
    tombstoned: AtomicBool,
}

impl<K, V> Record<K, V> {
    /// Creates a live record stamped with `now`.
    ///
    /// For [`Ttl::At`] the stored interval is the distance from `now` to the
    /// deadline, or zero if the deadline has already passed. A [`Ttl::After`]
    /// too long to represent as a deadline never expires but keeps its
    /// interval.
    pub fn new(key: K, value: V, ttl: Ttl, now: Timestamp) -> Self {
        let (expires_at, ttl) = match ttl {
            Ttl::Never => (None, None),
            Ttl::After(d) => (now.checked_add(d), Some(d)),
            Ttl::At(deadline) => (
                Some(deadline),
                Some(deadline.duration_since(now).unwrap_or(Duration::ZERO)),
            ),
        };

        Self {
            key,
            value,
            inserted_at: now,
            expires_at,
            ttl,
            tombstoned: AtomicBool::new(false),
        }
    }

    #[inline]
    pub fn key(&self) -> &K {
        &self.key
    }

    #[inline]
    pub fn value(&self) -> &V {
        &self.value
    }

    #[inline]
    pub fn inserted_at(&self) -> Timestamp {
        self.inserted_at
    }

    /// The expiry deadline, or `None` for records that never expire.
    #[inline]
    pub fn expires_at(&self) -> Option<Timestamp> {
        self.expires_at
    }

    /// The TTL interval this record was created with.
    #[inline]
    pub fn ttl(&self) -> Option<Duration> {
        self.ttl
    }

    /// Returns true if the record has passed its deadline at `now`.
    ///
    /// A record is still valid at exactly its deadline.
    #[inline]
    pub fn is_expired(&self, now: Timestamp) -> bool {
        self.expires_at.is_some_and(|deadline| now > deadline)
    }

    /// Returns true if the record is neither tombstoned nor expired at `now`.
    #[inline]
    pub fn is_live(&self, now: Timestamp) -> bool {
        !self.is_tombstoned() && !self.is_expired(now)
    }

    #[inline]
    pub fn is_tombstoned(&self) -> bool {
        self.tombstoned.load(Ordering::Acquire)
    }

    /// Marks the record dead. Returns true only for the call that flipped the flag.
    #[inline]
    pub fn tombstone(&self) -> bool {
        !self.tombstoned.swap(true, Ordering::AcqRel)
    }

    /// The TTL a replacement record should get under `policy`.
    pub(crate) fn successor_ttl(&self, policy: TtlPolicy) -> Ttl {
        match policy {
            TtlPolicy::Explicit(ttl) => ttl,
            TtlPolicy::KeepExisting => self.ttl.map_or(Ttl::Never, Ttl::After),
        }
    }
}

impl<K: Clone, V: Clone> Record<K, V> {
    /// Copies the record's contents out for a caller.
    pub fn view(&self) -> RecordView<K, V> {
        RecordView {
            key: self.key.clone(),
            value: self.value.clone(),
            inserted_at: self.inserted_at,
            expires_at: self.expires_at,
        }
    }
}

/// An owned snapshot of a record, returned from range and order queries.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordView<K, V> {
    pub key: K,
    pub value: V,
    pub inserted_at: Timestamp,
    /// `None` if the record never expires
    pub expires_at: Option<Timestamp>,
}
