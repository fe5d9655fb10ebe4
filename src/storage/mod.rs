//! Storage Module
//!
//! This module provides the core storage functionality for ChronoKV: a
//! thread-safe key-value store with per-entry TTL, time-ordered queries,
//! and a background reclaimer.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                          Store                              │
//! │   ┌─────────────┐  ┌─────────────┐  ┌─────────────┐         │
//! │   │ LookupTable │  │ ExpiryIndex │  │ OrderIndex  │         │
//! │   └─────────────┘  └─────────────┘  └─────────────┘         │
//! │                  all behind one Mutex                       │
//! └─────────────────────────────────────────────────────────────┘
//!                            ▲
//!                            │
//!              ┌─────────────┴─────────────┐
//!              │        Reclaimer          │
//!              │  (Background Tokio Task)  │
//!              └───────────────────────────┘
//! ```
//!
//! ## Features
//!
//! - **TTL Support**: records expire a fixed time after insertion, or at an
//!   absolute deadline
//! - **Lazy Expiry**: expired keys are reclaimed when looked up
//! - **Active Expiry**: the reclaimer trims the expiry heap every tick and
//!   periodically rebuilds every index
//! - **Time Queries**: fetch or erase records by insertion order or by
//!   insertion-time range
//!
//! ## Example
//!
//! ```
//! use chronokv::storage::{Store, Ttl};
//! use std::time::{Duration, SystemTime};
//!
//! let store = Store::new();
//! let start = SystemTime::now();
//!
//! store.insert("a", 1, Ttl::Never);
//! store.insert("b", 2, Ttl::After(Duration::from_secs(60)));
//!
//! let newest = store.get_by_order(1, false);
//! assert_eq!(newest[0].key, "b");
//!
//! let recent = store.get_by_time_range(start, SystemTime::now(), true);
//! assert_eq!(recent.len(), 2);
//! ```

mod arena;
pub mod clock;
pub mod engine;
mod expiry;
pub mod handle;
mod lookup;
mod order;
pub mod reclaimer;
pub mod record;

// Re-export commonly used types
pub use clock::{ClockSource, ManualClock, SystemClock, Timestamp};
pub use engine::{IndexSizes, Store, StoreStats};
pub use handle::TtlMap;
pub use reclaimer::{ReclaimPass, ReclaimSchedule, Reclaimer, TickReport};
pub use record::{Record, RecordView, Ttl, TtlPolicy};
