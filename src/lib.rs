//! # ChronoKV - A Thread-Safe In-Memory TTL Store
//!
//! ChronoKV is an in-memory key-value store where every entry can carry a
//! time-to-live. Besides lookups by key, it answers "the N oldest/newest
//! entries" and "everything inserted between T1 and T2" queries, which makes
//! it a fit for session stores, rate-limit windows, and sliding-window caches.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                              ChronoKV                                   │
//! │                                                                         │
//! │  ┌─────────────┐    ┌──────────────────────────────────────────────┐    │
//! │  │  Worker     │───>│                  Store                       │    │
//! │  │  threads    │    │  ┌──────────┐ ┌──────────┐ ┌──────────────┐  │    │
//! │  └─────────────┘    │  │ Lookup   │ │ Expiry   │ │ Order        │  │    │
//! │                     │  │ table    │ │ heap     │ │ index        │  │    │
//! │                     │  └──────────┘ └──────────┘ └──────────────┘  │    │
//! │                     │          one Mutex, one record arena         │    │
//! │                     └──────────────────────────────────────────────┘    │
//! │                                               ▲                         │
//! │                                               │                         │
//! │                     ┌─────────────────────────┴───────────────────────┐ │
//! │                     │              Reclaimer                          │ │
//! │                     │      (Background Tokio Task)                    │ │
//! │                     └─────────────────────────────────────────────────┘ │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```
//! use chronokv::{StoreConfig, TtlMap, TtlPolicy, Ttl};
//! use std::time::Duration;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let map = TtlMap::start(StoreConfig::default())?;
//!
//!     map.insert("session:1", "alice", Ttl::After(Duration::from_secs(30)));
//!     map.update(&"session:1", "alice-2", TtlPolicy::KeepExisting);
//!     assert_eq!(map.get(&"session:1"), Some("alice-2"));
//!
//!     let oldest = map.get_by_order(10, true);
//!     assert_eq!(oldest.len(), 1);
//!
//!     map.shutdown().await?;
//!     Ok(())
//! }
//! ```
//!
//! ## Module Overview
//!
//! - [`storage`]: the store, its indices, and the reclaimer
//! - [`config`]: reclaimer cadence and sweep thresholds
//! - [`error`]: error type for configuration and shutdown
//!
//! ## Design Highlights
//!
//! ### One Lock, Three Indices
//!
//! A single mutex guards the lookup table, the expiry heap, and the order
//! index together. They can never disagree about which keys exist.
//!
//! ### Lazy + Active Expiry
//!
//! Expired and erased records are reclaimed in two ways:
//! 1. **Lazy**: a lookup that finds an expired key removes it
//! 2. **Active**: the reclaimer trims the top of the expiry heap every tick
//!    and rebuilds all indices on a slower cadence
//!
//! ### Snapshot Reads
//!
//! Range and order queries copy record handles while holding the lock and
//! filter them afterwards, so large scans do not block writers.

pub mod config;
pub mod error;
pub mod storage;

// Re-export commonly used types for convenience
pub use config::StoreConfig;
pub use error::{Result, StoreError};
pub use storage::{
    IndexSizes, ManualClock, RecordView, Reclaimer, Store, Timestamp, TtlMap, Ttl, TtlPolicy,
};

/// Version of ChronoKV
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
