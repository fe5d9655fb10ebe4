//! Store Handle
//!
//! [`TtlMap`] bundles a shared [`Store`] with the [`Reclaimer`] that serves
//! it, and owns the shutdown order: stop the reclaimer, wait for it, then
//! drop every record.

use crate::config::StoreConfig;
use crate::error::Result;
use crate::storage::clock::{ClockSource, SystemClock};
use crate::storage::engine::Store;
use crate::storage::reclaimer::{Reclaimer, TickReport};
use std::hash::Hash;
use std::ops::Deref;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::info;

/// A store with a running background reclaimer.
///
/// Dereferences to [`Store`], so every store operation is available directly.
///
/// # Example
///
/// ```
/// use chronokv::{StoreConfig, TtlMap, Ttl};
///
/// #[tokio::main]
/// async fn main() -> chronokv::Result<()> {
///     let map = TtlMap::start(StoreConfig::default())?;
///     map.insert(1u32, "one", Ttl::millis(500));
///     assert_eq!(map.get(&1), Some("one"));
///
///     let dropped = map.shutdown().await?;
///     assert_eq!(dropped, 1);
///     Ok(())
/// }
/// ```
#[derive(Debug)]
pub struct TtlMap<K, V> {
    store: Arc<Store<K, V>>,
    reclaimer: Reclaimer,
}

impl<K, V> TtlMap<K, V>
where
    K: Eq + Hash + Clone + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    /// Creates a store and starts its reclaimer.
    ///
    /// # Panics
    ///
    /// Panics if called outside of a Tokio runtime.
    pub fn start(config: StoreConfig) -> Result<Self> {
        Self::with_clock(config, Arc::new(SystemClock))
    }

    /// Like [`start`](Self::start), reading time from `clock`.
    pub fn with_clock(config: StoreConfig, clock: Arc<dyn ClockSource>) -> Result<Self> {
        let store = Arc::new(Store::with_clock(config, clock)?);
        let reclaimer = Reclaimer::start(Arc::clone(&store));
        Ok(Self { store, reclaimer })
    }

    /// The shared store, for handing to worker threads.
    pub fn store(&self) -> &Arc<Store<K, V>> {
        &self.store
    }

    /// Receives a [`TickReport`] after every reclaimer tick.
    pub fn subscribe(&self) -> watch::Receiver<TickReport> {
        self.reclaimer.subscribe()
    }

    /// Stops and joins the reclaimer, then drops every record.
    ///
    /// Operations racing with shutdown on other clones of the store either
    /// finish before the records are dropped or see an empty store.
    /// Returns the number of keys that were still present.
    pub async fn shutdown(self) -> Result<usize> {
        self.reclaimer.shutdown().await?;
        let dropped = self.store.clear();
        info!(dropped, "Store shut down");
        Ok(dropped)
    }
}

impl<K, V> Deref for TtlMap<K, V> {
    type Target = Store<K, V>;

    fn deref(&self) -> &Self::Target {
        &self.store
    }
}
