//! Background Reclaimer
//!
//! Lookups only notice expiry for the keys they touch, and erases leave
//! stale ids behind in the expiry and order indices. The reclaimer is a
//! Tokio task that periodically compacts the store so memory is returned
//! even for keys that are never read again.
//!
//! ## Passes
//!
//! ```text
//!  Idle ──(tick)──> Reclaiming ──> Idle
//!                       │
//!          ┌────────────┴─────────────┐
//!          ▼                          ▼
//!   Incremental trim             Full sweep
//!   (pop dead heap top,          (rebuild all three
//!    compact order ends)          structures)
//! ```
//!
//! Most ticks run an incremental trim. Every `full_sweep_every` ticks, or
//! as soon as the share of tombstoned records passes
//! `stale_ratio_threshold`, a full sweep runs instead.
//!
//! ## Shutdown
//!
//! [`Reclaimer::shutdown`] signals the task and waits for it to finish, so no
//! pass can still be running once it returns.

use crate::error::Result;
use crate::storage::engine::{IndexSizes, Store};
use std::hash::Hash;
use std::sync::Arc;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, trace};

/// Which reclamation pass a tick ran.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReclaimPass {
    /// Pop dead records off the top of the expiry index
    Trim,
    /// Rebuild every structure without dead records
    FullSweep,
}

/// What one reclaimer tick did, published after every tick.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TickReport {
    /// Ticks since the reclaimer started, starting at 1
    pub tick: u64,
    pub pass: ReclaimPass,
    /// Records freed by this pass
    pub reclaimed: usize,
    /// Structure sizes after the pass
    pub sizes: IndexSizes,
}

/// Decides which pass each tick runs.
#[derive(Debug, Clone)]
pub struct ReclaimSchedule {
    full_sweep_every: u32,
    stale_ratio_threshold: f64,
    ticks_since_sweep: u32,
}

impl ReclaimSchedule {
    pub fn new(full_sweep_every: u32, stale_ratio_threshold: f64) -> Self {
        Self {
            full_sweep_every,
            stale_ratio_threshold,
            ticks_since_sweep: 0,
        }
    }

    /// Picks the pass for the next tick given the store's current stale ratio.
    pub fn next_pass(&mut self, stale_ratio: f64) -> ReclaimPass {
        if self.ticks_since_sweep >= self.full_sweep_every
            || stale_ratio > self.stale_ratio_threshold
        {
            self.ticks_since_sweep = 0;
            ReclaimPass::FullSweep
        } else {
            self.ticks_since_sweep += 1;
            ReclaimPass::Trim
        }
    }

    pub fn ticks_since_sweep(&self) -> u32 {
        self.ticks_since_sweep
    }
}

/// A handle to the running reclaimer task.
///
/// Call [`shutdown`](Self::shutdown) to stop the task and wait for it. If the
/// handle is dropped instead, the task is still told to stop but is not
/// awaited.
#[derive(Debug)]
pub struct Reclaimer {
    shutdown_tx: watch::Sender<bool>,
    report_rx: watch::Receiver<TickReport>,
    handle: Option<JoinHandle<()>>,
}

impl Reclaimer {
    /// Starts reclaiming `store` on a background task, using the store's configuration.
    ///
    /// # Panics
    ///
    /// Panics if called outside of a Tokio runtime.
    pub fn start<K, V>(store: Arc<Store<K, V>>) -> Self
    where
        K: Eq + Hash + Clone + Send + Sync + 'static,
        V: Clone + Send + Sync + 'static,
    {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let (report_tx, report_rx) = watch::channel(TickReport {
            tick: 0,
            pass: ReclaimPass::Trim,
            reclaimed: 0,
            sizes: store.sizes(),
        });

        let handle = tokio::spawn(reclaim_loop(store, shutdown_rx, report_tx));

        info!("Background reclaimer started");

        Self {
            shutdown_tx,
            report_rx,
            handle: Some(handle),
        }
    }

    /// Returns a receiver that sees the latest [`TickReport`].
    pub fn subscribe(&self) -> watch::Receiver<TickReport> {
        self.report_rx.clone()
    }

    /// Signals the task to stop and waits until it has exited.
    pub async fn shutdown(mut self) -> Result<()> {
        let _ = self.shutdown_tx.send(true);
        if let Some(handle) = self.handle.take() {
            handle.await?;
        }
        info!("Background reclaimer stopped");
        Ok(())
    }
}

impl Drop for Reclaimer {
    fn drop(&mut self) {
        if self.handle.is_some() {
            let _ = self.shutdown_tx.send(true);
            debug!("Reclaimer handle dropped without shutdown");
        }
    }
}

/// The main reclaimer loop.
async fn reclaim_loop<K, V>(
    store: Arc<Store<K, V>>,
    mut shutdown_rx: watch::Receiver<bool>,
    report_tx: watch::Sender<TickReport>,
) where
    K: Eq + Hash + Clone,
    V: Clone,
{
    let config = store.config().clone();
    let mut schedule =
        ReclaimSchedule::new(config.full_sweep_every, config.stale_ratio_threshold);
    let mut tick = 0u64;

    loop {
        tokio::select! {
            _ = tokio::time::sleep(config.reclaim_interval) => {}
            result = shutdown_rx.changed() => {
                if result.is_err() || *shutdown_rx.borrow() {
                    debug!("Reclaimer received shutdown signal");
                    return;
                }
            }
        }

        tick += 1;
        let pass = schedule.next_pass(store.stale_ratio());
        let reclaimed = match pass {
            ReclaimPass::Trim => store.trim_expired(),
            ReclaimPass::FullSweep => store.full_sweep(),
        };
        let sizes = store.sizes();

        if pass == ReclaimPass::FullSweep || reclaimed > 0 {
            debug!(
                tick,
                ?pass,
                reclaimed,
                lookup = sizes.lookup,
                expiry = sizes.expiry,
                order = sizes.order,
                "Reclaimer pass finished"
            );
        } else {
            trace!(tick, lookup = sizes.lookup, "Nothing to reclaim");
        }

        report_tx.send_replace(TickReport {
            tick,
            pass,
            reclaimed,
            sizes,
        });
    }
}
