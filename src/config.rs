//! Store Configuration
//!
//! Tunables for the background reclaimer. Everything is supplied by the
//! caller at construction time; there are no process-wide constants.

use crate::error::{Result, StoreError};
use std::time::Duration;

/// Default interval between reclaimer ticks.
pub const DEFAULT_RECLAIM_INTERVAL: Duration = Duration::from_millis(5);

/// Default number of ticks between two full sweeps.
pub const DEFAULT_FULL_SWEEP_EVERY: u32 = 100;

/// Default fraction of tombstoned records that forces an early full sweep.
pub const DEFAULT_STALE_RATIO_THRESHOLD: f64 = 0.5;

/// Configuration for a store and its reclaimer.
///
/// # Example
///
/// ```
/// use chronokv::StoreConfig;
/// use std::time::Duration;
///
/// let config = StoreConfig::default()
///     .with_reclaim_interval(Duration::from_millis(10))
///     .with_full_sweep_every(50);
/// assert!(config.validate().is_ok());
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct StoreConfig {
    /// Interval between reclaimer ticks (default: 5ms)
    pub reclaim_interval: Duration,

    /// Run a full sweep once this many ticks have passed since the last one (default: 100)
    pub full_sweep_every: u32,

    /// Run a full sweep early once this fraction of resident records is tombstoned (default: 0.5)
    pub stale_ratio_threshold: f64,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            reclaim_interval: DEFAULT_RECLAIM_INTERVAL,
            full_sweep_every: DEFAULT_FULL_SWEEP_EVERY,
            stale_ratio_threshold: DEFAULT_STALE_RATIO_THRESHOLD,
        }
    }
}

impl StoreConfig {
    /// Creates a configuration with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the interval between reclaimer ticks.
    pub fn with_reclaim_interval(mut self, interval: Duration) -> Self {
        self.reclaim_interval = interval;
        self
    }

    /// Sets how many ticks pass between full sweeps.
    pub fn with_full_sweep_every(mut self, ticks: u32) -> Self {
        self.full_sweep_every = ticks;
        self
    }

    /// Sets the tombstone ratio that triggers an early full sweep.
    pub fn with_stale_ratio_threshold(mut self, ratio: f64) -> Self {
        self.stale_ratio_threshold = ratio;
        self
    }

    /// Checks that every value is usable.
    pub fn validate(&self) -> Result<()> {
        if self.reclaim_interval.is_zero() {
            return Err(StoreError::InvalidConfig(
                "reclaim_interval must be non-zero".into(),
            ));
        }
        if self.full_sweep_every == 0 {
            return Err(StoreError::InvalidConfig(
                "full_sweep_every must be at least 1".into(),
            ));
        }
        if !(self.stale_ratio_threshold > 0.0 && self.stale_ratio_threshold <= 1.0) {
            return Err(StoreError::InvalidConfig(format!(
                "stale_ratio_threshold must be in (0, 1], got {}",
                self.stale_ratio_threshold
            )));
        }
        Ok(())
    }
}
