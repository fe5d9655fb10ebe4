//! Error Types
//!
//! Store operations never fail: a missing key, a duplicate insert, or an
//! inverted time range are reported through `bool`, `Option`, or a zero
//! count. Errors only surface at the edges - building a store from a bad
//! configuration, or joining a background reclaimer that did not finish
//! cleanly.

use thiserror::Error;

/// Result type used by fallible ChronoKV entry points.
pub type Result<T> = std::result::Result<T, StoreError>;

/// Errors that can occur while configuring or shutting down a store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// A configuration value is out of range
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// The reclaimer task panicked or was aborted before it could be joined
    #[error("reclaimer task did not complete: {0}")]
    ReclaimerPanicked(#[from] tokio::task::JoinError),
}
