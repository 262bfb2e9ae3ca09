//! Error types for the cache engine
//!
//! Provides unified error handling using thiserror.

use thiserror::Error;

/// Boxed error type carried by user-supplied listener, filter, processor,
/// loader and writer code.
pub type DynError = Box<dyn std::error::Error + Send + Sync + 'static>;

// == Cache Error Enum ==
/// Unified error type for the cache engine.
#[derive(Error, Debug)]
pub enum CacheError {
    /// Duration construction rejected (negative amount, zero amount,
    /// sub-millisecond unit)
    #[error("Invalid duration: {0}")]
    InvalidDuration(String),

    /// Operation not legal in the current state (duplicate listener
    /// registration, cache name collision, closed cache)
    #[error("Illegal state: {0}")]
    IllegalState(String),

    /// A synchronous entry listener or event filter failed
    #[error("Cache entry listener failed")]
    EntryListener(#[source] DynError),

    /// An entry processor failed; the entry is left unmodified
    #[error("Entry processor failed")]
    EntryProcessor(#[source] DynError),

    /// The read-through cache loader failed
    #[error("Cache loader failed")]
    Loader(#[source] DynError),

    /// The write-through cache writer failed
    #[error("Cache writer failed")]
    Writer(#[source] DynError),
}

impl CacheError {
    /// Shorthand for the closed-cache illegal state.
    pub(crate) fn closed(name: &str) -> Self {
        CacheError::IllegalState(format!("Cache '{}' is closed", name))
    }
}

// == Result Type Alias ==
/// Convenience Result type for the cache engine.
pub type Result<T> = std::result::Result<T, CacheError>;
