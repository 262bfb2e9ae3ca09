//! Embercache - An in-process key/value cache engine
//!
//! Provides named caches with pluggable per-operation expiry, atomic
//! compound operations via entry processors, and synchronous/asynchronous
//! entry-event listeners.

pub mod backing;
pub mod cache;
pub mod config;
pub mod error;
pub mod event;
pub mod expiry;
pub mod manager;
pub mod processor;
pub mod tasks;

pub use backing::{CacheLoader, CacheWriter};
pub use cache::{Cache, CacheStats, EntryIterator};
pub use config::Configuration;
pub use error::{CacheError, DynError, Result};
pub use event::{
    CacheEntryEvent, CacheEntryEventFilter, CacheEntryListener, EventType, ListenerConfiguration,
};
pub use expiry::{Duration, ExpiryType, TimeUnit};
pub use manager::CacheManager;
pub use processor::{EntryProcessor, MutableEntry};
pub use tasks::spawn_sweep_task;
