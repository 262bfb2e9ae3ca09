//! Backing Store Module
//!
//! Traits a cache consumes when read-through or write-through is enabled.
//! Loads and writes run synchronously inline with the triggering operation;
//! failures propagate to that operation's caller as loader/writer failures.

use crate::error::DynError;

// == Cache Loader ==
/// Supplies values for read-through misses.
pub trait CacheLoader<K, V>: Send + Sync {
    /// Loads the value for `key`, or `Ok(None)` when the backing store has
    /// nothing for it.
    fn load(&self, key: &K) -> Result<Option<V>, DynError>;
}

// == Cache Writer ==
/// Mirrors mutations to a backing store for write-through.
pub trait CacheWriter<K, V>: Send + Sync {
    /// Writes `value` under `key` before the cache commits the mutation.
    fn write(&self, key: &K, value: &V) -> Result<(), DynError>;

    /// Deletes `key` before the cache commits the removal.
    fn delete(&self, key: &K) -> Result<(), DynError>;
}
