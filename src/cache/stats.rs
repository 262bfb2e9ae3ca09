//! Cache Statistics Module
//!
//! Tracks cache performance metrics including hits, misses, puts, removals
//! and expiries. Counters are recorded only while the owning configuration
//! has statistics enabled.

use serde::Serialize;

// == Cache Stats ==
/// Tracks cache performance metrics.
#[derive(Debug, Clone, Default, Serialize)]
pub struct CacheStats {
    /// Number of reads that found a live entry
    pub hits: u64,
    /// Number of reads that found nothing (absent or expired)
    pub misses: u64,
    /// Number of entries written (creations and updates)
    pub puts: u64,
    /// Number of entries removed by explicit operations
    pub removals: u64,
    /// Number of entries removed by expiry sweeps
    pub expiries: u64,
    /// Current number of live entries in the cache
    pub total_entries: usize,
}

impl CacheStats {
    // == Constructor ==
    /// Creates a new CacheStats with all counters at zero.
    pub fn new() -> Self {
        Self::default()
    }

    // == Hit Rate ==
    /// Calculates the cache hit rate.
    ///
    /// Returns hits / (hits + misses), or 0.0 if no reads have been made.
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }

    // == Recorders ==
    /// Increments the hit counter.
    pub fn record_hit(&mut self) {
        self.hits += 1;
    }

    /// Increments the miss counter.
    pub fn record_miss(&mut self) {
        self.misses += 1;
    }

    /// Increments the put counter.
    pub fn record_put(&mut self) {
        self.puts += 1;
    }

    /// Increments the removal counter.
    pub fn record_removal(&mut self) {
        self.removals += 1;
    }

    /// Adds to the expiry counter.
    pub fn record_expiries(&mut self, count: u64) {
        self.expiries += count;
    }

    // == Update Entry Count ==
    /// Updates the total entries count.
    pub fn set_total_entries(&mut self, count: usize) {
        self.total_entries = count;
    }
}
