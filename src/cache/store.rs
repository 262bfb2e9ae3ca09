//! Entry Store Module
//!
//! The key-to-entry map underneath a cache, with the absent / present /
//! expired visibility rules and the statistics the operations record.
//!
//! Entries past their deadline are logically absent: any lookup observing
//! one drops it silently. Expired events are not produced here; sweeps
//! collect expired entries through [`EntryStore::drain_expired`] and the
//! cache dispatches for them.

use std::collections::HashMap;
use std::hash::Hash;
use std::sync::Arc;

use crate::cache::entry::Entry;
use crate::cache::stats::CacheStats;

// == Entry Store ==
/// Map of live entries plus the statistics counters.
///
/// All methods take `&mut self`; the owning cache serializes access through
/// its store lock.
#[derive(Debug)]
pub(crate) struct EntryStore<K, V> {
    entries: HashMap<K, Entry<V>>,
    stats: CacheStats,
}

impl<K, V> EntryStore<K, V>
where
    K: Eq + Hash + Clone,
{
    // == Constructor ==
    pub(crate) fn new() -> Self {
        Self {
            entries: HashMap::new(),
            stats: CacheStats::new(),
        }
    }

    // == Lookups ==
    /// The live entry for `key` at `now`, dropping it silently if it sits
    /// past its deadline.
    pub(crate) fn live_entry(&mut self, key: &K, now: u64) -> Option<&mut Entry<V>> {
        if let Some(entry) = self.entries.get(key) {
            if entry.is_expired_at(now) {
                self.entries.remove(key);
                return None;
            }
        }
        self.entries.get_mut(key)
    }

    /// Visibility check without any side effect: no expired-entry drop, no
    /// deadline touch. Used by `contains_key`, which is defined as not
    /// being a read.
    pub(crate) fn is_visible(&self, key: &K, now: u64) -> bool {
        self.entries
            .get(key)
            .map(|entry| !entry.is_expired_at(now))
            .unwrap_or(false)
    }

    // == Mutations ==
    /// Installs a fresh entry for `key`. The caller has already established
    /// that no live entry exists.
    pub(crate) fn insert(&mut self, key: K, value: Arc<V>, now: u64, expires_at: Option<u64>) {
        self.entries.insert(key, Entry::new(value, now, expires_at));
    }

    /// Removes the entry for `key`, returning its value.
    pub(crate) fn remove(&mut self, key: &K) -> Option<Arc<V>> {
        self.entries.remove(key).map(|entry| entry.value)
    }

    /// Removes every entry. Clear is an administrative reset; nothing is
    /// recorded and no values are returned.
    pub(crate) fn clear(&mut self) {
        self.entries.clear();
    }

    /// Removes and returns every entry past its deadline at `now`.
    pub(crate) fn drain_expired(&mut self, now: u64) -> Vec<(K, Arc<V>)> {
        let expired_keys: Vec<K> = self
            .entries
            .iter()
            .filter(|(_, entry)| entry.is_expired_at(now))
            .map(|(key, _)| key.clone())
            .collect();

        expired_keys
            .into_iter()
            .filter_map(|key| self.entries.remove(&key).map(|entry| (key, entry.value)))
            .collect()
    }

    // == Snapshots ==
    /// Keys of every live entry at `now`, for iteration.
    pub(crate) fn live_keys(&self, now: u64) -> Vec<K> {
        self.entries
            .iter()
            .filter(|(_, entry)| !entry.is_expired_at(now))
            .map(|(key, _)| key.clone())
            .collect()
    }

    /// Number of live entries at `now`.
    pub(crate) fn live_len(&self, now: u64) -> usize {
        self.entries
            .values()
            .filter(|entry| !entry.is_expired_at(now))
            .count()
    }

    // == Stats ==
    pub(crate) fn stats_mut(&mut self) -> &mut CacheStats {
        &mut self.stats
    }

    /// Snapshot of the counters with the live entry count filled in.
    pub(crate) fn stats_snapshot(&self, now: u64) -> CacheStats {
        let mut stats = self.stats.clone();
        stats.set_total_entries(self.live_len(now));
        stats
    }
}

// == Unit Tests ==
#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> EntryStore<String, String> {
        EntryStore::new()
    }

    fn value(s: &str) -> Arc<String> {
        Arc::new(s.to_string())
    }

    #[test]
    fn test_insert_and_live_entry() {
        let mut store = store();
        store.insert("key1".to_string(), value("value1"), 1_000, None);

        let entry = store.live_entry(&"key1".to_string(), 1_500).unwrap();
        assert_eq!(*entry.value, "value1");
        assert_eq!(store.live_len(1_500), 1);
    }

    #[test]
    fn test_live_entry_nonexistent() {
        let mut store = store();
        assert!(store.live_entry(&"nope".to_string(), 1_000).is_none());
    }

    #[test]
    fn test_expired_entry_is_dropped_on_lookup() {
        let mut store = store();
        store.insert("key1".to_string(), value("value1"), 1_000, Some(2_000));

        assert!(store.live_entry(&"key1".to_string(), 2_000).is_none());
        // gone, not just hidden
        assert_eq!(store.live_len(0), 0);
    }

    #[test]
    fn test_is_visible_has_no_side_effects() {
        let mut store = store();
        store.insert("key1".to_string(), value("value1"), 1_000, Some(2_000));

        assert!(store.is_visible(&"key1".to_string(), 1_500));
        assert!(!store.is_visible(&"key1".to_string(), 2_000));
        // the expired entry is still physically present until a lookup or
        // sweep reaps it
        assert_eq!(store.live_keys(1_500).len(), 1);
    }

    #[test]
    fn test_remove() {
        let mut store = store();
        store.insert("key1".to_string(), value("value1"), 1_000, None);

        let removed = store.remove(&"key1".to_string()).unwrap();
        assert_eq!(*removed, "value1");
        assert!(store.remove(&"key1".to_string()).is_none());
    }

    #[test]
    fn test_clear() {
        let mut store = store();
        store.insert("key1".to_string(), value("value1"), 1_000, None);
        store.insert("key2".to_string(), value("value2"), 1_000, None);

        store.clear();
        assert_eq!(store.live_len(1_000), 0);
    }

    #[test]
    fn test_drain_expired() {
        let mut store = store();
        store.insert("key1".to_string(), value("value1"), 1_000, Some(2_000));
        store.insert("key2".to_string(), value("value2"), 1_000, Some(9_000));
        store.insert("key3".to_string(), value("value3"), 1_000, None);

        let mut drained = store.drain_expired(2_500);
        drained.sort_by(|a, b| a.0.cmp(&b.0));
        assert_eq!(drained.len(), 1);
        assert_eq!(drained[0].0, "key1");
        assert_eq!(store.live_len(2_500), 2);
    }

    #[test]
    fn test_stats_snapshot_counts_live_entries() {
        let mut store = store();
        store.insert("key1".to_string(), value("value1"), 1_000, Some(2_000));
        store.insert("key2".to_string(), value("value2"), 1_000, None);
        store.stats_mut().record_hit();

        let stats = store.stats_snapshot(2_500);
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.total_entries, 1);
    }
}
