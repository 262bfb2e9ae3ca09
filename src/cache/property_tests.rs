//! Property-Based Tests for Cache Module
//!
//! Uses proptest to verify correctness properties of the operation
//! executor against a simple model of the store.

use proptest::prelude::*;
use std::collections::HashSet;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crate::cache::Cache;
use crate::config::Configuration;
use crate::error::DynError;
use crate::event::{CacheEntryEvent, CacheEntryListener, ListenerConfiguration};

// == Strategies ==
/// Generates valid cache keys
fn key_strategy() -> impl Strategy<Value = String> {
    "[a-z]{1,4}"
}

/// Generates cache values
fn value_strategy() -> impl Strategy<Value = String> {
    "[a-zA-Z0-9 ]{1,32}"
}

/// Generates a sequence of cache operations for testing
#[derive(Debug, Clone)]
enum CacheOp {
    Put { key: String, value: String },
    Get { key: String },
    Remove { key: String },
    Replace { key: String, value: String },
}

fn cache_op_strategy() -> impl Strategy<Value = CacheOp> {
    prop_oneof![
        (key_strategy(), value_strategy()).prop_map(|(key, value)| CacheOp::Put { key, value }),
        key_strategy().prop_map(|key| CacheOp::Get { key }),
        key_strategy().prop_map(|key| CacheOp::Remove { key }),
        (key_strategy(), value_strategy())
            .prop_map(|(key, value)| CacheOp::Replace { key, value }),
    ]
}

#[derive(Default)]
struct EventCounter {
    created: AtomicU64,
    updated: AtomicU64,
    removed: AtomicU64,
}

impl CacheEntryListener<String, String> for EventCounter {
    fn on_created(&self, events: &[CacheEntryEvent<String, String>]) -> Result<(), DynError> {
        self.created.fetch_add(events.len() as u64, Ordering::SeqCst);
        Ok(())
    }

    fn on_updated(&self, events: &[CacheEntryEvent<String, String>]) -> Result<(), DynError> {
        self.updated.fetch_add(events.len() as u64, Ordering::SeqCst);
        Ok(())
    }

    fn on_removed(&self, events: &[CacheEntryEvent<String, String>]) -> Result<(), DynError> {
        self.removed.fetch_add(events.len() as u64, Ordering::SeqCst);
        Ok(())
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    // For any sequence of operations, the statistics counters reflect
    // exactly the hits, misses, puts and removals that occurred.
    #[test]
    fn prop_statistics_accuracy(ops in prop::collection::vec(cache_op_strategy(), 1..50)) {
        let cache: Cache<String, String> = Cache::new("props", Configuration::new());
        cache.configuration().set_statistics_enabled(true);

        let mut present: HashSet<String> = HashSet::new();
        let mut expected_hits: u64 = 0;
        let mut expected_misses: u64 = 0;
        let mut expected_puts: u64 = 0;
        let mut expected_removals: u64 = 0;

        for op in ops {
            match op {
                CacheOp::Put { key, value } => {
                    cache.put(key.clone(), value).unwrap();
                    present.insert(key);
                    expected_puts += 1;
                }
                CacheOp::Get { key } => {
                    let found = cache.get(&key).unwrap().is_some();
                    prop_assert_eq!(found, present.contains(&key));
                    if found { expected_hits += 1 } else { expected_misses += 1 }
                }
                CacheOp::Remove { key } => {
                    let removed = cache.remove(&key).unwrap();
                    prop_assert_eq!(removed, present.remove(&key));
                    if removed { expected_removals += 1 }
                }
                CacheOp::Replace { key, value } => {
                    let replaced = cache.replace(&key, value).unwrap();
                    prop_assert_eq!(replaced, present.contains(&key));
                    if replaced { expected_puts += 1 }
                }
            }
        }

        let stats = cache.statistics();
        prop_assert_eq!(stats.hits, expected_hits, "Hits mismatch");
        prop_assert_eq!(stats.misses, expected_misses, "Misses mismatch");
        prop_assert_eq!(stats.puts, expected_puts, "Puts mismatch");
        prop_assert_eq!(stats.removals, expected_removals, "Removals mismatch");
        prop_assert_eq!(stats.total_entries, present.len(), "Total entries mismatch");
    }

    // For any valid key-value pair, storing then retrieving returns the
    // exact value that was stored.
    #[test]
    fn prop_roundtrip_storage(key in key_strategy(), value in value_strategy()) {
        let cache: Cache<String, String> = Cache::new("props", Configuration::new());

        cache.put(key.clone(), value.clone()).unwrap();

        let retrieved = cache.get(&key).unwrap().unwrap();
        prop_assert_eq!(&*retrieved, &value, "Round-trip value mismatch");
    }

    // For any key present in the cache, after remove a subsequent get
    // finds nothing.
    #[test]
    fn prop_remove_removes_entry(key in key_strategy(), value in value_strategy()) {
        let cache: Cache<String, String> = Cache::new("props", Configuration::new());

        cache.put(key.clone(), value).unwrap();
        prop_assert!(cache.get(&key).unwrap().is_some(), "Key should exist before remove");

        prop_assert!(cache.remove(&key).unwrap());
        prop_assert!(cache.get(&key).unwrap().is_none(), "Key should not exist after remove");
    }

    // For any key, storing V1 then V2 results in get returning V2.
    #[test]
    fn prop_overwrite_semantics(
        key in key_strategy(),
        v1 in value_strategy(),
        v2 in value_strategy(),
    ) {
        let cache: Cache<String, String> = Cache::new("props", Configuration::new());

        cache.put(key.clone(), v1).unwrap();
        cache.put(key.clone(), v2.clone()).unwrap();

        let retrieved = cache.get(&key).unwrap().unwrap();
        prop_assert_eq!(&*retrieved, &v2);
    }

    // For any operation sequence without expiry or clear, created events
    // minus removed events equals the number of live entries.
    #[test]
    fn prop_event_count_conservation(ops in prop::collection::vec(cache_op_strategy(), 1..50)) {
        let cache: Cache<String, String> = Cache::new("props", Configuration::new());
        let counter = Arc::new(EventCounter::default());
        cache
            .register_listener(ListenerConfiguration::new(counter.clone(), None, false, true))
            .unwrap();

        for op in ops {
            match op {
                CacheOp::Put { key, value } => { cache.put(key, value).unwrap(); }
                CacheOp::Get { key } => { cache.get(&key).unwrap(); }
                CacheOp::Remove { key } => { cache.remove(&key).unwrap(); }
                CacheOp::Replace { key, value } => { cache.replace(&key, value).unwrap(); }
            }
        }

        let created = counter.created.load(Ordering::SeqCst);
        let removed = counter.removed.load(Ordering::SeqCst);
        prop_assert_eq!(created - removed, cache.len() as u64, "Event conservation violated");
    }
}
