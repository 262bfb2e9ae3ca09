//! Cache Manager Module
//!
//! A registry of named caches with an explicit create/get/close lifecycle.
//! Managers are ordinary values, not ambient global state: each test (or
//! subsystem) owns its own and drops it for a clean slate.

use std::any::Any;
use std::collections::HashMap;
use std::hash::Hash;
use std::sync::{Arc, Mutex, PoisonError};

use chrono::{DateTime, Utc};
use tracing::info;

use crate::cache::Cache;
use crate::config::Configuration;
use crate::error::{CacheError, Result};

/// A cache held type-erased, plus the hook the manager uses to close it
/// without knowing its key/value types.
struct Registered {
    handle: Box<dyn Any + Send + Sync>,
    close: Box<dyn Fn() + Send + Sync>,
}

// == Cache Manager ==
/// Creates, looks up and closes named caches.
///
/// Names are unique per manager; caches under different managers are fully
/// independent. Lookups are typed: `get_cache` under the wrong key/value
/// types returns `None` just like an unknown name.
pub struct CacheManager {
    caches: Mutex<HashMap<String, Registered>>,
    created_at: DateTime<Utc>,
}

impl CacheManager {
    // == Constructor ==
    pub fn new() -> Self {
        Self {
            caches: Mutex::new(HashMap::new()),
            created_at: Utc::now(),
        }
    }

    /// Wall-clock instant this manager was created.
    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    // == Create ==
    /// Creates a cache under `name` from `configuration`.
    ///
    /// # Errors
    /// [`CacheError::IllegalState`] if a cache with that name already
    /// exists.
    pub fn create_cache<K, V>(
        &self,
        name: &str,
        configuration: Configuration<K, V>,
    ) -> Result<Arc<Cache<K, V>>>
    where
        K: Eq + Hash + Clone + Send + Sync + 'static,
        V: Clone + Send + Sync + 'static,
    {
        let mut caches = self.lock();
        if caches.contains_key(name) {
            return Err(CacheError::IllegalState(format!(
                "Cache '{}' already exists",
                name
            )));
        }

        let cache = Arc::new(Cache::new(name, configuration));
        let close_handle = Arc::clone(&cache);
        caches.insert(
            name.to_string(),
            Registered {
                handle: Box::new(Arc::clone(&cache)),
                close: Box::new(move || close_handle.close()),
            },
        );
        info!(cache = %name, "cache registered");
        Ok(cache)
    }

    // == Lookup ==
    /// The cache registered under `name`, if one exists with matching
    /// key/value types.
    pub fn get_cache<K, V>(&self, name: &str) -> Option<Arc<Cache<K, V>>>
    where
        K: Eq + Hash + Clone + Send + Sync + 'static,
        V: Clone + Send + Sync + 'static,
    {
        let caches = self.lock();
        caches
            .get(name)
            .and_then(|registered| registered.handle.downcast_ref::<Arc<Cache<K, V>>>())
            .cloned()
    }

    /// Names of all registered caches.
    pub fn cache_names(&self) -> Vec<String> {
        self.lock().keys().cloned().collect()
    }

    // == Teardown ==
    /// Closes and forgets the cache under `name`. Unknown names are a
    /// no-op; returns whether a cache was destroyed.
    pub fn destroy_cache(&self, name: &str) -> bool {
        let removed = self.lock().remove(name);
        match removed {
            Some(registered) => {
                (registered.close)();
                info!(cache = %name, "cache destroyed");
                true
            }
            None => false,
        }
    }

    /// Closes every cache and empties the registry. The manager itself
    /// stays usable, so tests can reuse one value across cases.
    pub fn close(&self) {
        let drained: Vec<Registered> = {
            let mut caches = self.lock();
            caches.drain().map(|(_, registered)| registered).collect()
        };
        for registered in &drained {
            (registered.close)();
        }
        info!(count = drained.len(), "cache manager closed");
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, Registered>> {
        self.caches.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for CacheManager {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for CacheManager {
    fn drop(&mut self) {
        self.close();
    }
}
