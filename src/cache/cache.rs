//! Cache Module
//!
//! The operation executor: every read and mutation runs as one atomic unit
//! against the entry store, computes the resulting event set inside the
//! critical section, and hands it to the dispatcher after release so
//! listeners may re-enter the cache.

use std::collections::HashMap;
use std::hash::Hash;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use chrono::{DateTime, Utc};
use tracing::info;

use crate::cache::entry::current_timestamp_ms;
use crate::cache::stats::CacheStats;
use crate::cache::store::EntryStore;
use crate::config::Configuration;
use crate::error::{CacheError, Result};
use crate::event::{CacheEntryEvent, Dispatcher, EventType, ListenerConfiguration};
use crate::expiry::ExpiryType;
use crate::processor::{EntryProcessor, MutableEntry, MutationOutcome};

// == Cache ==
/// A named in-process key/value cache.
///
/// Values are held behind `Arc`. With store-by-value enabled (the default)
/// the payload is copied on the way out, so callers never alias cached
/// state; with it disabled `get` hands back the stored allocation.
///
/// All operations take `&self`; the store lock serializes read-modify-write
/// sequences, which satisfies the per-key atomicity contract.
pub struct Cache<K, V> {
    name: String,
    config: Arc<Configuration<K, V>>,
    store: RwLock<EntryStore<K, V>>,
    dispatcher: Dispatcher<K, V>,
    closed: AtomicBool,
    created_at: DateTime<Utc>,
}

impl<K, V> Cache<K, V>
where
    K: Eq + Hash + Clone + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    // == Constructor ==
    /// Creates a cache owning `configuration`.
    ///
    /// The configuration is shared afterwards: handles obtained through
    /// [`Cache::configuration`] observe statistics toggles and listener
    /// (de)registrations live.
    pub fn new(name: impl Into<String>, configuration: Configuration<K, V>) -> Self {
        let name = name.into();
        let created_at = Utc::now();
        info!(cache = %name, "cache created");
        Self {
            name,
            config: Arc::new(configuration),
            store: RwLock::new(EntryStore::new()),
            dispatcher: Dispatcher::new(),
            closed: AtomicBool::new(false),
            created_at,
        }
    }

    // == Metadata ==
    /// The cache's name within its owning manager.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Shared handle to the cache's configuration.
    pub fn configuration(&self) -> Arc<Configuration<K, V>> {
        Arc::clone(&self.config)
    }

    /// Wall-clock instant this cache was created.
    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    // == Reads ==
    /// Returns the live value for `key`.
    ///
    /// A hit advances the ACCESS expiry deadline. A miss consults the
    /// loader when read-through is enabled; loaded values are installed
    /// with the CREATION expiry and produce no listener events.
    pub fn get(&self, key: &K) -> Result<Option<Arc<V>>> {
        self.ensure_open()?;
        let mut store = self.store_write();
        let now = current_timestamp_ms();
        self.read_one(&mut store, key, now)
    }

    /// Returns the live values for `keys`, in one atomic pass.
    pub fn get_all(&self, keys: &[K]) -> Result<HashMap<K, Arc<V>>> {
        self.ensure_open()?;
        let mut store = self.store_write();
        let now = current_timestamp_ms();
        let mut found = HashMap::with_capacity(keys.len());
        for key in keys {
            if let Some(value) = self.read_one(&mut store, key, now)? {
                found.insert(key.clone(), value);
            }
        }
        Ok(found)
    }

    /// Whether a live entry exists for `key`.
    ///
    /// Not a read: no event, no statistics, and no ACCESS expiry touch.
    pub fn contains_key(&self, key: &K) -> Result<bool> {
        self.ensure_open()?;
        let store = self.store_read();
        Ok(store.is_visible(key, current_timestamp_ms()))
    }

    // == Writes ==
    /// Stores `value` under `key`: CREATED on an absent key, UPDATED on a
    /// present one.
    pub fn put(&self, key: K, value: V) -> Result<()> {
        self.put_internal(key, value).map(|_| ())
    }

    /// Stores `value` under `key` and returns the prior value, if any.
    pub fn get_and_put(&self, key: K, value: V) -> Result<Option<Arc<V>>> {
        self.put_internal(key, value)
            .map(|prior| prior.map(|v| self.copy_out(&v)))
    }

    /// Stores every pair, emitting one batched event set for the whole
    /// operation.
    pub fn put_all(&self, entries: impl IntoIterator<Item = (K, V)>) -> Result<()> {
        self.ensure_open()?;
        let mut events = Vec::new();
        let mut failure = None;
        {
            let mut store = self.store_write();
            let now = current_timestamp_ms();
            for (key, value) in entries {
                let stored = Arc::new(value);
                if let Err(e) = self.write_through(&key, &stored) {
                    failure = Some(e);
                    break;
                }
                events.push(self.commit_put(&mut store, key, stored, now));
                if self.config.is_statistics_enabled() {
                    store.stats_mut().record_put();
                }
            }
        }
        // Entries committed before a writer failure keep their events.
        let dispatched = self.dispatch(events);
        match failure {
            Some(e) => Err(e),
            None => dispatched,
        }
    }

    /// Replaces the value for a present key. No-op (and no event) when the
    /// key is absent.
    pub fn replace(&self, key: &K, value: V) -> Result<bool> {
        self.replace_present(key, value).map(|prior| prior.is_some())
    }

    /// Replaces the value for a present key and returns the prior value.
    pub fn get_and_replace(&self, key: &K, value: V) -> Result<Option<Arc<V>>> {
        self.replace_present(key, value)
            .map(|prior| prior.map(|v| self.copy_out(&v)))
    }

    /// Replaces the value only when the current value equals `expected`.
    pub fn replace_if_equals(&self, key: &K, expected: &V, value: V) -> Result<bool>
    where
        V: PartialEq,
    {
        self.ensure_open()?;
        let event;
        {
            let mut store = self.store_write();
            let now = current_timestamp_ms();
            let current_matches = match store.live_entry(key, now) {
                Some(entry) => *entry.value == *expected,
                None => false,
            };
            if !current_matches {
                return Ok(false);
            }
            let stored = Arc::new(value);
            self.write_through(key, &stored)?;
            event = match store.live_entry(key, now) {
                Some(entry) => {
                    let old = Arc::clone(&entry.value);
                    let deadline = self.config.expiry(ExpiryType::Update).deadline_from(now);
                    entry.touch_update(Arc::clone(&stored), now, deadline);
                    CacheEntryEvent::new(key.clone(), stored, Some(old), EventType::Updated)
                }
                None => return Ok(false),
            };
            if self.config.is_statistics_enabled() {
                store.stats_mut().record_put();
            }
        }
        self.dispatch(vec![event])?;
        Ok(true)
    }

    /// Removes the entry for `key`. No-op (and no event) when absent.
    pub fn remove(&self, key: &K) -> Result<bool> {
        self.remove_internal(key).map(|prior| prior.is_some())
    }

    /// Removes the entry for `key` and returns its value.
    pub fn get_and_remove(&self, key: &K) -> Result<Option<Arc<V>>> {
        self.remove_internal(key)
            .map(|prior| prior.map(|v| self.copy_out(&v)))
    }

    /// Removes every entry without emitting events: clear is a bulk
    /// administrative reset, not a per-entry mutation.
    pub fn clear(&self) -> Result<()> {
        self.ensure_open()?;
        self.store_write().clear();
        Ok(())
    }

    // == Entry Processor ==
    /// Runs `processor` against the entry for `key` as one atomic unit.
    ///
    /// The processor's buffered outcome is applied after it returns
    /// successfully and produces the same event a built-in mutator would.
    /// A processor error surfaces as [`CacheError::EntryProcessor`] and
    /// leaves the entry unmodified.
    pub fn invoke<P>(&self, key: K, processor: &P) -> Result<P::Output>
    where
        P: EntryProcessor<K, V>,
    {
        self.ensure_open()?;
        let output;
        let event;
        {
            let mut store = self.store_write();
            let now = current_timestamp_ms();
            let current = store
                .live_entry(&key, now)
                .map(|entry| Arc::clone(&entry.value));
            let mut entry = MutableEntry::new(&key, current);
            output = processor
                .process(&mut entry)
                .map_err(CacheError::EntryProcessor)?;
            let existed = entry.existed_on_entry();
            event = match entry.into_outcome() {
                MutationOutcome::None => None,
                MutationOutcome::Set(stored) => {
                    self.write_through(&key, &stored)?;
                    let committed = self.commit_put(&mut store, key, stored, now);
                    if self.config.is_statistics_enabled() {
                        store.stats_mut().record_put();
                    }
                    Some(committed)
                }
                MutationOutcome::Remove => {
                    if existed {
                        self.delete_through(&key)?;
                        store.remove(&key).map(|old| {
                            if self.config.is_statistics_enabled() {
                                store.stats_mut().record_removal();
                            }
                            CacheEntryEvent::new(
                                key.clone(),
                                Arc::clone(&old),
                                Some(old),
                                EventType::Removed,
                            )
                        })
                    } else {
                        None
                    }
                }
            };
        }
        if let Some(event) = event {
            self.dispatch(vec![event])?;
        }
        Ok(output)
    }

    // == Expiry Sweep ==
    /// Removes every entry past its deadline and fires EXPIRED events for
    /// them. Returns the number of entries removed.
    ///
    /// This is the only source of EXPIRED events; entries reaped lazily by
    /// other operations leave silently.
    pub fn evict_expired(&self) -> Result<usize> {
        self.ensure_open()?;
        let drained = {
            let mut store = self.store_write();
            let now = current_timestamp_ms();
            let drained = store.drain_expired(now);
            if self.config.is_statistics_enabled() && !drained.is_empty() {
                store.stats_mut().record_expiries(drained.len() as u64);
            }
            drained
        };
        let count = drained.len();
        if count > 0 {
            let events = drained
                .into_iter()
                .map(|(key, value)| {
                    CacheEntryEvent::new(key, Arc::clone(&value), Some(value), EventType::Expired)
                })
                .collect();
            self.dispatch(events)?;
        }
        Ok(count)
    }

    // == Iteration ==
    /// Iterates over the live entries.
    ///
    /// Yielding an entry is a read: it advances the ACCESS expiry deadline
    /// but fires no events. [`EntryIterator::remove`] removes the last
    /// yielded entry exactly like [`Cache::remove`].
    pub fn iter(&self) -> EntryIterator<'_, K, V> {
        let keys = {
            let store = self.store_read();
            store.live_keys(current_timestamp_ms())
        };
        EntryIterator {
            cache: self,
            keys: keys.into_iter(),
            last_key: None,
        }
    }

    // == Listener Registrations ==
    /// Registers a listener for all subsequent operations.
    ///
    /// # Errors
    /// [`CacheError::IllegalState`] if an equal registration already
    /// exists.
    pub fn register_listener(&self, registration: ListenerConfiguration<K, V>) -> Result<()> {
        self.ensure_open()?;
        self.config.register_listener(registration)
    }

    /// Deregisters a listener; unknown registrations are a harmless no-op.
    /// Registrations supplied at configuration time are honored
    /// identically to dynamic ones.
    pub fn deregister_listener(&self, registration: &ListenerConfiguration<K, V>) -> Result<()> {
        self.ensure_open()?;
        self.config.deregister_listener(registration);
        Ok(())
    }

    // == Statistics ==
    /// Snapshot of the statistics counters.
    pub fn statistics(&self) -> CacheStats {
        let store = self.store_read();
        store.stats_snapshot(current_timestamp_ms())
    }

    /// Number of live entries.
    pub fn len(&self) -> usize {
        self.store_read().live_len(current_timestamp_ms())
    }

    /// True when no live entries exist.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    // == Lifecycle ==
    /// Closes the cache: subsequent operations fail with an illegal-state
    /// error. Stops the asynchronous delivery worker after it drains.
    /// Idempotent.
    pub fn close(&self) {
        if !self.closed.swap(true, Ordering::SeqCst) {
            self.dispatcher.shutdown();
            info!(cache = %self.name, "cache closed");
        }
    }

    /// Whether [`Cache::close`] has been called.
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    fn ensure_open(&self) -> Result<()> {
        if self.is_closed() {
            Err(CacheError::closed(&self.name))
        } else {
            Ok(())
        }
    }

    // == Internals ==
    fn store_write(&self) -> RwLockWriteGuard<'_, EntryStore<K, V>> {
        self.store.write().unwrap_or_else(PoisonError::into_inner)
    }

    fn store_read(&self) -> RwLockReadGuard<'_, EntryStore<K, V>> {
        self.store.read().unwrap_or_else(PoisonError::into_inner)
    }

    /// Value leaving the cache: a fresh copy under store-by-value, the
    /// stored allocation in aliasing mode.
    fn copy_out(&self, value: &Arc<V>) -> Arc<V> {
        if self.config.is_store_by_value() {
            Arc::new(V::clone(value))
        } else {
            Arc::clone(value)
        }
    }

    /// One read against a locked store: hit (with ACCESS touch), else
    /// read-through load, else miss.
    fn read_one(
        &self,
        store: &mut EntryStore<K, V>,
        key: &K,
        now: u64,
    ) -> Result<Option<Arc<V>>> {
        let hit = match store.live_entry(key, now) {
            Some(entry) => {
                let deadline = self.config.expiry(ExpiryType::Access).deadline_from(now);
                entry.touch_access(now, deadline);
                Some(Arc::clone(&entry.value))
            }
            None => None,
        };
        if let Some(value) = hit {
            if self.config.is_statistics_enabled() {
                store.stats_mut().record_hit();
            }
            return Ok(Some(self.copy_out(&value)));
        }

        if self.config.is_statistics_enabled() {
            store.stats_mut().record_miss();
        }

        if self.config.is_read_through() {
            if let Some(loader) = self.config.loader() {
                match loader.load(key) {
                    Ok(Some(value)) => {
                        let stored = Arc::new(value);
                        let deadline =
                            self.config.expiry(ExpiryType::Creation).deadline_from(now);
                        store.insert(key.clone(), Arc::clone(&stored), now, deadline);
                        return Ok(Some(self.copy_out(&stored)));
                    }
                    Ok(None) => {}
                    Err(e) => return Err(CacheError::Loader(e)),
                }
            }
        }
        Ok(None)
    }

    /// Commits a put against a locked store and returns its event.
    fn commit_put(
        &self,
        store: &mut EntryStore<K, V>,
        key: K,
        stored: Arc<V>,
        now: u64,
    ) -> CacheEntryEvent<K, V> {
        match store.live_entry(&key, now) {
            Some(entry) => {
                let old = Arc::clone(&entry.value);
                let deadline = self.config.expiry(ExpiryType::Update).deadline_from(now);
                entry.touch_update(Arc::clone(&stored), now, deadline);
                CacheEntryEvent::new(key, stored, Some(old), EventType::Updated)
            }
            None => {
                let deadline = self.config.expiry(ExpiryType::Creation).deadline_from(now);
                store.insert(key.clone(), Arc::clone(&stored), now, deadline);
                CacheEntryEvent::new(key, stored, None, EventType::Created)
            }
        }
    }

    fn put_internal(&self, key: K, value: V) -> Result<Option<Arc<V>>> {
        self.ensure_open()?;
        let event;
        let prior;
        {
            let mut store = self.store_write();
            let now = current_timestamp_ms();
            let stored = Arc::new(value);
            self.write_through(&key, &stored)?;
            prior = store
                .live_entry(&key, now)
                .map(|entry| Arc::clone(&entry.value));
            event = self.commit_put(&mut store, key, stored, now);
            if self.config.is_statistics_enabled() {
                store.stats_mut().record_put();
            }
        }
        self.dispatch(vec![event])?;
        Ok(prior)
    }

    fn replace_present(&self, key: &K, value: V) -> Result<Option<Arc<V>>> {
        self.ensure_open()?;
        let event;
        let prior;
        {
            let mut store = self.store_write();
            let now = current_timestamp_ms();
            if store.live_entry(key, now).is_none() {
                return Ok(None);
            }
            let stored = Arc::new(value);
            self.write_through(key, &stored)?;
            match store.live_entry(key, now) {
                Some(entry) => {
                    let old = Arc::clone(&entry.value);
                    let deadline = self.config.expiry(ExpiryType::Update).deadline_from(now);
                    entry.touch_update(Arc::clone(&stored), now, deadline);
                    prior = Some(Arc::clone(&old));
                    event =
                        CacheEntryEvent::new(key.clone(), stored, Some(old), EventType::Updated);
                }
                None => return Ok(None),
            }
            if self.config.is_statistics_enabled() {
                store.stats_mut().record_put();
            }
        }
        self.dispatch(vec![event])?;
        Ok(prior)
    }

    fn remove_internal(&self, key: &K) -> Result<Option<Arc<V>>> {
        self.ensure_open()?;
        let event;
        let removed;
        {
            let mut store = self.store_write();
            let now = current_timestamp_ms();
            if store.live_entry(key, now).is_none() {
                return Ok(None);
            }
            self.delete_through(key)?;
            removed = match store.remove(key) {
                Some(value) => value,
                None => return Ok(None),
            };
            if self.config.is_statistics_enabled() {
                store.stats_mut().record_removal();
            }
            event = CacheEntryEvent::new(
                key.clone(),
                Arc::clone(&removed),
                Some(Arc::clone(&removed)),
                EventType::Removed,
            );
        }
        self.dispatch(vec![event])?;
        Ok(Some(removed))
    }

    fn write_through(&self, key: &K, value: &Arc<V>) -> Result<()> {
        if self.config.is_write_through() {
            if let Some(writer) = self.config.writer() {
                writer.write(key, value).map_err(CacheError::Writer)?;
            }
        }
        Ok(())
    }

    fn delete_through(&self, key: &K) -> Result<()> {
        if self.config.is_write_through() {
            if let Some(writer) = self.config.writer() {
                writer.delete(key).map_err(CacheError::Writer)?;
            }
        }
        Ok(())
    }

    fn dispatch(&self, events: Vec<CacheEntryEvent<K, V>>) -> Result<()> {
        if events.is_empty() {
            return Ok(());
        }
        let registrations = self.config.listener_configurations();
        self.dispatcher.dispatch(&registrations, events)
    }
}

impl<K, V> Drop for Cache<K, V> {
    fn drop(&mut self) {
        self.closed.store(true, Ordering::SeqCst);
    }
}

// == Entry Iterator ==
/// Iterator over a cache's live entries.
///
/// Works from a key snapshot taken at creation; entries removed or expired
/// since are skipped when reached.
pub struct EntryIterator<'a, K, V> {
    cache: &'a Cache<K, V>,
    keys: std::vec::IntoIter<K>,
    last_key: Option<K>,
}

impl<'a, K, V> EntryIterator<'a, K, V>
where
    K: Eq + Hash + Clone + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    /// Removes the last yielded entry, firing REMOVED exactly like
    /// [`Cache::remove`]. Returns whether an entry was removed.
    pub fn remove(&mut self) -> Result<bool> {
        match self.last_key.take() {
            Some(key) => self.cache.remove(&key),
            None => Ok(false),
        }
    }
}

impl<'a, K, V> Iterator for EntryIterator<'a, K, V>
where
    K: Eq + Hash + Clone + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    type Item = (K, Arc<V>);

    fn next(&mut self) -> Option<Self::Item> {
        if self.cache.is_closed() {
            return None;
        }
        for key in self.keys.by_ref() {
            let mut store = self.cache.store_write();
            let now = current_timestamp_ms();
            let value = match store.live_entry(&key, now) {
                Some(entry) => {
                    let deadline = self
                        .cache
                        .config
                        .expiry(ExpiryType::Access)
                        .deadline_from(now);
                    entry.touch_access(now, deadline);
                    Arc::clone(&entry.value)
                }
                None => continue,
            };
            drop(store);
            self.last_key = Some(key.clone());
            return Some((key, self.cache.copy_out(&value)));
        }
        None
    }
}
