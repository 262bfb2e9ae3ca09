//! Configuration Module
//!
//! Per-cache settings: value-copy mode, read/write-through, statistics,
//! per-operation expiry and the listener-registration set.
//!
//! Everything except the statistics flag and the listener set is fixed once
//! a cache is created from the configuration. Those two are shared state:
//! every live handle to the same configuration instance observes toggles
//! and (de)registrations immediately, including the cache's dispatcher.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, PoisonError, RwLock};

use crate::backing::{CacheLoader, CacheWriter};
use crate::error::{CacheError, Result};
use crate::event::ListenerConfiguration;
use crate::expiry::{Duration, ExpiryType};

// == Configuration ==
/// Settings bag for one cache.
///
/// Defaults: store-by-value on, read/write-through off, statistics off,
/// eternal expiry for every operation type, no listeners, no backing store.
/// Two configurations are equal iff every field compares equal; repeated
/// default construction yields content-equal but never identical values.
pub struct Configuration<K, V> {
    store_by_value: bool,
    read_through: bool,
    write_through: bool,
    statistics_enabled: AtomicBool,
    expiry: [Duration; 3],
    listeners: RwLock<Vec<ListenerConfiguration<K, V>>>,
    loader: Option<Arc<dyn CacheLoader<K, V>>>,
    writer: Option<Arc<dyn CacheWriter<K, V>>>,
}

impl<K, V> Configuration<K, V> {
    // == Constructor ==
    /// Creates a configuration with the documented defaults.
    pub fn new() -> Self {
        Self {
            store_by_value: true,
            read_through: false,
            write_through: false,
            statistics_enabled: AtomicBool::new(false),
            expiry: [Duration::ETERNAL; 3],
            listeners: RwLock::new(Vec::new()),
            loader: None,
            writer: None,
        }
    }

    // == Builder Setters ==
    /// Copy values on put/get (true) or share them (false).
    pub fn set_store_by_value(mut self, store_by_value: bool) -> Self {
        self.store_by_value = store_by_value;
        self
    }

    /// Consult the configured loader on misses.
    pub fn set_read_through(mut self, read_through: bool) -> Self {
        self.read_through = read_through;
        self
    }

    /// Mirror mutations to the configured writer.
    pub fn set_write_through(mut self, write_through: bool) -> Self {
        self.write_through = write_through;
        self
    }

    /// Sets the expiry duration applied by operations of `expiry_type`.
    pub fn set_expiry(mut self, expiry_type: ExpiryType, duration: Duration) -> Self {
        self.expiry[expiry_type.index()] = duration;
        self
    }

    /// Attaches the read-through loader.
    pub fn set_loader(mut self, loader: Arc<dyn CacheLoader<K, V>>) -> Self {
        self.loader = Some(loader);
        self
    }

    /// Attaches the write-through writer.
    pub fn set_writer(mut self, writer: Arc<dyn CacheWriter<K, V>>) -> Self {
        self.writer = Some(writer);
        self
    }

    /// Adds a listener registration at configuration time.
    ///
    /// # Errors
    /// [`CacheError::IllegalState`] if an equal registration is already
    /// present.
    pub fn add_listener(self, registration: ListenerConfiguration<K, V>) -> Result<Self> {
        self.register_listener(registration)?;
        Ok(self)
    }

    // == Accessors ==
    pub fn is_store_by_value(&self) -> bool {
        self.store_by_value
    }

    pub fn is_read_through(&self) -> bool {
        self.read_through
    }

    pub fn is_write_through(&self) -> bool {
        self.write_through
    }

    pub fn is_statistics_enabled(&self) -> bool {
        self.statistics_enabled.load(Ordering::SeqCst)
    }

    /// Toggles statistics recording. Mutable after cache creation and
    /// observed immediately by every handle sharing this instance.
    pub fn set_statistics_enabled(&self, enabled: bool) {
        self.statistics_enabled.store(enabled, Ordering::SeqCst);
    }

    /// The expiry duration operations of `expiry_type` apply; `ETERNAL`
    /// when never set.
    pub fn expiry(&self, expiry_type: ExpiryType) -> Duration {
        self.expiry[expiry_type.index()]
    }

    pub(crate) fn loader(&self) -> Option<&Arc<dyn CacheLoader<K, V>>> {
        self.loader.as_ref()
    }

    pub(crate) fn writer(&self) -> Option<&Arc<dyn CacheWriter<K, V>>> {
        self.writer.as_ref()
    }

    // == Listener Registrations ==
    /// Snapshot of the current registrations, in registration order.
    pub fn listener_configurations(&self) -> Vec<ListenerConfiguration<K, V>> {
        self.listeners
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Registers a listener configuration.
    ///
    /// # Errors
    /// [`CacheError::IllegalState`] if an equal registration is already
    /// present.
    pub(crate) fn register_listener(
        &self,
        registration: ListenerConfiguration<K, V>,
    ) -> Result<()> {
        let mut listeners = self
            .listeners
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        if listeners.contains(&registration) {
            return Err(CacheError::IllegalState(
                "listener configuration is already registered".to_string(),
            ));
        }
        listeners.push(registration);
        Ok(())
    }

    /// Removes a registration. Removing one that is absent is a no-op;
    /// returns whether anything was removed.
    pub(crate) fn deregister_listener(&self, registration: &ListenerConfiguration<K, V>) -> bool {
        let mut listeners = self
            .listeners
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        let before = listeners.len();
        listeners.retain(|existing| existing != registration);
        listeners.len() != before
    }
}

impl<K, V> Default for Configuration<K, V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K, V> Clone for Configuration<K, V> {
    /// Produces an independently owned copy: the clone gets its own
    /// statistics flag and listener set seeded with the current contents.
    fn clone(&self) -> Self {
        Self {
            store_by_value: self.store_by_value,
            read_through: self.read_through,
            write_through: self.write_through,
            statistics_enabled: AtomicBool::new(self.is_statistics_enabled()),
            expiry: self.expiry,
            listeners: RwLock::new(self.listener_configurations()),
            loader: self.loader.clone(),
            writer: self.writer.clone(),
        }
    }
}

impl<K, V> PartialEq for Configuration<K, V> {
    fn eq(&self, other: &Self) -> bool {
        let same_loader = match (&self.loader, &other.loader) {
            (None, None) => true,
            (Some(a), Some(b)) => Arc::ptr_eq(a, b),
            _ => false,
        };
        let same_writer = match (&self.writer, &other.writer) {
            (None, None) => true,
            (Some(a), Some(b)) => Arc::ptr_eq(a, b),
            _ => false,
        };
        self.store_by_value == other.store_by_value
            && self.read_through == other.read_through
            && self.write_through == other.write_through
            && self.is_statistics_enabled() == other.is_statistics_enabled()
            && self.expiry == other.expiry
            && self.listener_configurations() == other.listener_configurations()
            && same_loader
            && same_writer
    }
}

impl<K, V> Eq for Configuration<K, V> {}

impl<K, V> fmt::Debug for Configuration<K, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Configuration")
            .field("store_by_value", &self.store_by_value)
            .field("read_through", &self.read_through)
            .field("write_through", &self.write_through)
            .field("statistics_enabled", &self.is_statistics_enabled())
            .field("expiry", &self.expiry)
            .field("listeners", &self.listener_configurations().len())
            .field("loader", &self.loader.is_some())
            .field("writer", &self.writer.is_some())
            .finish()
    }
}
