//! Listener Registration Module
//!
//! Listener and filter capability traits plus the registration tuple the
//! cache deduplicates and dispatches against.

use std::fmt;
use std::sync::Arc;

use crate::error::DynError;
use crate::event::CacheEntryEvent;

// == Listener Capabilities ==
/// Receiver of entry events, batched per triggering operation.
///
/// Each method covers one event kind and defaults to a no-op, so a listener
/// implements only the capabilities it cares about; the dispatcher only
/// calls a method when the batch contains events of that kind.
///
/// A returned error from a synchronous registration is wrapped and surfaced
/// to the caller of the triggering operation; panics are deliberately not
/// caught and unwind to that caller verbatim.
pub trait CacheEntryListener<K, V>: Send + Sync {
    fn on_created(&self, _events: &[CacheEntryEvent<K, V>]) -> Result<(), DynError> {
        Ok(())
    }

    fn on_updated(&self, _events: &[CacheEntryEvent<K, V>]) -> Result<(), DynError> {
        Ok(())
    }

    fn on_removed(&self, _events: &[CacheEntryEvent<K, V>]) -> Result<(), DynError> {
        Ok(())
    }

    fn on_expired(&self, _events: &[CacheEntryEvent<K, V>]) -> Result<(), DynError> {
        Ok(())
    }
}

// == Event Filter ==
/// Decides per event whether a registration's listener sees it.
///
/// Rejected events are never delivered to the paired listener. Filter
/// failures follow the listener failure rules (wrapped for synchronous
/// registrations, dropped for asynchronous ones).
pub trait CacheEntryEventFilter<K, V>: Send + Sync {
    fn evaluate(&self, event: &CacheEntryEvent<K, V>) -> Result<bool, DynError>;
}

// == Listener Configuration ==
/// One listener registration: the listener handle, an optional filter, and
/// the delivery flags.
///
/// Registrations compare by value of this tuple — listener and filter by
/// handle identity, flags by value — so registering the same configuration
/// twice is rejected while two registrations of distinct listener instances
/// coexist.
pub struct ListenerConfiguration<K, V> {
    listener: Arc<dyn CacheEntryListener<K, V>>,
    filter: Option<Arc<dyn CacheEntryEventFilter<K, V>>>,
    old_value_required: bool,
    synchronous: bool,
}

impl<K, V> ListenerConfiguration<K, V> {
    // == Constructor ==
    /// Creates a registration for `listener`, optionally guarded by
    /// `filter`.
    ///
    /// # Arguments
    /// * `old_value_required` - attach the prior value to updated/removed
    ///   events delivered through this registration
    /// * `synchronous` - deliver before the triggering operation returns;
    ///   failures then propagate to the triggering caller
    pub fn new(
        listener: Arc<dyn CacheEntryListener<K, V>>,
        filter: Option<Arc<dyn CacheEntryEventFilter<K, V>>>,
        old_value_required: bool,
        synchronous: bool,
    ) -> Self {
        Self {
            listener,
            filter,
            old_value_required,
            synchronous,
        }
    }

    // == Accessors ==
    pub fn listener(&self) -> &Arc<dyn CacheEntryListener<K, V>> {
        &self.listener
    }

    pub fn filter(&self) -> Option<&Arc<dyn CacheEntryEventFilter<K, V>>> {
        self.filter.as_ref()
    }

    pub fn is_old_value_required(&self) -> bool {
        self.old_value_required
    }

    pub fn is_synchronous(&self) -> bool {
        self.synchronous
    }
}

impl<K, V> Clone for ListenerConfiguration<K, V> {
    fn clone(&self) -> Self {
        Self {
            listener: Arc::clone(&self.listener),
            filter: self.filter.clone(),
            old_value_required: self.old_value_required,
            synchronous: self.synchronous,
        }
    }
}

impl<K, V> PartialEq for ListenerConfiguration<K, V> {
    fn eq(&self, other: &Self) -> bool {
        let same_filter = match (&self.filter, &other.filter) {
            (None, None) => true,
            (Some(a), Some(b)) => Arc::ptr_eq(a, b),
            _ => false,
        };
        Arc::ptr_eq(&self.listener, &other.listener)
            && same_filter
            && self.old_value_required == other.old_value_required
            && self.synchronous == other.synchronous
    }
}

impl<K, V> Eq for ListenerConfiguration<K, V> {}

impl<K, V> fmt::Debug for ListenerConfiguration<K, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ListenerConfiguration")
            .field("filtered", &self.filter.is_some())
            .field("old_value_required", &self.old_value_required)
            .field("synchronous", &self.synchronous)
            .finish()
    }
}
