//! Entry Processor Module
//!
//! Caller-supplied read-modify-write units executed atomically against one
//! entry by [`crate::cache::Cache::invoke`].

use std::sync::Arc;

use crate::error::DynError;

// == Entry Processor ==
/// A read-modify-write unit invoked under the per-key atomicity guarantee.
///
/// The processor observes and mutates the entry through [`MutableEntry`]
/// and returns a result to the invoking caller. Processor state travels in
/// the processor value itself. A returned error aborts the invocation with
/// a processor failure and leaves the entry unmodified.
pub trait EntryProcessor<K, V> {
    type Output;

    fn process(&self, entry: &mut MutableEntry<'_, K, V>) -> Result<Self::Output, DynError>;
}

/// What the processor decided to do with the entry.
#[derive(Debug)]
pub(crate) enum MutationOutcome<V> {
    /// Entry left as found
    None,
    /// Entry set to a new value (create or update)
    Set(Arc<V>),
    /// Entry removed
    Remove,
}

// == Mutable Entry ==
/// The processor's view of one entry.
///
/// Mutations are buffered: `set` and `remove` update this view immediately
/// but touch the underlying store only after the processor returns
/// successfully. A failing processor therefore cannot leave a half-applied
/// mutation behind.
pub struct MutableEntry<'a, K, V> {
    key: &'a K,
    current: Option<Arc<V>>,
    outcome: MutationOutcome<V>,
}

impl<'a, K, V> MutableEntry<'a, K, V> {
    pub(crate) fn new(key: &'a K, current: Option<Arc<V>>) -> Self {
        Self {
            key,
            current,
            outcome: MutationOutcome::None,
        }
    }

    /// The key this invocation is bound to.
    pub fn key(&self) -> &K {
        self.key
    }

    /// Whether the entry exists in this view, buffered mutations included.
    pub fn exists(&self) -> bool {
        match &self.outcome {
            MutationOutcome::None => self.current.is_some(),
            MutationOutcome::Set(_) => true,
            MutationOutcome::Remove => false,
        }
    }

    /// The entry's value in this view, buffered mutations included.
    pub fn value(&self) -> Option<Arc<V>> {
        match &self.outcome {
            MutationOutcome::None => self.current.clone(),
            MutationOutcome::Set(value) => Some(Arc::clone(value)),
            MutationOutcome::Remove => None,
        }
    }

    /// Buffers a create-or-update of the entry to `value`.
    pub fn set(&mut self, value: V) {
        self.outcome = MutationOutcome::Set(Arc::new(value));
    }

    /// Buffers removal of the entry. A no-op outcome if the entry never
    /// existed.
    pub fn remove(&mut self) {
        self.outcome = MutationOutcome::Remove;
    }

    /// Whether a live entry existed when the invocation started.
    pub(crate) fn existed_on_entry(&self) -> bool {
        self.current.is_some()
    }

    pub(crate) fn into_outcome(self) -> MutationOutcome<V> {
        self.outcome
    }
}

// == Unit Tests ==
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_view_reflects_buffered_set() {
        let key = 1u64;
        let mut entry: MutableEntry<'_, u64, String> = MutableEntry::new(&key, None);

        assert!(!entry.exists());
        assert!(entry.value().is_none());

        entry.set("fresh".to_string());
        assert!(entry.exists());
        assert_eq!(*entry.value().unwrap(), "fresh");
        assert!(!entry.existed_on_entry());
        assert!(matches!(entry.into_outcome(), MutationOutcome::Set(_)));
    }

    #[test]
    fn test_view_reflects_buffered_remove() {
        let key = 1u64;
        let current = Some(Arc::new("old".to_string()));
        let mut entry: MutableEntry<'_, u64, String> = MutableEntry::new(&key, current);

        assert!(entry.exists());
        entry.remove();
        assert!(!entry.exists());
        assert!(entry.value().is_none());
        assert!(entry.existed_on_entry());
        assert!(matches!(entry.into_outcome(), MutationOutcome::Remove));
    }

    #[test]
    fn test_untouched_entry_has_no_outcome() {
        let key = 1u64;
        let current = Some(Arc::new("old".to_string()));
        let entry: MutableEntry<'_, u64, String> = MutableEntry::new(&key, current);

        assert_eq!(*entry.key(), 1);
        assert!(matches!(entry.into_outcome(), MutationOutcome::None));
    }
}
