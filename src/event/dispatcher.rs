//! Event Dispatcher Module
//!
//! Delivers the event batch produced by each mutating operation to the
//! matching listener registrations: synchronous registrations on the
//! caller's thread, asynchronous ones through a dedicated delivery worker.

use std::sync::mpsc::{self, Sender};
use std::sync::{Mutex, PoisonError};
use std::thread::JoinHandle;

use tracing::{debug, warn};

use crate::error::{CacheError, DynError, Result};
use crate::event::{CacheEntryEvent, EventType, ListenerConfiguration};

/// One asynchronous delivery unit: the registration snapshot taken at
/// dispatch time plus the full event batch of the triggering operation.
struct AsyncBatch<K, V> {
    registration: ListenerConfiguration<K, V>,
    events: Vec<CacheEntryEvent<K, V>>,
}

// == Dispatcher ==
/// Fans an operation's event batch out to listener registrations.
///
/// The registration set itself lives in the cache configuration; the
/// dispatcher receives a snapshot per operation, so concurrent registration
/// changes are seen wholly before or wholly after a given dispatch.
pub(crate) struct Dispatcher<K, V> {
    tx: Mutex<Option<Sender<AsyncBatch<K, V>>>>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl<K, V> Dispatcher<K, V>
where
    K: Clone + Send + 'static,
    V: Send + Sync + 'static,
{
    // == Constructor ==
    /// Creates a dispatcher and starts its delivery worker.
    ///
    /// The worker is a plain thread so asynchronous registrations work for
    /// callers without an async runtime; it drains until the dispatcher is
    /// shut down.
    pub(crate) fn new() -> Self {
        let (tx, rx) = mpsc::channel::<AsyncBatch<K, V>>();

        let worker = std::thread::Builder::new()
            .name("embercache-delivery".to_string())
            .spawn(move || {
                for batch in rx.iter() {
                    if let Err(e) = deliver(&batch.registration, &batch.events) {
                        // Nobody is waiting on an asynchronous registration.
                        warn!(error = %e, "asynchronous cache entry listener failed; dropping");
                    }
                }
                debug!("event delivery worker stopped");
            })
            .expect("failed to spawn event delivery worker");

        Self {
            tx: Mutex::new(Some(tx)),
            worker: Mutex::new(Some(worker)),
        }
    }

    // == Dispatch ==
    /// Delivers `events` to every registration in the snapshot.
    ///
    /// Asynchronous registrations are enqueued (never blocking the caller
    /// beyond the enqueue). Synchronous registrations are delivered inline;
    /// every one of them is offered the batch even when an earlier one
    /// fails, and the first failure is returned wrapped as a listener
    /// failure.
    pub(crate) fn dispatch(
        &self,
        registrations: &[ListenerConfiguration<K, V>],
        events: Vec<CacheEntryEvent<K, V>>,
    ) -> Result<()> {
        if events.is_empty() || registrations.is_empty() {
            return Ok(());
        }

        {
            let tx = self.tx.lock().unwrap_or_else(PoisonError::into_inner);
            if let Some(tx) = tx.as_ref() {
                for registration in registrations.iter().filter(|r| !r.is_synchronous()) {
                    let _ = tx.send(AsyncBatch {
                        registration: registration.clone(),
                        events: events.clone(),
                    });
                }
            }
        }

        let mut first_err: Option<DynError> = None;
        for registration in registrations.iter().filter(|r| r.is_synchronous()) {
            if let Err(e) = deliver(registration, &events) {
                first_err.get_or_insert(e);
            }
        }

        match first_err {
            Some(e) => Err(CacheError::EntryListener(e)),
            None => Ok(()),
        }
    }

    // == Shutdown ==
    /// Stops the delivery worker after it drains already-enqueued batches.
    /// Idempotent.
    pub(crate) fn shutdown(&self) {
        // Dropping the sender ends the worker's receive loop.
        self.tx
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        let worker = self
            .worker
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(handle) = worker {
            let _ = handle.join();
        }
    }
}

impl<K, V> Drop for Dispatcher<K, V> {
    fn drop(&mut self) {
        self.tx
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        let worker = self
            .worker
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(handle) = worker {
            let _ = handle.join();
        }
    }
}

// == Delivery ==
/// Delivers one event batch through one registration: filter each event,
/// strip old values the registration did not ask for, then hand the
/// surviving events to the listener's capability methods grouped by kind.
///
/// All capabilities are invoked even after a failure; the first failure is
/// returned.
fn deliver<K: Clone, V>(
    registration: &ListenerConfiguration<K, V>,
    events: &[CacheEntryEvent<K, V>],
) -> std::result::Result<(), DynError> {
    let mut first_err: Option<DynError> = None;

    let mut surviving: Vec<CacheEntryEvent<K, V>> = Vec::with_capacity(events.len());
    for event in events {
        let keep = match registration.filter() {
            Some(filter) => match filter.evaluate(event) {
                Ok(keep) => keep,
                Err(e) => {
                    first_err.get_or_insert(e);
                    false
                }
            },
            None => true,
        };
        if keep {
            // The filter saw the full event; old values are stripped only
            // for delivery.
            surviving.push(if registration.is_old_value_required() {
                event.clone()
            } else {
                event.without_old_value()
            });
        }
    }

    let listener = registration.listener();
    for kind in EventType::ALL {
        let batch: Vec<CacheEntryEvent<K, V>> = surviving
            .iter()
            .filter(|e| e.event_type() == kind)
            .cloned()
            .collect();
        if batch.is_empty() {
            continue;
        }
        let outcome = match kind {
            EventType::Created => listener.on_created(&batch),
            EventType::Updated => listener.on_updated(&batch),
            EventType::Removed => listener.on_removed(&batch),
            EventType::Expired => listener.on_expired(&batch),
        };
        if let Err(e) = outcome {
            first_err.get_or_insert(e);
        }
    }

    match first_err {
        Some(e) => Err(e),
        None => Ok(()),
    }
}
