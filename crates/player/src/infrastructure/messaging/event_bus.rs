//! Event Bus for fanning session events out to observers.
//!
//! Observers subscribe per [`EventKind`]. Publishing is synchronous: every
//! observer registered for the event's kind runs before `publish` returns, on the
//! caller's task, so delivery order follows publish order.

use std::collections::HashMap;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::{Arc, PoisonError, RwLock};

use thiserror::Error;

use crate::ports::outbound::player_events::{EventKind, PlayerEvent};

/// Failure signalled by an observer. Logged by the bus, never propagated.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{0}")]
pub struct ObserverError(String);

impl ObserverError {
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }
}

/// Something that wants to see session events.
pub trait EventObserver: Send + Sync {
    fn on_event(&self, event: &PlayerEvent) -> Result<(), ObserverError>;
}

impl<F> EventObserver for F
where
    F: Fn(&PlayerEvent) -> Result<(), ObserverError> + Send + Sync,
{
    fn on_event(&self, event: &PlayerEvent) -> Result<(), ObserverError> {
        self(event)
    }
}

/// Shared observer handle. Identity (for dedup and unsubscribe) is the allocation.
pub type Observer = Arc<dyn EventObserver>;

/// Wrap a closure as an [`Observer`].
pub fn observer<F>(f: F) -> Observer
where
    F: Fn(&PlayerEvent) -> Result<(), ObserverError> + Send + Sync + 'static,
{
    Arc::new(f)
}

/// Event bus for session events.
///
/// Cloning is cheap and clones share the same registry.
#[derive(Clone, Default)]
pub struct EventBus {
    subscribers: Arc<RwLock<HashMap<EventKind, Vec<Observer>>>>,
}

impl EventBus {
    /// Create a new EventBus with no subscribers.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `observer` for `kind`.
    ///
    /// Registering the same observer twice for one kind is a no-op. Returns
    /// whether the observer was newly added.
    pub fn subscribe(&self, kind: EventKind, observer: Observer) -> bool {
        let mut subscribers = self
            .subscribers
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        let observers = subscribers.entry(kind).or_default();
        if observers.iter().any(|o| Arc::ptr_eq(o, &observer)) {
            return false;
        }
        observers.push(observer);
        true
    }

    /// Register `observer` for every kind in `kinds`.
    pub fn subscribe_all(&self, kinds: &[EventKind], observer: &Observer) {
        for kind in kinds {
            self.subscribe(*kind, Arc::clone(observer));
        }
    }

    /// Remove `observer` from `kind`. Returns whether it was registered.
    pub fn unsubscribe(&self, kind: EventKind, observer: &Observer) -> bool {
        let mut subscribers = self
            .subscribers
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        let Some(observers) = subscribers.get_mut(&kind) else {
            return false;
        };
        let before = observers.len();
        observers.retain(|o| !Arc::ptr_eq(o, observer));
        let removed = observers.len() != before;
        if observers.is_empty() {
            subscribers.remove(&kind);
        }
        removed
    }

    /// Deliver `event` to every observer of its kind.
    ///
    /// A failing or panicking observer is logged and skipped; the rest still
    /// run. The registry lock is not held while observers run, so observers may
    /// subscribe or unsubscribe from inside a callback. Returns the number of
    /// observers that handled the event successfully.
    pub fn publish(&self, event: &PlayerEvent) -> usize {
        let kind = event.kind();
        let observers: Vec<Observer> = {
            let subscribers = self
                .subscribers
                .read()
                .unwrap_or_else(PoisonError::into_inner);
            match subscribers.get(&kind) {
                Some(observers) => observers.clone(),
                None => return 0,
            }
        };

        let mut delivered = 0;
        for observer in &observers {
            match catch_unwind(AssertUnwindSafe(|| observer.on_event(event))) {
                Ok(Ok(())) => delivered += 1,
                Ok(Err(e)) => {
                    tracing::error!(event = %kind, error = %e, "Event observer failed");
                }
                Err(_) => {
                    tracing::error!(event = %kind, "Event observer panicked");
                }
            }
        }
        delivered
    }

    /// Number of observers registered for `kind`.
    pub fn subscriber_count(&self, kind: EventKind) -> usize {
        self.subscribers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&kind)
            .map_or(0, Vec::len)
    }
}
