//! Shared, observable session snapshot
//!
//! `SessionStore` is the handle UI code reads from. Attached to an `EventBus`,
//! it folds every event into the snapshot as it is published, on the
//! publisher's task, so the snapshot always reflects frames in arrival order.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tavern_protocol::SessionData;
use tokio::sync::mpsc;

use crate::infrastructure::messaging::{observer, EventBus, Observer};
use crate::ports::outbound::{EventKind, PlayerEvent};
use crate::state::session_state::{Reduction, SessionSnapshot, TurnSlot};

/// Receiving end of the re-fetch requests a store raises.
pub type RefetchRequests = mpsc::UnboundedReceiver<()>;

/// Cloneable handle to a session snapshot.
#[derive(Clone)]
pub struct SessionStore {
    snapshot: Arc<Mutex<SessionSnapshot>>,
    refetch: mpsc::UnboundedSender<()>,
    observer: Observer,
}

impl SessionStore {
    /// Create an empty store and the channel its re-fetch requests arrive on.
    pub fn new() -> (Self, RefetchRequests) {
        let snapshot = Arc::new(Mutex::new(SessionSnapshot::new()));
        let (refetch, requests) = mpsc::unbounded_channel();

        let observer = {
            let snapshot = Arc::clone(&snapshot);
            let refetch = refetch.clone();
            observer(move |event| {
                let reduction = snapshot
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner)
                    .apply(event);
                if reduction == Reduction::RefetchRequested {
                    tracing::debug!(event = %event.kind(), "Roster changed, requesting session re-fetch");
                    // Nobody listening means no sync service; nothing to do.
                    let _ = refetch.send(());
                }
                Ok(())
            })
        };

        (
            Self {
                snapshot,
                refetch,
                observer,
            },
            requests,
        )
    }

    /// Start folding events published on `bus` into this store.
    pub fn attach(&self, bus: &EventBus) {
        bus.subscribe_all(&EventKind::ALL, &self.observer);
    }

    pub fn detach(&self, bus: &EventBus) {
        for kind in EventKind::ALL {
            bus.unsubscribe(kind, &self.observer);
        }
    }

    /// Apply an event directly, bypassing the bus.
    pub fn apply(&self, event: &PlayerEvent) -> Reduction {
        let reduction = self.lock().apply(event);
        if reduction == Reduction::RefetchRequested {
            let _ = self.refetch.send(());
        }
        reduction
    }

    /// Install an authoritative copy of the session.
    pub fn replace_session(&self, data: SessionData) {
        self.lock().apply_session(data);
    }

    /// Copy of the current snapshot.
    pub fn snapshot(&self) -> SessionSnapshot {
        self.lock().clone()
    }

    /// Read the snapshot without cloning it.
    pub fn read<R>(&self, f: impl FnOnce(&SessionSnapshot) -> R) -> R {
        f(&self.lock())
    }

    pub fn display_turn_order(&self) -> Vec<TurnSlot> {
        self.lock().display_turn_order()
    }

    fn lock(&self) -> MutexGuard<'_, SessionSnapshot> {
        self.snapshot.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::testing::fixtures::session_data;
    use crate::ports::outbound::player_events::{ChatMessage, PlayerPresence};

    fn chat(text: &str) -> PlayerEvent {
        PlayerEvent::ChatMessage(ChatMessage {
            user_id: "u1".into(),
            username: "alice".into(),
            character_id: None,
            message: text.into(),
            timestamp: String::new(),
            in_character: false,
        })
    }

    #[test]
    fn attached_store_follows_the_bus() {
        let bus = EventBus::new();
        let (store, _requests) = SessionStore::new();
        store.attach(&bus);

        bus.publish(&chat("one"));
        bus.publish(&chat("two"));

        let messages: Vec<String> = store.read(|s| {
            s.transcript.iter().map(|e| e.message.clone()).collect()
        });
        assert_eq!(messages, vec!["one", "two"]);
    }

    #[test]
    fn attaching_twice_does_not_double_apply() {
        let bus = EventBus::new();
        let (store, _requests) = SessionStore::new();
        store.attach(&bus);
        store.clone().attach(&bus);

        bus.publish(&chat("once"));

        assert_eq!(store.snapshot().transcript.len(), 1);
    }

    #[test]
    fn detached_store_ignores_events() {
        let bus = EventBus::new();
        let (store, _requests) = SessionStore::new();
        store.attach(&bus);
        store.detach(&bus);

        bus.publish(&chat("ignored"));

        assert!(store.snapshot().transcript.is_empty());
        assert_eq!(bus.subscriber_count(EventKind::ChatMessage), 0);
    }

    #[test]
    fn membership_events_raise_refetch_requests() {
        let bus = EventBus::new();
        let (store, mut requests) = SessionStore::new();
        store.attach(&bus);

        bus.publish(&PlayerEvent::PlayerLeft(PlayerPresence::default()));

        assert!(requests.try_recv().is_ok());
        assert!(requests.try_recv().is_err());
    }

    #[test]
    fn replace_session_installs_roster() {
        let (store, _requests) = SessionStore::new();
        store.replace_session(session_data("s1"));

        let order: Vec<String> = store
            .display_turn_order()
            .into_iter()
            .map(|slot| slot.entry.character_id)
            .collect();
        assert_eq!(order, vec!["B", "A"]);
        assert_eq!(store.snapshot().players.len(), 1);
    }
}
