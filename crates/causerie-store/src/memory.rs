//! In-process document store with the same observable contract as a
//! managed backend: full snapshots on every change, array-union appends.
//!
//! Used by tests and local development. Conversations are registered
//! with [`MemoryDocumentStore::seed`]; the store never creates them on
//! its own, matching a backend where conversations exist before any
//! client subscribes.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use tokio::sync::mpsc;
use tracing::debug;
use uuid::Uuid;

use causerie_shared::types::{Conversation, ConversationId, Message};

use crate::document::{DocumentEvent, DocumentStore, Subscription, SubscriptionGuard};
use crate::error::{Result, StoreError};

type Documents = HashMap<ConversationId, DocumentState>;

struct DocumentState {
    conversation: Conversation,
    watchers: HashMap<Uuid, mpsc::UnboundedSender<DocumentEvent>>,
}

#[derive(Clone, Default)]
pub struct MemoryDocumentStore {
    inner: Arc<Mutex<Documents>>,
}

impl MemoryDocumentStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a conversation document, replacing any previous content.
    /// Existing subscribers receive the new snapshot.
    pub fn seed(&self, conversation: Conversation) {
        let mut docs = self.lock();
        let id = conversation.id.clone();
        let state = docs.entry(id.clone()).or_insert_with(|| DocumentState {
            conversation: Conversation::new(id.clone()),
            watchers: HashMap::new(),
        });
        state.conversation = conversation;
        Self::notify(state);
        debug!(conversation = %id, "Seeded conversation document");
    }

    /// Current content of a document, if it exists. Test helper; clients
    /// observe through subscriptions instead.
    pub fn conversation(&self, id: &ConversationId) -> Option<Conversation> {
        self.lock().get(id).map(|s| s.conversation.clone())
    }

    fn notify(state: &mut DocumentState) {
        let snapshot = state.conversation.clone();
        state.watchers.retain(|id, tx| {
            let alive = tx.send(DocumentEvent::Snapshot(snapshot.clone())).is_ok();
            if !alive {
                debug!(watcher = %id, "Dropping closed watcher");
            }
            alive
        });
    }

    fn lock(&self) -> MutexGuard<'_, Documents> {
        // Nothing panics while this lock is held.
        match self.inner.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

impl DocumentStore for MemoryDocumentStore {
    fn subscribe(&self, conversation: &ConversationId) -> Result<Subscription> {
        let mut docs = self.lock();
        let state = docs
            .get_mut(conversation)
            .ok_or_else(|| StoreError::NotFound(conversation.to_string()))?;

        let (tx, rx) = mpsc::unbounded_channel();
        // Initial snapshot is delivered before any later append is seen.
        let _ = tx.send(DocumentEvent::Snapshot(state.conversation.clone()));

        let watcher = Uuid::new_v4();
        state.watchers.insert(watcher, tx);
        debug!(conversation = %conversation, watcher = %watcher, "Subscription opened");

        let inner = self.inner.clone();
        let id = conversation.clone();
        let guard = SubscriptionGuard::new(move || {
            let mut docs = match inner.lock() {
                Ok(guard) => guard,
                Err(poisoned) => poisoned.into_inner(),
            };
            if let Some(state) = docs.get_mut(&id) {
                state.watchers.remove(&watcher);
                debug!(conversation = %id, watcher = %watcher, "Subscription closed");
            }
        });

        Ok(Subscription::new(rx, guard))
    }

    async fn append_message(&self, conversation: &ConversationId, message: Message) -> Result<()> {
        let mut docs = self.lock();
        let state = docs
            .get_mut(conversation)
            .ok_or_else(|| StoreError::NotFound(conversation.to_string()))?;

        // Array-union: an identical entry is a no-op, and nothing already
        // stored is touched.
        if state.conversation.messages.iter().any(|m| m == &message) {
            debug!(conversation = %conversation, id = %message.id, "Duplicate append ignored");
            return Ok(());
        }

        state.conversation.messages.push(message);
        Self::notify(state);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use causerie_shared::types::{MessageId, UserId};

    fn seeded() -> (MemoryDocumentStore, ConversationId) {
        let store = MemoryDocumentStore::new();
        let id = ConversationId::new("c1");
        store.seed(Conversation::new(id.clone()));
        (store, id)
    }

    #[tokio::test]
    async fn test_subscribe_unknown_conversation_fails() {
        let store = MemoryDocumentStore::new();
        assert!(store.subscribe(&ConversationId::new("missing")).is_err());
    }

    #[tokio::test]
    async fn test_initial_snapshot_delivered() {
        let (store, id) = seeded();
        let mut sub = store.subscribe(&id).expect("subscribe");

        match sub.next_event().await {
            Some(DocumentEvent::Snapshot(conv)) => {
                assert_eq!(conv.id, id);
                assert!(conv.messages.is_empty());
            }
            other => panic!("expected initial snapshot, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_appends_notify_in_order() {
        let (store, id) = seeded();
        let mut sub = store.subscribe(&id).expect("subscribe");
        let _ = sub.next_event().await; // initial

        let author = UserId::new("u1");
        let first = Message::text(&author, "one");
        let mut second = Message::text(&author, "two");
        second.id = MessageId(first.id.0 + 1);

        store.append_message(&id, first.clone()).await.expect("append");
        store.append_message(&id, second.clone()).await.expect("append");

        match sub.next_event().await {
            Some(DocumentEvent::Snapshot(conv)) => assert_eq!(conv.messages, vec![first.clone()]),
            other => panic!("unexpected event {other:?}"),
        }
        match sub.next_event().await {
            Some(DocumentEvent::Snapshot(conv)) => {
                assert_eq!(conv.messages, vec![first, second]);
            }
            other => panic!("unexpected event {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_duplicate_append_is_noop() {
        let (store, id) = seeded();
        let msg = Message::text(&UserId::new("u1"), "hello");

        store.append_message(&id, msg.clone()).await.expect("append");
        store.append_message(&id, msg.clone()).await.expect("append");

        let conv = store.conversation(&id).expect("exists");
        assert_eq!(conv.messages, vec![msg]);
    }

    #[tokio::test]
    async fn test_append_unknown_conversation_fails() {
        let store = MemoryDocumentStore::new();
        let msg = Message::text(&UserId::new("u1"), "hello");
        let result = store
            .append_message(&ConversationId::new("missing"), msg)
            .await;
        assert!(matches!(result, Err(StoreError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_dropped_subscription_stops_notifications() {
        let (store, id) = seeded();
        let sub = store.subscribe(&id).expect("subscribe");
        drop(sub);

        // The watcher is unregistered; appends no longer fan out to it.
        store
            .append_message(&id, Message::text(&UserId::new("u1"), "hi"))
            .await
            .expect("append");

        let docs = store.lock();
        let state = docs.get(&id).expect("doc exists");
        assert!(state.watchers.is_empty());
    }
}
