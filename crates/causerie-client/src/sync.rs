//! Realtime synchronization of one conversation.
//!
//! The synchronizer holds at most one live store subscription. A pump
//! task drains the subscription's event stream into a `watch` channel
//! with replace-the-view semantics: every applied snapshot replaces the
//! whole message list, in delivery order, last snapshot wins. Snapshots
//! from a superseded activation are discarded via an epoch check done
//! under the same lock that guards the active subscription.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use serde::Serialize;
use tokio::sync::watch;
use tracing::{debug, info, warn};

use causerie_shared::types::{ConversationId, Message, MessageKind, User};
use causerie_shared::{SendError, SyncError};

use causerie_store::{DocumentEvent, DocumentStore, SubscriptionGuard};

/// Where the synchronizer currently stands with the backend.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase", tag = "status", content = "detail")]
pub enum SyncStatus {
    /// No subscription; the local view is empty.
    Inactive,

    /// Live subscription for the contained conversation.
    Active(ConversationId),

    /// The subscription reported an error. Re-activation retries.
    Failed(String),
}

struct ActiveSubscription {
    conversation: ConversationId,
    epoch: u64,
    _guard: SubscriptionGuard,
}

pub struct ConversationSync<D: DocumentStore> {
    store: Arc<D>,
    session: watch::Receiver<Option<User>>,
    view: Arc<watch::Sender<Vec<Message>>>,
    status: Arc<watch::Sender<SyncStatus>>,
    active: Arc<Mutex<Option<ActiveSubscription>>>,
    next_epoch: AtomicU64,
}

impl<D: DocumentStore> ConversationSync<D> {
    pub fn new(store: Arc<D>, session: watch::Receiver<Option<User>>) -> Self {
        let (view, _) = watch::channel(Vec::new());
        let (status, _) = watch::channel(SyncStatus::Inactive);
        Self {
            store,
            session,
            view: Arc::new(view),
            status: Arc::new(status),
            active: Arc::new(Mutex::new(None)),
            next_epoch: AtomicU64::new(0),
        }
    }

    /// Replace-the-view observer: the full ordered message list after
    /// every applied snapshot, cleared on deactivation.
    pub fn watch_view(&self) -> watch::Receiver<Vec<Message>> {
        self.view.subscribe()
    }

    pub fn watch_status(&self) -> watch::Receiver<SyncStatus> {
        self.status.subscribe()
    }

    /// Current local view.
    pub fn messages(&self) -> Vec<Message> {
        self.view.borrow().clone()
    }

    /// Open the live subscription for `conversation`.
    ///
    /// Idempotent while already active for the same id; for a different
    /// id the previous subscription is torn down first.
    pub fn activate(&self, conversation: ConversationId) -> Result<(), SyncError> {
        let mut active = lock_active(&self.active);
        if let Some(current) = active.as_ref() {
            if current.conversation == conversation {
                debug!(conversation = %conversation, "Already active");
                return Ok(());
            }
        }

        // Tear down the previous subscription; its pump sees a stale
        // epoch from here on.
        *active = None;
        let epoch = self.next_epoch.fetch_add(1, Ordering::SeqCst) + 1;

        let subscription = match self.store.subscribe(&conversation) {
            Ok(subscription) => subscription,
            Err(e) => {
                let err = SyncError::Subscribe(e.to_string());
                warn!(conversation = %conversation, error = %e, "Subscription failed");
                self.status.send_replace(SyncStatus::Failed(err.to_string()));
                return Err(err);
            }
        };
        let (mut events, guard) = subscription.into_parts();

        *active = Some(ActiveSubscription {
            conversation: conversation.clone(),
            epoch,
            _guard: guard,
        });
        self.status
            .send_replace(SyncStatus::Active(conversation.clone()));
        info!(conversation = %conversation, "Subscription opened");

        let view = self.view.clone();
        let status = self.status.clone();
        let active_slot = self.active.clone();
        tokio::spawn(async move {
            while let Some(event) = events.recv().await {
                let slot = lock_active(&active_slot);
                if slot.as_ref().map(|a| a.epoch) != Some(epoch) {
                    debug!(conversation = %conversation, "Discarding event from a stale subscription");
                    break;
                }
                match event {
                    DocumentEvent::Snapshot(snapshot) => {
                        debug!(
                            conversation = %conversation,
                            messages = snapshot.messages.len(),
                            "Applying snapshot"
                        );
                        view.send_replace(snapshot.messages);
                    }
                    DocumentEvent::Error(message) => {
                        warn!(conversation = %conversation, error = %message, "Snapshot stream error");
                        status.send_replace(SyncStatus::Failed(message));
                    }
                }
            }
            debug!(conversation = %conversation, "Snapshot pump finished");
        });

        Ok(())
    }

    /// Cancel the subscription and clear the local view.
    pub fn deactivate(&self) {
        let mut active = lock_active(&self.active);
        if active.take().is_some() {
            self.view.send_replace(Vec::new());
            self.status.send_replace(SyncStatus::Inactive);
            info!("Subscription closed, view cleared");
        }
    }

    /// Append a message authored by `author` to the active conversation.
    ///
    /// Returns once the store acknowledges the write. The local view is
    /// not spliced here: the authoritative list arrives through the
    /// subscription, so there is a brief window between the ack and the
    /// message becoming visible.
    pub async fn send(
        &self,
        author: &User,
        content: &str,
        kind: MessageKind,
    ) -> Result<Message, SendError> {
        let conversation = {
            let active = lock_active(&self.active);
            match active.as_ref() {
                Some(a) => a.conversation.clone(),
                None => return Err(SendError::NotActive),
            }
        };

        // The session may have changed under an operation that started
        // earlier, e.g. an upload finishing after sign-out.
        let signed_in = self.session.borrow().as_ref().map(|u| u.id.clone());
        if signed_in.as_ref() != Some(&author.id) {
            warn!(author = %author.id, "Rejecting send for a stale session");
            return Err(SendError::StaleSession);
        }

        let message = Message::new(&author.id, kind, content);
        self.store
            .append_message(&conversation, message.clone())
            .await
            .map_err(|e| {
                warn!(conversation = %conversation, error = %e, "Append failed");
                SendError::Append(e.to_string())
            })?;

        info!(id = %message.id, conversation = %conversation, kind = ?kind, "Message appended");
        Ok(message)
    }
}

fn lock_active(
    active: &Arc<Mutex<Option<ActiveSubscription>>>,
) -> MutexGuard<'_, Option<ActiveSubscription>> {
    // Nothing panics while this lock is held.
    match active.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}
