//! Conversation document storage with change notifications.
//!
//! Backends push full snapshots, in emission order, through a
//! per-subscriber channel; the subscription is cancelled by dropping its
//! handle. This replaces nested SDK callbacks with an explicit
//! subscribe/unsubscribe surface.

use std::future::Future;

use tokio::sync::mpsc;

use causerie_shared::types::{Conversation, ConversationId, Message};

use crate::error::Result;

/// A change notification delivered to one subscriber.
#[derive(Debug, Clone)]
pub enum DocumentEvent {
    /// Full authoritative copy of the conversation document.
    Snapshot(Conversation),

    /// The backend reported a stream error. The subscription stays
    /// registered; callers decide whether to tear down and re-subscribe.
    Error(String),
}

/// Live subscription to one conversation document.
///
/// Events arrive in the order the store emits them. Dropping the
/// subscription (or its guard) unregisters the watcher.
pub struct Subscription {
    events: mpsc::UnboundedReceiver<DocumentEvent>,
    guard: SubscriptionGuard,
}

impl Subscription {
    pub fn new(events: mpsc::UnboundedReceiver<DocumentEvent>, guard: SubscriptionGuard) -> Self {
        Self { events, guard }
    }

    /// Next event, or `None` once the backend dropped its sender.
    pub async fn next_event(&mut self) -> Option<DocumentEvent> {
        self.events.recv().await
    }

    /// Split into the raw event stream and the cancellation guard, so the
    /// stream can be moved into a pump task while the guard stays with
    /// whoever owns the subscription's lifetime.
    pub fn into_parts(self) -> (mpsc::UnboundedReceiver<DocumentEvent>, SubscriptionGuard) {
        (self.events, self.guard)
    }
}

/// Cancels a subscription when dropped.
pub struct SubscriptionGuard {
    cancel: Option<Box<dyn FnOnce() + Send>>,
}

impl SubscriptionGuard {
    pub fn new(cancel: impl FnOnce() + Send + 'static) -> Self {
        Self {
            cancel: Some(Box::new(cancel)),
        }
    }
}

impl Drop for SubscriptionGuard {
    fn drop(&mut self) {
        if let Some(cancel) = self.cancel.take() {
            cancel();
        }
    }
}

impl std::fmt::Debug for SubscriptionGuard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SubscriptionGuard")
            .field("armed", &self.cancel.is_some())
            .finish()
    }
}

/// Durable conversation storage with change notifications.
pub trait DocumentStore: Send + Sync + 'static {
    /// Open a live subscription. The current snapshot is delivered
    /// immediately, then one event per change, in order.
    fn subscribe(&self, conversation: &ConversationId) -> Result<Subscription>;

    /// Append one message to the conversation's message array.
    ///
    /// Array-union semantics: appending an item that already exists is a
    /// no-op, and existing entries are never overwritten or reordered.
    fn append_message(
        &self,
        conversation: &ConversationId,
        message: Message,
    ) -> impl Future<Output = Result<()>> + Send;
}
