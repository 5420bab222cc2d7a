use std::sync::Arc;

use tokio::sync::watch;

use crate::types::ChannelMessage;

/// Immutable view of the store published to observers.
pub type MessageSnapshot = Arc<Vec<ChannelMessage>>;

/// Ordered, deduplicated in-memory collection of received messages.
///
/// Every mutation swaps in a fresh snapshot through a `watch` channel, so
/// readers never observe a partially-updated collection and need no lock
/// of their own. The observable sequence is always sorted ascending by
/// `sequence_key` and contains each `id` at most once.
#[derive(Debug)]
pub struct MessageStore {
    tx: watch::Sender<MessageSnapshot>,
}

impl MessageStore {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(MessageSnapshot::default());
        Self { tx }
    }

    /// Insert one message; a duplicate `id` is a no-op.
    ///
    /// Returns whether the message was actually inserted.
    pub fn add(&self, message: ChannelMessage) -> bool {
        self.add_batch(vec![message]) == 1
    }

    /// Insert a batch in one pass, deduplicating against the store and
    /// within the batch. Ties in `sequence_key` keep their original
    /// relative order. Returns the number of messages inserted.
    pub fn add_batch(&self, messages: Vec<ChannelMessage>) -> usize {
        let mut added = 0;
        self.tx.send_if_modified(|snapshot| {
            let mut items: Vec<ChannelMessage> = snapshot.as_ref().clone();
            for message in messages {
                if items.iter().any(|existing| existing.id == message.id) {
                    continue;
                }
                items.push(message);
                added += 1;
            }
            if added == 0 {
                return false;
            }
            // Stable sort: equal keys stay in insertion order.
            items.sort_by(|a, b| a.sequence_key.cmp(&b.sequence_key));
            *snapshot = Arc::new(items);
            true
        });
        added
    }

    /// Drop everything, e.g. when a reconnect starts a fresh session.
    pub fn clear(&self) {
        self.tx.send_if_modified(|snapshot| {
            if snapshot.is_empty() {
                return false;
            }
            *snapshot = MessageSnapshot::default();
            true
        });
    }

    /// Current view; cheap to take and safe to iterate while writers run.
    pub fn snapshot(&self) -> MessageSnapshot {
        self.tx.borrow().clone()
    }

    /// Continuously-updated observable view.
    pub fn subscribe(&self) -> watch::Receiver<MessageSnapshot> {
        self.tx.subscribe()
    }

    pub fn len(&self) -> usize {
        self.tx.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.tx.borrow().is_empty()
    }
}

impl Default for MessageStore {
    fn default() -> Self {
        Self::new()
    }
}
