use serde_json::Value;
use tokio::sync::broadcast;

use crate::types::ChannelMessage;

/// One-shot event stream handed to observers.
pub type EventStream = broadcast::Receiver<ChannelEvent>;

/// An event fanned out to live observers as frames arrive.
#[derive(Debug, Clone, PartialEq)]
pub enum ChannelEvent {
    /// A content-bearing message (also added to the store).
    Message(ChannelMessage),
    /// A recognized emit-only frame, or an unknown frame forwarded
    /// verbatim so forward-compatible server additions are not lost.
    Notification { kind: String, data: Value },
}

/// Best-effort fan-out of newly arrived events to active observers.
///
/// There is no replay: an observer that subscribes after an emission does
/// not see it. A short burst is buffered per observer; beyond capacity the
/// oldest buffered event is dropped rather than blocking the producer, so
/// a slow or absent observer can never stall the read loop.
#[derive(Debug, Clone)]
pub struct EventEmitter {
    tx: broadcast::Sender<ChannelEvent>,
}

impl EventEmitter {
    pub const DEFAULT_CAPACITY: usize = 10;

    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    pub fn subscribe(&self) -> EventStream {
        self.tx.subscribe()
    }

    /// Deliver to all current observers; never blocks, never fails.
    pub fn emit(&self, event: ChannelEvent) {
        let _ = self.tx.send(event);
    }

    pub fn receiver_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl Default for EventEmitter {
    fn default() -> Self {
        Self::new(Self::DEFAULT_CAPACITY)
    }
}
