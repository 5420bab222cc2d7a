//! Core contracts for the real-time channel client.
//!
//! This crate holds the pure, transport-free pieces: the connection-state
//! machine, backoff/failure policy, the ordered message store, the
//! one-shot event emitter, wire frames and per-channel frame routing.

/// Reconnect delay policy and failure tracking.
pub mod backoff;
/// Best-effort event fan-out to active observers.
pub mod emitter;
/// Channel error taxonomy.
pub mod error;
/// Wire frame types.
pub mod frame;
/// Frame-type routing strategies.
pub mod routing;
/// Connection lifecycle state machine.
pub mod state;
/// Ordered, deduplicated message store.
pub mod store;
/// Domain types shared across the client.
pub mod types;

pub use backoff::{BackoffPolicy, FailureClass, FailureRecord};
pub use emitter::{ChannelEvent, EventEmitter, EventStream};
pub use error::ChannelError;
pub use frame::{InboundFrame, OutboundContent, CONNECTED_TYPE, PING_FRAME, PONG_TYPE};
pub use routing::{message_from_data, ChatRouting, DashboardRouting, FrameDisposition, FrameRouting};
pub use state::{ConnectionState, ConnectionStateMachine};
pub use store::{MessageSnapshot, MessageStore};
pub use types::{ChannelMessage, ChannelSubscription};
