use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A single item received over a channel.
///
/// Identity is the server-assigned `id`: two messages with the same `id`
/// are the same logical event regardless of payload differences. Messages
/// are never mutated after creation; the store drops them only on an
/// explicit clear.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChannelMessage {
    /// Server-assigned message ID, unique within a channel.
    pub id: i64,
    /// Ordering key, typically the server-side creation timestamp.
    pub sequence_key: String,
    /// Full decoded frame payload, kept opaque to this crate.
    pub payload: Value,
}

impl ChannelMessage {
    pub fn new(id: i64, sequence_key: impl Into<String>, payload: Value) -> Self {
        Self {
            id,
            sequence_key: sequence_key.into(),
            payload,
        }
    }
}

/// Logical target of a channel connection: a channel key (for example a
/// job ID, or `dashboard`) plus an optional sub-scope (for example an
/// application ID).
///
/// A subscription is replaced wholesale by the next `connect` call and
/// cleared by `disconnect`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelSubscription {
    /// Channel key appended to the endpoint path.
    pub channel_key: String,
    /// Optional sub-scope carried as a query parameter.
    pub scope: Option<String>,
}

impl ChannelSubscription {
    pub fn new(channel_key: impl Into<String>) -> Self {
        Self {
            channel_key: channel_key.into(),
            scope: None,
        }
    }

    pub fn with_scope(channel_key: impl Into<String>, scope: impl Into<String>) -> Self {
        Self {
            channel_key: channel_key.into(),
            scope: Some(scope.into()),
        }
    }

    /// Path-and-query suffix for the connection target, relative to the
    /// configured endpoint base.
    pub fn request_path(&self) -> String {
        match &self.scope {
            Some(scope) => format!("{}?scope={}", self.channel_key, scope),
            None => self.channel_key.clone(),
        }
    }
}
