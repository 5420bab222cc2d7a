use serde_json::Value;

use crate::error::ChannelError;
use crate::frame::{CONNECTED_TYPE, PONG_TYPE};
use crate::types::ChannelMessage;

/// What the client does with a frame of a given type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameDisposition {
    /// Decode `data` into a message, add it to the store, then emit it.
    Content,
    /// Emit to observers without touching the store.
    Notify,
    /// Connection acknowledgement; nothing further to do.
    Ack,
    /// Keep-alive reply; informational only.
    Pong,
    /// Unrecognized type: logged, then still forwarded to observers.
    Unknown,
}

/// Per-channel-kind strategy mapping frame types to actions.
///
/// One generic client serves every channel kind; only this mapping (and
/// optionally the content decoding) differs between them.
pub trait FrameRouting: Send + Sync {
    fn dispose(&self, frame_type: &str) -> FrameDisposition;

    /// Decode a content-bearing frame's `data` into a message.
    ///
    /// The default expects an integer `id` for identity and a string
    /// `created_at` as the ordering key.
    fn content_message(&self, data: &Value) -> Result<ChannelMessage, ChannelError> {
        message_from_data(data)
    }
}

/// Default `data` decoding shared by the provided strategies.
pub fn message_from_data(data: &Value) -> Result<ChannelMessage, ChannelError> {
    let id = data
        .get("id")
        .and_then(Value::as_i64)
        .ok_or_else(|| ChannelError::Parse("content frame data lacks an integer 'id'".to_owned()))?;
    let sequence_key = data
        .get("created_at")
        .and_then(Value::as_str)
        .ok_or_else(|| ChannelError::Parse("content frame data lacks 'created_at'".to_owned()))?
        .to_owned();

    Ok(ChannelMessage::new(id, sequence_key, data.clone()))
}

/// Routing for a per-job chat channel.
#[derive(Debug, Clone, Copy, Default)]
pub struct ChatRouting;

impl FrameRouting for ChatRouting {
    fn dispose(&self, frame_type: &str) -> FrameDisposition {
        match frame_type {
            "message" => FrameDisposition::Content,
            CONNECTED_TYPE => FrameDisposition::Ack,
            PONG_TYPE => FrameDisposition::Pong,
            _ => FrameDisposition::Unknown,
        }
    }
}

/// Routing for the account-wide dashboard notification channel.
#[derive(Debug, Clone, Copy, Default)]
pub struct DashboardRouting;

impl FrameRouting for DashboardRouting {
    fn dispose(&self, frame_type: &str) -> FrameDisposition {
        match frame_type {
            "new_message" | "new_application" => FrameDisposition::Notify,
            CONNECTED_TYPE => FrameDisposition::Ack,
            PONG_TYPE => FrameDisposition::Pong,
            _ => FrameDisposition::Unknown,
        }
    }
}
