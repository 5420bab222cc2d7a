use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::ChannelError;

/// Bare-text keep-alive request. Deliberately not JSON.
pub const PING_FRAME: &str = "ping";
/// Frame type the server answers a ping with.
pub const PONG_TYPE: &str = "pong";
/// Frame type acknowledging a successful subscription.
pub const CONNECTED_TYPE: &str = "connected";

/// Inbound frame envelope: `{"type": ..., "data": {...}}`.
///
/// `data` is optional; acknowledgement-style frames carry their extras as
/// top-level fields, which are ignored here.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct InboundFrame {
    #[serde(rename = "type")]
    pub frame_type: String,
    #[serde(default)]
    pub data: Option<Value>,
}

impl InboundFrame {
    /// Decode one raw text frame.
    ///
    /// A malformed frame is an error for this frame only; the caller
    /// discards it and keeps the connection.
    pub fn parse(text: &str) -> Result<Self, ChannelError> {
        serde_json::from_str(text).map_err(|err| ChannelError::Parse(err.to_string()))
    }
}

/// Outbound content frame written by `send`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutboundContent {
    pub content: String,
    pub has_attachment: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub attachment_ref: Option<String>,
}

impl OutboundContent {
    pub fn text(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            has_attachment: false,
            attachment_ref: None,
        }
    }

    pub fn with_attachment(content: impl Into<String>, attachment_ref: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            has_attachment: true,
            attachment_ref: Some(attachment_ref.into()),
        }
    }

    /// Serialize into the channel's wire format.
    pub fn to_frame(&self) -> Result<String, ChannelError> {
        serde_json::to_string(self).map_err(|err| ChannelError::Parse(err.to_string()))
    }
}
