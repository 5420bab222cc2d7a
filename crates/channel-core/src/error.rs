use thiserror::Error;

use crate::state::ConnectionState;

/// Errors produced by the channel subsystem.
///
/// None of these propagate as panics; every failure ultimately resolves
/// into an observable [`ConnectionState`] value.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ChannelError {
    /// The credential provider yielded no token before a connection attempt.
    #[error("no credential available for channel connection")]
    NoCredential,

    /// The server rejected the connection for authentication/authorization
    /// reasons. Retrying cannot fix this without re-authentication.
    #[error("authorization rejected (status {status:?}): {message}")]
    AuthRejected {
        status: Option<u16>,
        message: String,
    },

    /// The transport timed out while connecting or transmitting.
    #[error("transport timeout: {0}")]
    Timeout(String),

    /// The remote end refused the connection.
    #[error("connection refused: {0}")]
    Refused(String),

    /// The connection terminated without a normal closure.
    #[error("abnormal close (code {code:?}): {reason}")]
    AbnormalClose { code: Option<u16>, reason: String },

    /// An inbound frame could not be decoded. The frame is discarded; the
    /// connection stays up.
    #[error("malformed frame: {0}")]
    Parse(String),

    /// The automatic retry budget was spent; a manual `connect` is required.
    #[error("automatic retries exhausted after {failures} consecutive failures")]
    RetryExhausted { failures: u32 },

    /// An operation required a live connection and none exists.
    #[error("not connected to any channel")]
    NotConnected,

    /// A connection-state transition was requested that the lifecycle
    /// graph does not allow.
    #[error("cannot {action} while connection is {from:?}")]
    InvalidTransition {
        from: ConnectionState,
        action: String,
    },

    /// Any other transport-level failure.
    #[error("transport failure: {0}")]
    Transport(String),

    /// The writer half of the transport is gone.
    #[error("transport channel closed")]
    ChannelClosed,
}

impl ChannelError {
    pub fn invalid_transition(from: ConnectionState, action: impl Into<String>) -> Self {
        ChannelError::InvalidTransition {
            from,
            action: action.into(),
        }
    }

    /// Map a transport-reported failure into the error taxonomy.
    ///
    /// `status` carries the HTTP status of a rejected handshake when the
    /// transport saw one. 401/403 (or an explicit forbidden signal in the
    /// message, which is all some transports surface) means the token was
    /// rejected; other failures are assumed recoverable.
    pub fn from_transport_failure(status: Option<u16>, message: impl Into<String>) -> Self {
        let message = message.into();
        if matches!(status, Some(401) | Some(403)) || is_forbidden_signal(&message) {
            return ChannelError::AuthRejected { status, message };
        }

        let lowered = message.to_ascii_lowercase();
        if lowered.contains("timed out") || lowered.contains("timeout") {
            ChannelError::Timeout(message)
        } else if lowered.contains("refused") {
            ChannelError::Refused(message)
        } else {
            ChannelError::Transport(message)
        }
    }
}

fn is_forbidden_signal(message: &str) -> bool {
    let lowered = message.to_ascii_lowercase();
    lowered.contains("403") || lowered.contains("forbidden") || lowered.contains("unauthorized")
}
