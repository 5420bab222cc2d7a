use serde::{Deserialize, Serialize};

use crate::error::ChannelError;

/// Connection lifecycle state observed (read-only) by callers.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConnectionState {
    /// Not connected; no attempt in flight.
    #[default]
    Disconnected,
    /// A connection attempt is in flight.
    Connecting,
    /// Handshake completed; frames are flowing.
    Connected,
    /// The last attempt or connection failed.
    Error,
}

/// Enforces the legal connection-state transition graph.
///
/// Transitions are serialized by the owner; this type only validates that
/// no step is skipped (in particular, Disconnected can never jump straight
/// to Connected).
#[derive(Debug, Clone, Default)]
pub struct ConnectionStateMachine {
    state: ConnectionState,
}

impl ConnectionStateMachine {
    pub fn state(&self) -> ConnectionState {
        self.state
    }

    /// Disconnected/Error → Connecting, on a connect call or a retry.
    pub fn begin_connect(&mut self) -> Result<ConnectionState, ChannelError> {
        self.transition_from_any_of(
            &[ConnectionState::Disconnected, ConnectionState::Error],
            ConnectionState::Connecting,
            "begin a connection attempt",
        )
    }

    /// Connecting → Connected, on handshake success.
    pub fn handshake_succeeded(&mut self) -> Result<ConnectionState, ChannelError> {
        self.transition_from_any_of(
            &[ConnectionState::Connecting],
            ConnectionState::Connected,
            "complete the handshake",
        )
    }

    /// Connecting/Connected → Error, on handshake failure, abnormal close
    /// or a transport exception.
    pub fn connection_failed(&mut self) -> Result<ConnectionState, ChannelError> {
        self.transition_from_any_of(
            &[ConnectionState::Connecting, ConnectionState::Connected],
            ConnectionState::Error,
            "record a connection failure",
        )
    }

    /// Connected → Disconnected, on a graceful close by either side.
    pub fn closed_gracefully(&mut self) -> Result<ConnectionState, ChannelError> {
        self.transition_from_any_of(
            &[ConnectionState::Connected],
            ConnectionState::Disconnected,
            "close gracefully",
        )
    }

    /// Any state → Disconnected, on an explicit disconnect.
    pub fn disconnected(&mut self) -> ConnectionState {
        self.state = ConnectionState::Disconnected;
        self.state
    }

    fn transition_from_any_of(
        &mut self,
        expected: &[ConnectionState],
        next: ConnectionState,
        action: &str,
    ) -> Result<ConnectionState, ChannelError> {
        if !expected.contains(&self.state) {
            return Err(ChannelError::invalid_transition(self.state, action));
        }
        self.state = next;
        Ok(next)
    }
}
