//! WebSocket channel client runtime.
//!
//! [`client::ChannelClient`] orchestrates the connection lifecycle over a
//! pluggable [`transport::ChannelTransport`]; [`ws::WsTransport`] is the
//! production tokio-tungstenite implementation.

/// Channel client orchestration: lifecycle, keep-alive, reconnection.
pub mod client;
/// Bearer-token credential seam.
pub mod credentials;
/// Transport abstraction used by the client.
pub mod transport;
/// tokio-tungstenite transport implementation.
pub mod ws;

#[cfg(test)]
pub(crate) mod testing;

pub use client::{ChannelClient, ChannelClientConfig};
pub use credentials::{CredentialProvider, StaticCredentialProvider};
pub use transport::{
    ChannelTransport, ConnectRequest, OutboundFrame, TransportEvent, TransportHandle, CLOSE_NORMAL,
};
pub use ws::WsTransport;
