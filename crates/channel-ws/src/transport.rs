use std::future::Future;

use tokio::sync::mpsc;

use channel_core::ChannelError;

/// Normal-closure code per RFC 6455.
pub const CLOSE_NORMAL: u16 = 1000;

/// Connection request handed to a transport.
///
/// The bearer token travels in the `Authorization` header, never in the
/// target, so request logs and proxies do not see it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectRequest {
    pub target: String,
    pub headers: Vec<(String, String)>,
}

/// Lifecycle and frame events surfaced by an open connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    /// A text frame arrived.
    Frame(String),
    /// The connection closed; [`CLOSE_NORMAL`] marks a graceful closure.
    Closed { code: Option<u16>, reason: String },
    /// The connection failed. `status` carries the HTTP status of a
    /// rejected handshake when the transport saw one.
    Failed {
        status: Option<u16>,
        message: String,
    },
}

/// Frames written by the client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutboundFrame {
    Text(String),
    /// Request a graceful close with the normal-closure code.
    Close,
}

/// A live connection: the writer half plus the inbound event stream.
///
/// Dropping `outbound` is equivalent to requesting a graceful close.
#[derive(Debug)]
pub struct TransportHandle {
    pub outbound: mpsc::Sender<OutboundFrame>,
    pub events: mpsc::Receiver<TransportEvent>,
}

/// Opens channel connections.
///
/// `open` resolving `Ok` means the handshake completed; everything that
/// happens afterwards arrives as [`TransportEvent`]s.
pub trait ChannelTransport: Send + Sync + 'static {
    fn open(
        &self,
        request: ConnectRequest,
    ) -> impl Future<Output = Result<TransportHandle, ChannelError>> + Send;
}
