use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite;
use tokio_tungstenite::tungstenite::http::{HeaderName, HeaderValue, Request};
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, warn};
use url::Url;

use channel_core::ChannelError;

use crate::transport::{
    ChannelTransport, ConnectRequest, OutboundFrame, TransportEvent, TransportHandle,
};

const OUTBOUND_BUFFER: usize = 16;
const EVENT_BUFFER: usize = 64;

/// WebSocket transport over `tokio-tungstenite`.
///
/// `open` performs the handshake; a spawned bridge task then shuttles
/// frames between the socket and the handle's channels until either side
/// goes away.
#[derive(Debug, Clone, Copy, Default)]
pub struct WsTransport;

impl ChannelTransport for WsTransport {
    fn open(
        &self,
        request: ConnectRequest,
    ) -> impl std::future::Future<Output = Result<TransportHandle, ChannelError>> + Send {
        async move {
            let client_request = build_handshake_request(&request)?;
            let (stream, _response) = connect_async(client_request)
                .await
                .map_err(map_handshake_error)?;
            debug!(target = %request.target, "websocket handshake completed");

            let (mut write, mut read) = stream.split();
            let (outbound_tx, mut outbound_rx) = mpsc::channel::<OutboundFrame>(OUTBOUND_BUFFER);
            let (event_tx, event_rx) = mpsc::channel::<TransportEvent>(EVENT_BUFFER);

            tokio::spawn(async move {
                loop {
                    tokio::select! {
                        frame = outbound_rx.recv() => match frame {
                            Some(OutboundFrame::Text(text)) => {
                                if let Err(err) = write.send(Message::Text(text)).await {
                                    let _ = event_tx
                                        .send(TransportEvent::Failed {
                                            status: None,
                                            message: err.to_string(),
                                        })
                                        .await;
                                    break;
                                }
                            }
                            Some(OutboundFrame::Close) | None => {
                                let close = CloseFrame {
                                    code: CloseCode::Normal,
                                    reason: "client disconnect".into(),
                                };
                                let _ = write.send(Message::Close(Some(close))).await;
                                break;
                            }
                        },
                        message = read.next() => match message {
                            Some(Ok(Message::Text(text))) => {
                                if event_tx.send(TransportEvent::Frame(text)).await.is_err() {
                                    break;
                                }
                            }
                            Some(Ok(Message::Binary(bytes))) => match String::from_utf8(bytes) {
                                Ok(text) => {
                                    if event_tx.send(TransportEvent::Frame(text)).await.is_err() {
                                        break;
                                    }
                                }
                                Err(_) => warn!("dropping non-utf8 binary frame"),
                            },
                            Some(Ok(Message::Close(frame))) => {
                                let (code, reason) = match frame {
                                    Some(frame) => {
                                        (Some(u16::from(frame.code)), frame.reason.to_string())
                                    }
                                    None => (None, String::new()),
                                };
                                let _ = event_tx.send(TransportEvent::Closed { code, reason }).await;
                                break;
                            }
                            // Protocol pings are answered by tungstenite itself.
                            Some(Ok(_)) => {}
                            Some(Err(err)) => {
                                let _ = event_tx
                                    .send(TransportEvent::Failed {
                                        status: None,
                                        message: err.to_string(),
                                    })
                                    .await;
                                break;
                            }
                            None => {
                                let _ = event_tx
                                    .send(TransportEvent::Closed {
                                        code: None,
                                        reason: "stream ended".to_owned(),
                                    })
                                    .await;
                                break;
                            }
                        },
                    }
                }
            });

            Ok(TransportHandle {
                outbound: outbound_tx,
                events: event_rx,
            })
        }
    }
}

/// Rewrite `http`/`https` endpoints to `ws`/`wss` and validate the target.
fn websocket_url(target: &str) -> Result<Url, ChannelError> {
    let mut url =
        Url::parse(target).map_err(|err| ChannelError::Transport(format!("invalid target: {err}")))?;
    let scheme = match url.scheme() {
        "http" => Some("ws"),
        "https" => Some("wss"),
        "ws" | "wss" => None,
        other => {
            return Err(ChannelError::Transport(format!(
                "unsupported target scheme '{other}'"
            )))
        }
    };
    if let Some(scheme) = scheme {
        url.set_scheme(scheme)
            .map_err(|_| ChannelError::Transport("failed to rewrite target scheme".to_owned()))?;
    }
    Ok(url)
}

fn build_handshake_request(request: &ConnectRequest) -> Result<Request<()>, ChannelError> {
    use tokio_tungstenite::tungstenite::client::IntoClientRequest;

    let url = websocket_url(&request.target)?;
    let mut client_request = url
        .as_str()
        .into_client_request()
        .map_err(|err| ChannelError::Transport(err.to_string()))?;

    let headers = client_request.headers_mut();
    for (name, value) in &request.headers {
        let name = HeaderName::from_bytes(name.as_bytes())
            .map_err(|err| ChannelError::Transport(format!("invalid header name: {err}")))?;
        let value = HeaderValue::from_str(value)
            .map_err(|err| ChannelError::Transport(format!("invalid header value: {err}")))?;
        headers.insert(name, value);
    }

    Ok(client_request)
}

fn map_handshake_error(err: tungstenite::Error) -> ChannelError {
    match err {
        tungstenite::Error::Http(response) => {
            let status = response.status().as_u16();
            ChannelError::from_transport_failure(
                Some(status),
                format!("handshake rejected with status {status}"),
            )
        }
        tungstenite::Error::Io(io) => match io.kind() {
            std::io::ErrorKind::TimedOut => ChannelError::Timeout(io.to_string()),
            std::io::ErrorKind::ConnectionRefused => ChannelError::Refused(io.to_string()),
            _ => ChannelError::Transport(io.to_string()),
        },
        other => ChannelError::Transport(other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rewrites_http_schemes_to_websocket() {
        assert_eq!(
            websocket_url("http://localhost:8000/api/chat/ws/42")
                .expect("valid url")
                .as_str(),
            "ws://localhost:8000/api/chat/ws/42"
        );
        assert_eq!(
            websocket_url("https://api.example.com/ws")
                .expect("valid url")
                .scheme(),
            "wss"
        );
    }

    #[test]
    fn keeps_websocket_schemes() {
        assert_eq!(
            websocket_url("wss://api.example.com/ws")
                .expect("valid url")
                .scheme(),
            "wss"
        );
    }

    #[test]
    fn rejects_unsupported_schemes_and_garbage() {
        assert!(websocket_url("ftp://example.com").is_err());
        assert!(websocket_url("not a url").is_err());
    }

    #[test]
    fn handshake_request_carries_headers() {
        let request = ConnectRequest {
            target: "https://api.example.com/ws/dashboard".to_owned(),
            headers: vec![
                ("Authorization".to_owned(), "Bearer token-123".to_owned()),
                ("User-Agent".to_owned(), "ServiFast-Channel/0.1".to_owned()),
            ],
        };

        let built = build_handshake_request(&request).expect("request should build");
        assert_eq!(
            built
                .headers()
                .get("Authorization")
                .and_then(|v| v.to_str().ok()),
            Some("Bearer token-123")
        );
        assert_eq!(
            built.headers().get("User-Agent").and_then(|v| v.to_str().ok()),
            Some("ServiFast-Channel/0.1")
        );
        // The token must never leak into the request target.
        assert!(!built.uri().to_string().contains("token-123"));
    }
}
