//! Scripted in-process transport for exercising the client without a
//! network.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::mpsc;

use channel_core::ChannelError;

use crate::transport::{
    ChannelTransport, ConnectRequest, OutboundFrame, TransportEvent, TransportHandle,
};

enum MockScript {
    Accept,
    AcceptAfter(Duration),
    Reject(ChannelError),
}

#[derive(Default)]
struct MockState {
    script: VecDeque<MockScript>,
    requests: Vec<ConnectRequest>,
    connections: Vec<MockConnection>,
}

/// Transport whose connect outcomes are scripted by the test.
///
/// An empty script accepts every connection. Clones share state, so a
/// test can keep one handle while the client owns another.
#[derive(Clone, Default)]
pub(crate) struct MockTransport {
    state: Arc<Mutex<MockState>>,
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn accept_next(&self) {
        self.lock().script.push_back(MockScript::Accept);
    }

    pub fn accept_after(&self, delay: Duration) {
        self.lock().script.push_back(MockScript::AcceptAfter(delay));
    }

    pub fn reject_next(&self, error: ChannelError) {
        self.lock().script.push_back(MockScript::Reject(error));
    }

    /// Every connect request seen so far, in call order.
    pub fn requests(&self) -> Vec<ConnectRequest> {
        self.lock().requests.clone()
    }

    /// Accepted connections in handshake-completion order.
    pub fn connection(&self, index: usize) -> MockConnection {
        self.lock()
            .connections
            .get(index)
            .cloned()
            .expect("no such mock connection")
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, MockState> {
        self.state.lock().expect("mock state lock")
    }
}

impl ChannelTransport for MockTransport {
    fn open(
        &self,
        request: ConnectRequest,
    ) -> impl std::future::Future<Output = Result<TransportHandle, ChannelError>> + Send {
        let state = Arc::clone(&self.state);
        async move {
            let outcome = {
                let mut guard = state.lock().expect("mock state lock");
                guard.requests.push(request);
                guard.script.pop_front()
            };
            match outcome {
                Some(MockScript::Reject(error)) => return Err(error),
                Some(MockScript::AcceptAfter(delay)) => tokio::time::sleep(delay).await,
                Some(MockScript::Accept) | None => {}
            }

            let (outbound_tx, mut outbound_rx) = mpsc::channel::<OutboundFrame>(16);
            let (event_tx, event_rx) = mpsc::channel::<TransportEvent>(64);
            let (shutdown_tx, mut shutdown_rx) = mpsc::channel::<()>(1);
            let sent = Arc::new(Mutex::new(Vec::new()));

            let connection = MockConnection {
                events: event_tx,
                sent: Arc::clone(&sent),
                shutdown: shutdown_tx,
            };
            state
                .lock()
                .expect("mock state lock")
                .connections
                .push(connection);

            // Record what the client writes until it closes (or the test
            // severs the writer half).
            tokio::spawn(async move {
                loop {
                    tokio::select! {
                        _ = shutdown_rx.recv() => break,
                        frame = outbound_rx.recv() => match frame {
                            Some(frame) => {
                                let stop = matches!(frame, OutboundFrame::Close);
                                sent.lock().expect("mock sent lock").push(frame);
                                if stop {
                                    break;
                                }
                            }
                            None => break,
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

/// Test-side handle to one accepted mock connection.
#[derive(Clone)]
pub(crate) struct MockConnection {
    events: mpsc::Sender<TransportEvent>,
    sent: Arc<Mutex<Vec<OutboundFrame>>>,
    shutdown: mpsc::Sender<()>,
}

impl MockConnection {
    /// Deliver an inbound text frame. Returns false when the client is no
    /// longer reading this connection.
    pub async fn push_frame(&self, text: &str) -> bool {
        self.events
            .send(TransportEvent::Frame(text.to_owned()))
            .await
            .is_ok()
    }

    /// Report a connection failure (`status` mimics a rejected handshake
    /// or server-side policy response).
    pub async fn fail(&self, status: Option<u16>, message: &str) {
        let _ = self
            .events
            .send(TransportEvent::Failed {
                status,
                message: message.to_owned(),
            })
            .await;
    }

    /// Report a close from the remote side.
    pub async fn close(&self, code: Option<u16>, reason: &str) {
        let _ = self
            .events
            .send(TransportEvent::Closed {
                code,
                reason: reason.to_owned(),
            })
            .await;
    }

    /// Kill the writer half so the next client write fails.
    pub fn sever(&self) {
        let _ = self.shutdown.try_send(());
    }

    /// Frames the client has written so far.
    pub fn sent_frames(&self) -> Vec<OutboundFrame> {
        self.sent.lock().expect("mock sent lock").clone()
    }
}
