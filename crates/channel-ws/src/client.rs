use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;
use tokio::sync::{mpsc, watch, Mutex};
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use channel_core::{
    BackoffPolicy, ChannelError, ChannelEvent, ChannelMessage, ChannelSubscription,
    ConnectionState, ConnectionStateMachine, EventEmitter, EventStream, FailureClass,
    FailureRecord, FrameDisposition, FrameRouting, InboundFrame, MessageSnapshot, MessageStore,
    OutboundContent, PING_FRAME,
};

use crate::credentials::CredentialProvider;
use crate::transport::{
    ChannelTransport, ConnectRequest, OutboundFrame, TransportEvent, TransportHandle, CLOSE_NORMAL,
};

/// Construction-time tuning for a channel client.
#[derive(Debug, Clone)]
pub struct ChannelClientConfig {
    /// Base endpoint for the channel family, e.g.
    /// `https://host/api/chat/ws`. `http`/`https` schemes are rewritten to
    /// `ws`/`wss` by the transport.
    pub endpoint: String,
    /// Keep-alive ping cadence while connected.
    pub heartbeat_interval: Duration,
    /// Reconnect delay and failure-classification policy.
    pub backoff: BackoffPolicy,
    /// Event-emitter buffer size for burst tolerance.
    pub event_capacity: usize,
    /// User-Agent header presented on the handshake.
    pub user_agent: String,
}

impl ChannelClientConfig {
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            heartbeat_interval: Duration::from_secs(30),
            backoff: BackoffPolicy::default(),
            event_capacity: EventEmitter::DEFAULT_CAPACITY,
            user_agent: "ServiFast-Channel/0.1".to_owned(),
        }
    }
}

struct LiveConnection {
    outbound: mpsc::Sender<OutboundFrame>,
    cancel: CancellationToken,
}

struct ScheduledRetry {
    cancel: CancellationToken,
    task: JoinHandle<()>,
}

/// Mutable client state. Everything in here is touched only while the
/// session lock is held, which is what serializes state transitions.
#[derive(Default)]
struct Session {
    machine: ConnectionStateMachine,
    failures: FailureRecord,
    subscription: Option<ChannelSubscription>,
    /// Bumped by every connect/disconnect. Reader, heartbeat and retry
    /// tasks carry the epoch they were spawned under and stand down when
    /// it no longer matches, so a superseded attempt can never mutate
    /// state that belongs to a newer one.
    epoch: u64,
    live: Option<LiveConnection>,
    retry: Option<ScheduledRetry>,
}

struct Shared<T> {
    transport: T,
    routing: Arc<dyn FrameRouting>,
    credentials: Arc<dyn CredentialProvider>,
    config: ChannelClientConfig,
    state_tx: watch::Sender<ConnectionState>,
    store: MessageStore,
    emitter: EventEmitter,
    session: Mutex<Session>,
}

/// Real-time channel client.
///
/// Owns one logical connection at a time, reconnects with backoff after
/// transient failures, and feeds received frames into the durable
/// [`MessageStore`] view and the one-shot [`EventEmitter`] stream.
///
/// Instances are cheap handles over shared state; clone freely and drive
/// the lifecycle explicitly with `connect`/`disconnect`.
pub struct ChannelClient<T: ChannelTransport> {
    shared: Arc<Shared<T>>,
}

impl<T: ChannelTransport> Clone for ChannelClient<T> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<T: ChannelTransport> ChannelClient<T> {
    pub fn new(
        transport: T,
        config: ChannelClientConfig,
        credentials: Arc<dyn CredentialProvider>,
        routing: Arc<dyn FrameRouting>,
    ) -> Self {
        let (state_tx, _) = watch::channel(ConnectionState::Disconnected);
        let emitter = EventEmitter::new(config.event_capacity);
        Self {
            shared: Arc::new(Shared {
                transport,
                routing,
                credentials,
                config,
                state_tx,
                store: MessageStore::new(),
                emitter,
                session: Mutex::new(Session::default()),
            }),
        }
    }

    /// Observable connection state.
    pub fn state(&self) -> watch::Receiver<ConnectionState> {
        self.shared.state_tx.subscribe()
    }

    pub fn current_state(&self) -> ConnectionState {
        *self.shared.state_tx.borrow()
    }

    /// Observable ordered message history.
    pub fn messages(&self) -> watch::Receiver<MessageSnapshot> {
        self.shared.store.subscribe()
    }

    /// Current message history view.
    pub fn snapshot(&self) -> MessageSnapshot {
        self.shared.store.snapshot()
    }

    /// One-shot stream of newly arrived events. No replay for late
    /// subscribers.
    pub fn events(&self) -> EventStream {
        self.shared.emitter.subscribe()
    }

    /// Merge backfilled history (e.g. the REST chat-history response) into
    /// the store. Returns how many messages were new.
    pub fn merge_history(&self, messages: Vec<ChannelMessage>) -> usize {
        let added = self.shared.store.add_batch(messages);
        if added > 0 {
            debug!(added, "merged history backfill into the store");
        }
        added
    }

    /// Connect to `subscription`, tearing down any existing connection and
    /// cancelling any scheduled reconnect first.
    ///
    /// Fails fast (state `Error`, no retry) when the credential provider
    /// yields no token. A manual connect always resets the failure record,
    /// so it also clears a retry-exhausted or permanent-failure condition.
    pub async fn connect(&self, subscription: ChannelSubscription) -> Result<(), ChannelError> {
        let (epoch, request) = {
            let mut session = self.shared.session.lock().await;
            session.epoch += 1;
            let epoch = session.epoch;
            Self::cancel_retry(&mut session);
            Self::teardown_live(&mut session);
            session.failures.reset();
            session.subscription = Some(subscription.clone());
            self.force_connecting(&mut session);

            let token = match self.shared.credentials.token() {
                Some(token) => token,
                None => {
                    warn!("no credential available; aborting connection attempt");
                    session.failures.record_permanent();
                    if let Ok(next) = session.machine.connection_failed() {
                        self.publish_state(next);
                    }
                    return Err(ChannelError::NoCredential);
                }
            };

            (epoch, self.connect_request(&subscription, &token))
        };

        debug!(target = %request.target, "opening channel connection");
        self.establish(epoch, request).await
    }

    /// Write one content frame.
    ///
    /// If the client is not connected, a reconnect with the last-known
    /// subscription is attempted first; without any subscription (or a
    /// live transport handle) the call fails with [`ChannelError::NotConnected`].
    pub async fn send(&self, content: OutboundContent) -> Result<(), ChannelError> {
        let reconnect_target = {
            let session = self.shared.session.lock().await;
            if session.machine.state() == ConnectionState::Connected {
                None
            } else {
                Some(
                    session
                        .subscription
                        .clone()
                        .ok_or(ChannelError::NotConnected)?,
                )
            }
        };
        if let Some(subscription) = reconnect_target {
            debug!("not connected; reconnecting before send");
            self.connect(subscription).await?;
        }

        let outbound = {
            let session = self.shared.session.lock().await;
            match &session.live {
                Some(live) => live.outbound.clone(),
                None => return Err(ChannelError::NotConnected),
            }
        };
        let frame = content.to_frame()?;
        outbound
            .send(OutboundFrame::Text(frame))
            .await
            .map_err(|_| ChannelError::ChannelClosed)
    }

    /// Close gracefully, cancel any scheduled reconnect and clear the
    /// subscription. No retry or keep-alive can fire after this returns.
    pub async fn disconnect(&self) {
        let mut session = self.shared.session.lock().await;
        session.epoch += 1;
        Self::cancel_retry(&mut session);
        Self::teardown_live(&mut session);
        session.subscription = None;
        session.failures.reset();
        let next = session.machine.disconnected();
        self.publish_state(next);
        info!("channel disconnected");
    }

    /// Run the handshake outside the session lock, then install the
    /// connection — unless a newer connect/disconnect superseded us while
    /// we were waiting.
    async fn establish(&self, epoch: u64, request: ConnectRequest) -> Result<(), ChannelError> {
        let result = self.shared.transport.open(request).await;

        let mut session = self.shared.session.lock().await;
        if session.epoch != epoch {
            debug!("connection attempt superseded; discarding result");
            if let Ok(handle) = result {
                let _ = handle.outbound.try_send(OutboundFrame::Close);
            }
            return Ok(());
        }

        match result {
            Ok(handle) => {
                session.failures.reset();
                if let Ok(next) = session.machine.handshake_succeeded() {
                    self.publish_state(next);
                }
                // Fresh session: stale history stays hidden until the
                // server resends it.
                self.shared.store.clear();

                let TransportHandle { outbound, events } = handle;
                let cancel = CancellationToken::new();
                session.live = Some(LiveConnection {
                    outbound: outbound.clone(),
                    cancel: cancel.clone(),
                });
                self.spawn_reader(epoch, events, cancel.clone());
                self.spawn_heartbeat(epoch, outbound, cancel);
                info!("channel connected");
                Ok(())
            }
            Err(error) => {
                warn!(error = %error, "channel connection attempt failed");
                self.handle_failure(&mut session, epoch, &error);
                Err(error)
            }
        }
    }

    /// Single failure path for handshake errors, transport failures,
    /// abnormal closes and heartbeat send errors. Caller holds the lock.
    fn handle_failure(&self, session: &mut Session, epoch: u64, error: &ChannelError) {
        if session.epoch != epoch {
            return;
        }
        // A failure already handled for this epoch (or an idle client)
        // must not be double-counted when reader and heartbeat race.
        if !matches!(
            session.machine.state(),
            ConnectionState::Connecting | ConnectionState::Connected
        ) {
            return;
        }

        Self::teardown_live(session);
        if let Ok(next) = session.machine.connection_failed() {
            self.publish_state(next);
        }

        match self.shared.config.backoff.classify(error) {
            FailureClass::Permanent => {
                session.failures.record_permanent();
                warn!(error = %error, "permanent channel failure; automatic reconnection disabled");
            }
            FailureClass::Transient => {
                session.failures.record_transient();
                let failures = session.failures.consecutive_failures();
                if self.shared.config.backoff.should_stop_retrying(&session.failures) {
                    let exhausted = ChannelError::RetryExhausted { failures };
                    warn!(error = %exhausted, "waiting for a manual reconnect");
                    return;
                }
                let delay = self.shared.config.backoff.next_delay(failures);
                self.schedule_retry(session, delay);
            }
        }
    }

    fn schedule_retry(&self, session: &mut Session, delay: Duration) {
        let epoch = session.epoch;
        let attempt = session.failures.consecutive_failures();
        info!(delay_ms = delay.as_millis() as u64, attempt, "scheduling reconnect");

        let cancel = CancellationToken::new();
        let guard = cancel.clone();
        let client = self.clone();
        let task = tokio::spawn(async move {
            tokio::select! {
                _ = guard.cancelled() => {}
                _ = tokio::time::sleep(delay) => {
                    client.run_scheduled_retry(epoch).await;
                }
            }
        });
        session.retry = Some(ScheduledRetry { cancel, task });
    }

    /// Body of a scheduled reconnect. Re-validates that nothing superseded
    /// the schedule and that a credential is still available before
    /// dialing again.
    async fn run_scheduled_retry(&self, scheduled_epoch: u64) {
        let (epoch, request) = {
            let mut session = self.shared.session.lock().await;
            if session.epoch != scheduled_epoch {
                debug!("scheduled reconnect superseded; skipping");
                return;
            }
            session.retry = None;

            let subscription = match session.subscription.clone() {
                Some(subscription) => subscription,
                None => return,
            };
            let token = match self.shared.credentials.token() {
                Some(token) => token,
                None => {
                    warn!("credential no longer available; abandoning scheduled reconnect");
                    return;
                }
            };
            match session.machine.begin_connect() {
                Ok(next) => self.publish_state(next),
                Err(_) => return,
            }
            session.epoch += 1;
            (session.epoch, self.connect_request(&subscription, &token))
        };

        let _ = self.establish(epoch, request).await;
    }

    fn spawn_reader(
        &self,
        epoch: u64,
        mut events: mpsc::Receiver<TransportEvent>,
        cancel: CancellationToken,
    ) {
        let client = self.clone();
        tokio::spawn(async move {
            loop {
                let event = tokio::select! {
                    _ = cancel.cancelled() => break,
                    event = events.recv() => event,
                };
                match event {
                    Some(TransportEvent::Frame(text)) => client.handle_frame(&text),
                    Some(TransportEvent::Closed { code, reason }) => {
                        client.handle_close(epoch, code, reason).await;
                        break;
                    }
                    Some(TransportEvent::Failed { status, message }) => {
                        let error = ChannelError::from_transport_failure(status, message);
                        let mut session = client.shared.session.lock().await;
                        client.handle_failure(&mut session, epoch, &error);
                        break;
                    }
                    None => {
                        let error = ChannelError::AbnormalClose {
                            code: None,
                            reason: "transport channel closed".to_owned(),
                        };
                        let mut session = client.shared.session.lock().await;
                        client.handle_failure(&mut session, epoch, &error);
                        break;
                    }
                }
            }
        });
    }

    fn spawn_heartbeat(
        &self,
        epoch: u64,
        outbound: mpsc::Sender<OutboundFrame>,
        cancel: CancellationToken,
    ) {
        let client = self.clone();
        let period = client.shared.config.heartbeat_interval;
        tokio::spawn(async move {
            let mut ticker = interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            // The first tick fires immediately; the ping cadence starts one
            // full interval after connecting.
            ticker.tick().await;
            loop {
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    _ = ticker.tick() => {
                        if outbound
                            .send(OutboundFrame::Text(PING_FRAME.to_owned()))
                            .await
                            .is_err()
                        {
                            warn!("keep-alive send failed; treating as transient failure");
                            let error =
                                ChannelError::Transport("keep-alive send failed".to_owned());
                            let mut session = client.shared.session.lock().await;
                            client.handle_failure(&mut session, epoch, &error);
                            break;
                        }
                        debug!("keep-alive ping sent");
                    }
                }
            }
        });
    }

    /// Route one inbound frame. Runs on the reader task, so the store
    /// insert and the emission are observed atomically relative to later
    /// frames.
    fn handle_frame(&self, text: &str) {
        let frame = match InboundFrame::parse(text) {
            Ok(frame) => frame,
            Err(error) => {
                warn!(error = %error, "discarding malformed frame");
                return;
            }
        };

        match self.shared.routing.dispose(&frame.frame_type) {
            FrameDisposition::Content => {
                let data = match frame.data.as_ref() {
                    Some(data) => data,
                    None => {
                        warn!(frame_type = %frame.frame_type, "content frame without data");
                        return;
                    }
                };
                match self.shared.routing.content_message(data) {
                    Ok(message) => {
                        self.shared.store.add(message.clone());
                        self.shared.emitter.emit(ChannelEvent::Message(message));
                    }
                    Err(error) => {
                        warn!(error = %error, "discarding undecodable content frame");
                    }
                }
            }
            FrameDisposition::Notify => {
                self.shared.emitter.emit(ChannelEvent::Notification {
                    kind: frame.frame_type,
                    data: frame.data.unwrap_or(Value::Null),
                });
            }
            FrameDisposition::Ack => debug!("channel subscription acknowledged"),
            FrameDisposition::Pong => debug!("keep-alive pong received"),
            FrameDisposition::Unknown => {
                warn!(frame_type = %frame.frame_type, "unknown frame type; forwarding to observers");
                self.shared.emitter.emit(ChannelEvent::Notification {
                    kind: frame.frame_type,
                    data: frame.data.unwrap_or(Value::Null),
                });
            }
        }
    }

    async fn handle_close(&self, epoch: u64, code: Option<u16>, reason: String) {
        let mut session = self.shared.session.lock().await;
        if session.epoch != epoch {
            return;
        }
        if code == Some(CLOSE_NORMAL) {
            info!(reason = %reason, "channel closed gracefully");
            Self::teardown_live(&mut session);
            match session.machine.closed_gracefully() {
                Ok(next) => self.publish_state(next),
                Err(_) => debug!("graceful close observed outside the connected state"),
            }
        } else {
            let error = ChannelError::AbnormalClose { code, reason };
            self.handle_failure(&mut session, epoch, &error);
        }
    }

    /// Normalize any current state to Connecting without skipping steps.
    fn force_connecting(&self, session: &mut Session) {
        if !matches!(
            session.machine.state(),
            ConnectionState::Disconnected | ConnectionState::Error
        ) {
            let next = session.machine.disconnected();
            self.publish_state(next);
        }
        if let Ok(next) = session.machine.begin_connect() {
            self.publish_state(next);
        }
    }

    fn connect_request(&self, subscription: &ChannelSubscription, token: &str) -> ConnectRequest {
        let base = self.shared.config.endpoint.trim_end_matches('/');
        ConnectRequest {
            target: format!("{}/{}", base, subscription.request_path()),
            headers: vec![
                ("Authorization".to_owned(), format!("Bearer {token}")),
                ("User-Agent".to_owned(), self.shared.config.user_agent.clone()),
            ],
        }
    }

    fn publish_state(&self, state: ConnectionState) {
        self.shared.state_tx.send_replace(state);
    }

    fn teardown_live(session: &mut Session) {
        if let Some(live) = session.live.take() {
            live.cancel.cancel();
            let _ = live.outbound.try_send(OutboundFrame::Close);
        }
    }

    fn cancel_retry(session: &mut Session) {
        if let Some(retry) = session.retry.take() {
            retry.cancel.cancel();
            retry.task.abort();
        }
    }
}
