/*
[INPUT]:  Connection config, hooks, a transport connector
[OUTPUT]: One managed websocket connection with keepalive, auth and reconnection
[POS]:    WebSocket layer - connection lifecycle state machine
[UPDATE]: When changing lifecycle transitions, epoch rules or retry policy
*/

use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use futures_util::{SinkExt, StreamExt};
use tokio::sync::{Mutex, watch};
use tokio::task::JoinHandle;
use tokio::time::{self, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use url::Url;
use uuid::Uuid;

use crate::auth::StreamSigner;
use crate::error::{BybitError, Result};
use crate::types::ChannelKind;

use super::config::{ConnectionConfig, ConnectionHooks};
use super::message::RequestFrame;
use super::pending::{AUTH_REQUEST_ID, PendingRequests, RequestKind};
use super::registry::{Registration, SubscriptionHandle, SubscriptionRegistry, TopicHandler};
use super::router::{MessageRouter, RouterStats};
use super::routing::endpoint_url;
use super::transport::{Connector, FrameSink, FrameStream, Transport, TungsteniteConnector};

/// Unacknowledged subscribes are dropped after this many ping intervals
const PENDING_MAX_AGE_INTERVALS: u32 = 3;

/// Lifecycle state of a managed connection
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Idle,
    Connecting,
    Authenticating,
    Connected,
    Reconnecting { attempt: u32 },
    Closing,
    Closed,
}

impl ConnectionState {
    pub fn is_closed(self) -> bool {
        matches!(self, ConnectionState::Closing | ConnectionState::Closed)
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConnectionState::Idle => f.write_str("idle"),
            ConnectionState::Connecting => f.write_str("connecting"),
            ConnectionState::Authenticating => f.write_str("authenticating"),
            ConnectionState::Connected => f.write_str("connected"),
            ConnectionState::Reconnecting { attempt } => write!(f, "reconnecting (attempt {attempt})"),
            ConnectionState::Closing => f.write_str("closing"),
            ConnectionState::Closed => f.write_str("closed"),
        }
    }
}

/// Loops and cancellation scope of one epoch
struct Session {
    epoch: u64,
    token: CancellationToken,
    receiver: JoinHandle<()>,
    keepalive: Option<JoinHandle<()>>,
    /// Transport failure reported before the handshake finished
    lost: Option<BybitError>,
}

#[derive(Default)]
struct Link {
    writer: Option<FrameSink>,
    session: Option<Session>,
}

impl Link {
    fn take(&mut self) -> (Option<FrameSink>, Option<Session>) {
        (self.writer.take(), self.session.take())
    }
}

struct Inner {
    config: ConnectionConfig,
    url: Url,
    connector: Arc<dyn Connector>,
    hooks: ConnectionHooks,
    signer: Option<StreamSigner>,
    registry: Arc<SubscriptionRegistry>,
    pending: Arc<PendingRequests>,
    router: MessageRouter,
    link: Mutex<Link>,
    /// Written only while `link` is held
    epoch: AtomicU64,
    state: watch::Sender<ConnectionState>,
    shutdown: CancellationToken,
}

/// Owns one websocket connection. Clones share the same connection.
#[derive(Clone)]
pub struct ConnectionManager {
    inner: Arc<Inner>,
}

impl ConnectionManager {
    pub fn new(config: ConnectionConfig, hooks: ConnectionHooks) -> Result<Self> {
        Self::with_connector(config, hooks, Arc::new(TungsteniteConnector))
    }

    pub fn with_connector(
        config: ConnectionConfig,
        hooks: ConnectionHooks,
        connector: Arc<dyn Connector>,
    ) -> Result<Self> {
        config.validate()?;
        let url = endpoint_url(&config)?;
        let signer = match (config.channel, &config.credentials) {
            (ChannelKind::Private, Some(credentials)) => {
                Some(StreamSigner::new(credentials.clone(), config.auth_window))
            }
            _ => None,
        };
        let registry = Arc::new(SubscriptionRegistry::new());
        let pending = Arc::new(PendingRequests::new());
        let router = MessageRouter::new(registry.clone(), pending.clone());
        let (state, _) = watch::channel(ConnectionState::Idle);

        Ok(Self {
            inner: Arc::new(Inner {
                config,
                url,
                connector,
                hooks,
                signer,
                registry,
                pending,
                router,
                link: Mutex::new(Link::default()),
                epoch: AtomicU64::new(0),
                state,
                shutdown: CancellationToken::new(),
            }),
        })
    }

    /// Dial, authenticate (private channels) and start the loops.
    ///
    /// Returns once the connection is usable. A failure here is not retried.
    pub async fn connect(&self) -> Result<()> {
        let inner = &self.inner;
        let epoch = {
            let _link = inner.link.lock().await;
            let mut outcome = Ok(false);
            let shutdown = inner.shutdown.is_cancelled();
            inner.state.send_if_modified(|state| match *state {
                ConnectionState::Idle => {
                    *state = ConnectionState::Connecting;
                    true
                }
                ConnectionState::Closed if !shutdown => {
                    *state = ConnectionState::Connecting;
                    outcome = Ok(true);
                    true
                }
                ConnectionState::Closing | ConnectionState::Closed => {
                    outcome = Err(BybitError::ClosedConnectionUse);
                    false
                }
                other => {
                    outcome = Err(BybitError::AlreadyConnected {
                        state: other.to_string(),
                    });
                    false
                }
            });
            if outcome? {
                inner.epoch.fetch_add(1, Ordering::SeqCst) + 1
            } else {
                inner.epoch.load(Ordering::SeqCst)
            }
        };

        match inner.establish(epoch).await {
            Ok(()) => Ok(()),
            Err(err) => {
                if err != BybitError::ClosedConnectionUse {
                    error!(epoch, url = %inner.url, error = %err, "ws connect failed");
                    inner.hooks.connection_error(&err);
                }
                inner.finish_closed().await;
                Err(err)
            }
        }
    }

    /// Send a raw text frame on the live connection
    pub async fn send(&self, text: impl Into<String>) -> Result<()> {
        self.ensure_open()?;
        if self.state() != ConnectionState::Connected {
            return Err(BybitError::NoAvailableConnection);
        }
        self.inner.write_frame(None, text.into()).await
    }

    /// Register `handler` for `topic` and subscribe on the wire when connected.
    ///
    /// While disconnected the subscription is recorded and sent on the next (re)connect.
    pub async fn subscribe(
        &self,
        topic: impl Into<String>,
        handler: TopicHandler,
    ) -> Result<SubscriptionHandle> {
        self.ensure_open()?;
        let topic = topic.into();
        let Registration { handle, replaced } = self.inner.registry.register(topic.clone(), handler);
        if replaced {
            debug!(topic, "subscription handler replaced");
            return Ok(handle);
        }

        if self.state() != ConnectionState::Connected {
            debug!(topic, state = %self.state(), "subscription deferred until connected");
            return Ok(handle);
        }

        let epoch = self.epoch();
        match self.inner.send_request(RequestKind::Subscribe, vec![topic.clone()], epoch).await {
            Ok(()) => Ok(handle),
            Err(err) if is_deferrable(&err) => {
                debug!(topic, error = %err, "subscription deferred to replay");
                Ok(handle)
            }
            Err(err) => {
                self.inner.registry.unregister(handle);
                Err(err)
            }
        }
    }

    /// Drop a subscription; inert handles are ignored
    pub async fn unsubscribe(&self, handle: SubscriptionHandle) -> Result<()> {
        self.ensure_open()?;
        match self.inner.registry.unregister(handle) {
            Some(topic) => self.send_unsubscribe(topic).await,
            None => Ok(()),
        }
    }

    pub async fn unsubscribe_topic(&self, topic: &str) -> Result<()> {
        self.ensure_open()?;
        if self.inner.registry.unregister_topic(topic) {
            self.send_unsubscribe(topic.to_string()).await
        } else {
            Ok(())
        }
    }

    async fn send_unsubscribe(&self, topic: String) -> Result<()> {
        if self.state() != ConnectionState::Connected {
            return Ok(());
        }
        let epoch = self.epoch();
        match self.inner.send_request(RequestKind::Unsubscribe, vec![topic.clone()], epoch).await {
            Err(err) if !is_deferrable(&err) => Err(err),
            _ => {
                debug!(topic, "unsubscribed");
                Ok(())
            }
        }
    }

    /// Close the connection and release everything. Safe to call repeatedly.
    pub async fn close(&self) {
        let inner = &self.inner;
        inner.shutdown.cancel();
        let was_open = inner.state.send_if_modified(|state| {
            if state.is_closed() {
                false
            } else {
                *state = ConnectionState::Closing;
                true
            }
        });

        let (writer, session) = inner.link.lock().await.take();
        inner.release(writer, session).await;
        inner.pending.fail_all(&BybitError::ClosedConnectionUse);
        inner.registry.clear();
        inner.state.send_if_modified(|state| {
            if *state == ConnectionState::Closed {
                false
            } else {
                *state = ConnectionState::Closed;
                true
            }
        });

        if was_open {
            info!(url = %inner.url, epoch = self.epoch(), "ws connection closed");
        }
    }

    fn ensure_open(&self) -> Result<()> {
        if self.inner.shutdown.is_cancelled() || self.state().is_closed() {
            return Err(BybitError::ClosedConnectionUse);
        }
        Ok(())
    }

    pub fn state(&self) -> ConnectionState {
        self.inner.current_state()
    }

    /// Watch lifecycle transitions
    pub fn subscribe_state(&self) -> watch::Receiver<ConnectionState> {
        self.inner.state.subscribe()
    }

    pub fn epoch(&self) -> u64 {
        self.inner.epoch.load(Ordering::SeqCst)
    }

    pub fn url(&self) -> &Url {
        &self.inner.url
    }

    pub fn config(&self) -> &ConnectionConfig {
        &self.inner.config
    }

    pub fn subscriptions(&self) -> Vec<String> {
        self.inner.registry.topics()
    }

    pub fn is_subscription_active(&self, topic: &str) -> bool {
        self.inner.registry.is_active(topic)
    }

    pub fn pending_requests(&self) -> usize {
        self.inner.pending.len()
    }

    pub fn router_stats(&self) -> &RouterStats {
        self.inner.router.stats()
    }
}

impl fmt::Debug for ConnectionManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionManager")
            .field("url", &self.inner.url.as_str())
            .field("channel", &self.inner.config.channel)
            .field("state", &self.state())
            .field("epoch", &self.epoch())
            .finish()
    }
}

/// Errors after which a subscribe/unsubscribe is left to the next replay
fn is_deferrable(err: &BybitError) -> bool {
    err.is_retryable() || matches!(err, BybitError::Stale { .. })
}

impl Inner {
    fn current_state(&self) -> ConnectionState {
        *self.state.borrow()
    }

    /// Non-terminal transition; never overrides Closing/Closed
    fn set_state(&self, next: ConnectionState) -> bool {
        self.state.send_if_modified(|state| {
            if state.is_closed() || *state == next {
                return false;
            }
            *state = next;
            true
        })
    }

    async fn establish(self: &Arc<Self>, epoch: u64) -> Result<()> {
        let url = self.url.to_string();
        info!(epoch, url = %url, channel = %self.config.channel, "ws connecting");

        let connect_timeout = self.config.connect_timeout;
        let Transport { sink, stream } = tokio::select! {
            biased;
            _ = self.shutdown.cancelled() => return Err(BybitError::ClosedConnectionUse),
            dialed = time::timeout(connect_timeout, self.connector.connect(&url)) => match dialed {
                Ok(result) => result?,
                Err(_) => {
                    return Err(BybitError::Dial {
                        url,
                        message: format!("timed out after {}ms", connect_timeout.as_millis()),
                    });
                }
            },
        };

        self.install(epoch, sink, stream).await?;

        if let Some(signer) = &self.signer {
            self.set_state(ConnectionState::Authenticating);
            self.authenticate(signer, epoch).await?;
        }

        {
            let mut link = self.link.lock().await;
            if self.shutdown.is_cancelled() {
                return Err(BybitError::ClosedConnectionUse);
            }
            let Some(session) = link.session.as_mut().filter(|session| session.epoch == epoch) else {
                return Err(BybitError::Stale { epoch });
            };
            if let Some(err) = session.lost.take() {
                return Err(err);
            }
            self.set_state(ConnectionState::Connected);
            session.keepalive = Some(tokio::spawn(keepalive_loop(
                Arc::downgrade(self),
                epoch,
                session.token.clone(),
            )));
        }

        info!(epoch, url = %self.url, "ws connected");
        self.hooks.connected();
        self.replay(epoch).await;
        Ok(())
    }

    /// Store the writer and start the receive loop for `epoch`
    async fn install(self: &Arc<Self>, epoch: u64, sink: FrameSink, stream: FrameStream) -> Result<()> {
        let mut link = self.link.lock().await;
        if self.shutdown.is_cancelled() {
            drop(link);
            self.release(Some(sink), None).await;
            return Err(BybitError::ClosedConnectionUse);
        }
        if self.epoch.load(Ordering::SeqCst) != epoch {
            drop(link);
            self.release(Some(sink), None).await;
            return Err(BybitError::Stale { epoch });
        }

        let token = self.shutdown.child_token();
        let receiver = tokio::spawn(receive_loop(
            Arc::downgrade(self),
            epoch,
            token.clone(),
            stream,
        ));
        let (old_writer, old_session) = link.take();
        link.writer = Some(sink);
        link.session = Some(Session {
            epoch,
            token,
            receiver,
            keepalive: None,
            lost: None,
        });
        drop(link);

        // leftovers from a failed attempt of the same cycle
        self.release(old_writer, old_session).await;
        Ok(())
    }

    async fn authenticate(self: &Arc<Self>, signer: &StreamSigner, epoch: u64) -> Result<()> {
        let completion = self
            .pending
            .register(AUTH_REQUEST_ID, RequestKind::Auth, epoch, Vec::new());
        let frame = RequestFrame::auth(&signer.auth_args()?).to_text()?;
        if let Err(err) = self.write_frame(Some(epoch), frame).await {
            self.pending.remove(AUTH_REQUEST_ID);
            return Err(BybitError::Authentication {
                message: format!("auth frame not sent: {err}"),
            });
        }
        debug!(epoch, api_key = signer.api_key(), "auth frame sent");

        let auth_timeout = self.config.auth_timeout;
        let outcome = tokio::select! {
            biased;
            _ = self.shutdown.cancelled() => return Err(BybitError::ClosedConnectionUse),
            outcome = time::timeout(auth_timeout, completion) => outcome,
        };

        match outcome {
            Ok(Ok(Ok(ack))) if ack.success => {
                debug!(epoch, conn_id = ack.conn_id.as_deref().unwrap_or_default(), "authenticated");
                Ok(())
            }
            Ok(Ok(Ok(ack))) => Err(BybitError::Authentication {
                message: ack
                    .ret_msg
                    .filter(|msg| !msg.is_empty())
                    .unwrap_or_else(|| "rejected".to_string()),
            }),
            Ok(Ok(Err(BybitError::ClosedConnectionUse))) => Err(BybitError::ClosedConnectionUse),
            Ok(Ok(Err(err))) => Err(BybitError::Authentication {
                message: err.to_string(),
            }),
            Ok(Err(_)) => Err(BybitError::Authentication {
                message: "auth request dropped".to_string(),
            }),
            Err(_) => {
                self.pending.remove(AUTH_REQUEST_ID);
                Err(BybitError::Authentication {
                    message: format!("no auth ack within {}ms", auth_timeout.as_millis()),
                })
            }
        }
    }

    async fn replay(self: &Arc<Self>, epoch: u64) {
        self.registry.reset_active();
        let topics = self.registry.replay_all();
        if topics.is_empty() {
            return;
        }
        info!(epoch, count = topics.len(), "replaying subscriptions");
        for topic in topics {
            if let Err(err) = self
                .send_request(RequestKind::Subscribe, vec![topic.clone()], epoch)
                .await
            {
                warn!(epoch, topic, error = %err, "subscription replay interrupted");
                break;
            }
        }
    }

    async fn send_request(
        self: &Arc<Self>,
        kind: RequestKind,
        topics: Vec<String>,
        epoch: u64,
    ) -> Result<()> {
        let req_id = Uuid::new_v4().to_string();
        let frame = match kind {
            RequestKind::Unsubscribe => RequestFrame::unsubscribe(&req_id, topics.clone()),
            _ => RequestFrame::subscribe(&req_id, topics.clone()),
        };
        let text = frame.to_text()?;
        let _completion = self.pending.register(req_id.clone(), kind, epoch, topics);
        if let Err(err) = self.write_frame(Some(epoch), text).await {
            self.pending.remove(&req_id);
            return Err(err);
        }
        Ok(())
    }

    /// Single-writer path for every outbound frame.
    ///
    /// Bounded by `send_timeout` including lock acquisition. Transport errors
    /// and timeouts hand the epoch over to reconnection before returning.
    async fn write_frame(self: &Arc<Self>, expected_epoch: Option<u64>, text: String) -> Result<()> {
        let send_timeout = self.config.send_timeout;
        let observed_epoch = self.epoch.load(Ordering::SeqCst);

        let attempt = async {
            let mut link = self.link.lock().await;
            let epoch = self.epoch.load(Ordering::SeqCst);
            if let Some(expected) = expected_epoch
                && expected != epoch
            {
                return Err((BybitError::Stale { epoch: expected }, None));
            }
            match link.writer.as_mut() {
                Some(writer) => writer.send(text).await.map_err(|err| (err, Some(epoch))),
                None => Err((BybitError::NoAvailableConnection, None)),
            }
        };

        let outcome = tokio::select! {
            biased;
            _ = self.shutdown.cancelled() => return Err(BybitError::ClosedConnectionUse),
            outcome = time::timeout(send_timeout, attempt) => outcome,
        };

        match outcome {
            Ok(Ok(())) => Ok(()),
            Ok(Err((err, None))) => Err(err),
            Ok(Err((err, Some(epoch)))) => {
                self.handle_transport_failure(epoch, &err).await;
                Err(err)
            }
            Err(_) => {
                let err = BybitError::Write(format!(
                    "send timed out after {}ms",
                    send_timeout.as_millis()
                ));
                self.handle_transport_failure(observed_epoch, &err).await;
                Err(err)
            }
        }
    }

    /// Move a live connection into `Reconnecting`; stale or duplicate reports are ignored
    async fn handle_transport_failure(self: &Arc<Self>, epoch: u64, err: &BybitError) {
        self.pending.fail_epoch(epoch);

        let (next_epoch, writer, session) = {
            let mut link = self.link.lock().await;
            if self.shutdown.is_cancelled() || self.epoch.load(Ordering::SeqCst) != epoch {
                debug!(epoch, error = %err, "transport failure ignored");
                return;
            }
            if self.current_state() != ConnectionState::Connected {
                // still handshaking: establish fails the attempt instead
                if let Some(session) = link.session.as_mut().filter(|session| session.epoch == epoch)
                    && session.lost.is_none()
                {
                    debug!(epoch, error = %err, "transport lost during handshake");
                    session.lost = Some(err.clone());
                }
                return;
            }
            let next_epoch = self.epoch.fetch_add(1, Ordering::SeqCst) + 1;
            self.set_state(ConnectionState::Reconnecting { attempt: 0 });
            let (writer, session) = link.take();
            (next_epoch, writer, session)
        };

        warn!(epoch, next_epoch, error = %err, "ws transport failed, reconnecting");
        self.release(writer, session).await;
        self.spawn_reconnect(next_epoch);
    }

    fn spawn_reconnect(self: &Arc<Self>, epoch: u64) {
        let inner = self.clone();
        let task: Pin<Box<dyn Future<Output = ()> + Send>> =
            Box::pin(async move { inner.reconnect(epoch).await });
        tokio::spawn(task);
    }

    async fn reconnect(self: Arc<Self>, mut epoch: u64) {
        let max_attempts = self.config.reconnect_attempts;
        let delay = self.config.reconnect_delay;

        for attempt in 1..=max_attempts {
            if attempt > 1 {
                epoch = self.advance_epoch().await;
            }
            if !self.set_state(ConnectionState::Reconnecting { attempt }) {
                return;
            }
            info!(
                epoch,
                attempt,
                max_attempts,
                delay_ms = delay.as_millis() as u64,
                "ws reconnect scheduled"
            );

            tokio::select! {
                biased;
                _ = self.shutdown.cancelled() => return,
                _ = time::sleep(delay) => {}
            }

            match self.establish(epoch).await {
                Ok(()) => {
                    info!(epoch, attempt, "ws reconnected");
                    return;
                }
                Err(err) => {
                    if self.shutdown.is_cancelled() {
                        return;
                    }
                    warn!(epoch, attempt, max_attempts, error = %err, "ws reconnect attempt failed");
                    self.teardown(epoch).await;
                }
            }
        }

        let err = BybitError::ReconnectExhausted {
            attempts: max_attempts,
        };
        error!(url = %self.url, error = %err, "ws reconnection gave up");
        self.hooks.connection_error(&err);
        self.finish_closed().await;
    }

    async fn advance_epoch(&self) -> u64 {
        let _link = self.link.lock().await;
        self.epoch.fetch_add(1, Ordering::SeqCst) + 1
    }

    /// Release whatever an attempt at `epoch` left installed
    async fn teardown(&self, epoch: u64) {
        let (writer, session) = {
            let mut link = self.link.lock().await;
            match &link.session {
                Some(session) if session.epoch == epoch => link.take(),
                _ => (None, None),
            }
        };
        self.pending.fail_epoch(epoch);
        self.release(writer, session).await;
    }

    /// Terminal state after a failure; the registry is kept for a later `connect()`
    async fn finish_closed(&self) {
        let (writer, session) = self.link.lock().await.take();
        self.release(writer, session).await;
        self.pending.fail_all(&BybitError::ClosedConnectionUse);
        self.state.send_replace(ConnectionState::Closed);
    }

    async fn release(&self, writer: Option<FrameSink>, session: Option<Session>) {
        if let Some(session) = session {
            session.token.cancel();
            debug!(epoch = session.epoch, "session loops cancelled");
            // the receive loop may be the caller; it exits on the token
            drop(session.receiver);
            drop(session.keepalive);
        }
        if let Some(mut writer) = writer {
            match time::timeout(self.config.send_timeout, writer.close()).await {
                Ok(Ok(())) => {}
                Ok(Err(err)) => debug!(error = %err, "closing stale transport failed"),
                Err(_) => debug!("closing stale transport timed out"),
            }
        }
    }
}

impl Drop for Inner {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}

async fn keepalive_loop(inner: Weak<Inner>, epoch: u64, token: CancellationToken) {
    let Some(period) = inner.upgrade().map(|inner| inner.config.ping_interval) else {
        return;
    };
    let mut ticker = time::interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            biased;
            _ = token.cancelled() => break,
            _ = ticker.tick() => {}
        }
        let Some(inner) = inner.upgrade() else {
            break;
        };

        inner
            .pending
            .prune_older_than(period * PENDING_MAX_AGE_INTERVALS);
        let req_id = inner.config.ping_req_id.clone();
        let text = match RequestFrame::ping(&req_id).to_text() {
            Ok(text) => text,
            Err(err) => {
                error!(epoch, error = %err, "ping frame encoding failed");
                break;
            }
        };
        let _completion = inner
            .pending
            .register(req_id.clone(), RequestKind::Ping, epoch, Vec::new());

        if let Err(err) = inner.write_frame(Some(epoch), text).await {
            inner.pending.remove(&req_id);
            debug!(epoch, error = %err, "keepalive stopped");
            break;
        }
        debug!(epoch, req_id, "ping sent");
    }
}

async fn receive_loop(
    inner: Weak<Inner>,
    epoch: u64,
    token: CancellationToken,
    mut stream: FrameStream,
) {
    loop {
        let next = tokio::select! {
            biased;
            _ = token.cancelled() => break,
            next = stream.next() => next,
        };
        let Some(inner) = inner.upgrade() else {
            break;
        };

        match next {
            Some(Ok(text)) => {
                inner.router.route(&text);
            }
            Some(Err(err)) => {
                inner.handle_transport_failure(epoch, &err).await;
                break;
            }
            None => {
                let err = BybitError::Read("stream ended".to_string());
                inner.handle_transport_failure(epoch, &err).await;
                break;
            }
        }
    }
    debug!(epoch, "receive loop exited");
}
