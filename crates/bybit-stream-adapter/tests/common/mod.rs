/*
[INPUT]:  Test scenarios needing a controllable transport
[OUTPUT]: In-memory connector, loopback server and wait helpers
[POS]:    Test infrastructure - shared across all test modules
[UPDATE]: When adding new test patterns or fixtures
*/

//! Common test utilities for bybit-stream-adapter tests

#![allow(dead_code)]

use std::pin::Pin;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::task::{Context, Poll};
use std::time::Duration;

use async_trait::async_trait;
use bybit_stream_adapter::ws::Transport;
use bybit_stream_adapter::{BybitError, ConnectionManager, ConnectionState, Connector, Result};
use futures_util::{Sink, SinkExt, StreamExt, stream};
use serde_json::Value;
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tokio_tungstenite::accept_async;
use tokio_tungstenite::tungstenite::Message;

/// Long enough to outlast a 20s keepalive under paused time
pub const WAIT: Duration = Duration::from_secs(30);

/// Server end of one mock connection
pub struct ServerSide {
    /// Frames written by the client
    pub sent: mpsc::UnboundedReceiver<String>,
    /// Frames delivered to the client; drop to simulate a peer close
    pub inject: mpsc::UnboundedSender<Result<String>>,
}

impl ServerSide {
    pub fn push(&self, frame: Value) {
        let _ = self.inject.send(Ok(frame.to_string()));
    }

    pub fn fail_read(&self, message: &str) {
        let _ = self.inject.send(Err(BybitError::Read(message.to_string())));
    }

    /// Next client frame as JSON
    pub async fn next_frame(&mut self) -> Value {
        let text = tokio::time::timeout(WAIT, self.sent.recv())
            .await
            .expect("timed out waiting for client frame")
            .expect("client sink dropped");
        serde_json::from_str(&text).expect("client frame is json")
    }

    /// Subscribe frames until `count` arrive; other frames are skipped
    pub async fn subscribe_topics(&mut self, count: usize) -> Vec<String> {
        let mut topics = Vec::new();
        while topics.len() < count {
            let frame = self.next_frame().await;
            if frame["op"] == "subscribe" {
                let args = frame["args"].as_array().expect("subscribe args");
                assert_eq!(args.len(), 1, "one topic per subscribe frame");
                topics.push(args[0].as_str().expect("topic string").to_string());
            }
        }
        topics
    }

    /// True if nothing else was written within `window`
    pub async fn is_quiet_for(&mut self, window: Duration) -> bool {
        !matches!(
            tokio::time::timeout(window, self.sent.recv()).await,
            Ok(Some(_))
        )
    }
}

struct MockSink {
    tx: mpsc::UnboundedSender<String>,
    fail_next_write: Arc<AtomicBool>,
    stall_next_write: Arc<AtomicBool>,
    broken: bool,
}

impl Sink<String> for MockSink {
    type Error = BybitError;

    fn poll_ready(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<Result<()>> {
        if self.broken {
            return Poll::Ready(Err(BybitError::Write("mock transport broken".into())));
        }
        if self.stall_next_write.swap(false, Ordering::SeqCst) {
            // never woken: the writer hangs until its caller gives up
            return Poll::Pending;
        }
        Poll::Ready(Ok(()))
    }

    fn start_send(mut self: Pin<&mut Self>, item: String) -> Result<()> {
        if self.broken || self.fail_next_write.swap(false, Ordering::SeqCst) {
            self.broken = true;
            return Err(BybitError::Write("injected write failure".into()));
        }
        self.tx
            .send(item)
            .map_err(|_| BybitError::Write("mock peer gone".into()))
    }

    fn poll_flush(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<Result<()>> {
        Poll::Ready(Ok(()))
    }

    fn poll_close(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<Result<()>> {
        Poll::Ready(Ok(()))
    }
}

/// Connector backed by in-memory channels with failure injection
#[derive(Debug)]
pub struct MockConnector {
    dials: AtomicUsize,
    failing_dials: AtomicUsize,
    fail_next_write: Arc<AtomicBool>,
    stall_next_write: Arc<AtomicBool>,
    dead_on_arrival: AtomicBool,
    servers: mpsc::UnboundedSender<ServerSide>,
}

impl MockConnector {
    pub fn new() -> (Arc<Self>, mpsc::UnboundedReceiver<ServerSide>) {
        let (servers, accepted) = mpsc::unbounded_channel();
        let connector = Arc::new(Self {
            dials: AtomicUsize::new(0),
            failing_dials: AtomicUsize::new(0),
            fail_next_write: Arc::new(AtomicBool::new(false)),
            stall_next_write: Arc::new(AtomicBool::new(false)),
            dead_on_arrival: AtomicBool::new(false),
            servers,
        });
        (connector, accepted)
    }

    pub fn fail_next_dials(&self, count: usize) {
        self.failing_dials.store(count, Ordering::SeqCst);
    }

    pub fn fail_next_write(&self) {
        self.fail_next_write.store(true, Ordering::SeqCst);
    }

    pub fn stall_next_write(&self) {
        self.stall_next_write.store(true, Ordering::SeqCst);
    }

    /// Every later connection reports a read error as its first frame
    pub fn fail_reads_on_dial(&self) {
        self.dead_on_arrival.store(true, Ordering::SeqCst);
    }

    pub fn dials(&self) -> usize {
        self.dials.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Connector for MockConnector {
    async fn connect(&self, url: &str) -> Result<Transport> {
        self.dials.fetch_add(1, Ordering::SeqCst);
        let should_fail = self
            .failing_dials
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |left| left.checked_sub(1))
            .is_ok();
        if should_fail {
            return Err(BybitError::Dial {
                url: url.to_string(),
                message: "injected dial failure".into(),
            });
        }

        let (sent_tx, sent_rx) = mpsc::unbounded_channel();
        let (inject_tx, mut inject_rx) = mpsc::unbounded_channel::<Result<String>>();
        let sink = MockSink {
            tx: sent_tx,
            fail_next_write: self.fail_next_write.clone(),
            stall_next_write: self.stall_next_write.clone(),
            broken: false,
        };
        if self.dead_on_arrival.load(Ordering::SeqCst) {
            let _ = inject_tx.send(Err(BybitError::Read("reset on arrival".into())));
        }
        let frames = stream::poll_fn(move |cx| inject_rx.poll_recv(cx));

        let _ = self.servers.send(ServerSide {
            sent: sent_rx,
            inject: inject_tx,
        });
        Ok(Transport::new(Box::pin(sink), Box::pin(frames)))
    }
}

pub async fn next_server(accepted: &mut mpsc::UnboundedReceiver<ServerSide>) -> ServerSide {
    tokio::time::timeout(WAIT, accepted.recv())
        .await
        .expect("timed out waiting for dial")
        .expect("connector dropped")
}

pub async fn wait_for_state(manager: &ConnectionManager, expected: ConnectionState) {
    let mut states = manager.subscribe_state();
    tokio::time::timeout(WAIT, states.wait_for(|state| *state == expected))
        .await
        .expect("timed out waiting for state")
        .expect("state sender dropped");
}

/// Poll `check` until it holds or `WAIT` elapses
pub async fn eventually(mut check: impl FnMut() -> bool) -> bool {
    let deadline = tokio::time::Instant::now() + WAIT;
    while tokio::time::Instant::now() < deadline {
        if check() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    check()
}

pub fn subscribe_ack(req_id: &str) -> Value {
    serde_json::json!({
        "success": true,
        "ret_msg": "",
        "conn_id": "mock-conn",
        "req_id": req_id,
        "op": "subscribe"
    })
}

/// Loopback websocket server: acks subscribes and answers each with one ticker frame
pub async fn spawn_ticker_server() -> (String, tokio::task::JoinHandle<Vec<String>>) {
    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind loopback");
    let addr = listener.local_addr().expect("local addr");

    let handle = tokio::spawn(async move {
        let mut received = Vec::new();
        let Ok((tcp, _)) = listener.accept().await else {
            return received;
        };
        let Ok(mut ws) = accept_async(tcp).await else {
            return received;
        };

        while let Some(Ok(message)) = ws.next().await {
            let Message::Text(text) = message else {
                continue;
            };
            received.push(text.to_string());
            let Ok(frame) = serde_json::from_str::<Value>(&text) else {
                continue;
            };
            if frame["op"] != "subscribe" {
                continue;
            }
            let req_id = frame["req_id"].as_str().unwrap_or_default().to_string();
            let ack = subscribe_ack(&req_id).to_string();
            if ws.send(Message::Text(ack.into())).await.is_err() {
                break;
            }
            for topic in frame["args"].as_array().cloned().unwrap_or_default() {
                let topic = topic.as_str().unwrap_or_default().to_string();
                let symbol = topic.rsplit('.').next().unwrap_or_default().to_string();
                let data = serde_json::json!({
                    "topic": topic,
                    "type": "snapshot",
                    "ts": 1673853746003i64,
                    "data": {"symbol": symbol, "lastPrice": "17216.00"}
                })
                .to_string();
                if ws.send(Message::Text(data.into())).await.is_err() {
                    break;
                }
            }
        }
        received
    });

    (format!("ws://{addr}"), handle)
}
