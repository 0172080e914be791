/*
[INPUT]:  Raw inbound text frames from the receive loop
[OUTPUT]: Resolved pending requests and handler dispatch
[POS]:    WebSocket layer - inbound demultiplexer
[UPDATE]: When adding control frame kinds or changing dispatch rules
*/

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

use tracing::{debug, info, warn};

use super::message::{FrameKind, InboundFrame, TopicMessage};
use super::pending::{Ack, AUTH_REQUEST_ID, PendingRequests, RequestKind};
use super::registry::SubscriptionRegistry;

const UNMATCHED_LOG_LIMIT: usize = 5;
const UNKNOWN_LOG_LIMIT: usize = 3;
const PARSE_FAIL_LOG_LIMIT: usize = 3;
const RAW_LOG_MAX_BYTES: usize = 512;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouteOutcome {
    /// Control frame; carries the kind that was resolved
    Control(FrameKind),
    Dispatched,
    /// Data frame for a topic nobody subscribed to
    Unmatched,
    Malformed,
    Ignored,
}

/// Running counters, readable from tests and diagnostics
#[derive(Debug, Default)]
pub struct RouterStats {
    pub dispatched: AtomicU64,
    pub control: AtomicU64,
    pub unmatched: AtomicU64,
    pub malformed: AtomicU64,
}

#[derive(Debug, Default)]
struct LogSamples {
    unmatched: AtomicUsize,
    unknown: AtomicUsize,
    parse_fail: AtomicUsize,
}

#[derive(Debug)]
pub struct MessageRouter {
    registry: Arc<SubscriptionRegistry>,
    pending: Arc<PendingRequests>,
    stats: RouterStats,
    samples: LogSamples,
}

impl MessageRouter {
    pub fn new(registry: Arc<SubscriptionRegistry>, pending: Arc<PendingRequests>) -> Self {
        Self {
            registry,
            pending,
            stats: RouterStats::default(),
            samples: LogSamples::default(),
        }
    }

    pub fn stats(&self) -> &RouterStats {
        &self.stats
    }

    /// Route one frame. Handlers run on the caller's task, in arrival order.
    pub fn route(&self, text: &str) -> RouteOutcome {
        let frame = match InboundFrame::parse(text) {
            Ok(frame) => frame,
            Err(err) => {
                self.stats.malformed.fetch_add(1, Ordering::Relaxed);
                self.log_parse_fail_once(&err.to_string(), text);
                return RouteOutcome::Malformed;
            }
        };

        match frame.kind() {
            FrameKind::Data => self.dispatch(frame),
            FrameKind::Unknown => {
                self.log_unknown_once(text);
                RouteOutcome::Ignored
            }
            kind => {
                self.stats.control.fetch_add(1, Ordering::Relaxed);
                self.resolve_control(kind, &frame);
                RouteOutcome::Control(kind)
            }
        }
    }

    fn resolve_control(&self, kind: FrameKind, frame: &InboundFrame) {
        let req_id = match (kind, frame.request_id()) {
            (_, Some(id)) => id,
            (FrameKind::AuthAck, None) => AUTH_REQUEST_ID,
            (_, None) => {
                debug!(?kind, "control frame without req_id");
                return;
            }
        };

        let ack = Ack {
            success: frame.is_success(),
            ret_msg: frame.ret_msg.clone(),
            conn_id: frame.conn_id.clone(),
        };
        let success = ack.success;

        let Some(resolved) = self.pending.resolve(req_id, ack) else {
            debug!(?kind, req_id, "ack without pending request");
            return;
        };

        match resolved.kind {
            RequestKind::Ping => {
                debug!(
                    req_id,
                    rtt_ms = resolved.elapsed.as_millis() as u64,
                    "pong received"
                );
            }
            RequestKind::Subscribe if success => {
                self.registry.mark_active(&resolved.topics);
                debug!(topics = ?resolved.topics, "subscription active");
            }
            RequestKind::Subscribe | RequestKind::Unsubscribe if !success => {
                warn!(
                    req_id,
                    topics = ?resolved.topics,
                    ret_msg = frame.ret_msg.as_deref().unwrap_or_default(),
                    "subscription request rejected"
                );
            }
            _ => {}
        }
    }

    fn dispatch(&self, frame: InboundFrame) -> RouteOutcome {
        let frame_type = frame.payload_type();
        let InboundFrame {
            topic, ts, data, ..
        } = frame;
        let Some(topic) = topic else {
            return RouteOutcome::Ignored;
        };

        let Some(handler) = self.registry.lookup(&topic) else {
            self.stats.unmatched.fetch_add(1, Ordering::Relaxed);
            self.log_unmatched_once(&topic);
            return RouteOutcome::Unmatched;
        };

        let message = TopicMessage {
            topic,
            frame_type,
            ts,
            data,
        };
        handler(&message);
        self.stats.dispatched.fetch_add(1, Ordering::Relaxed);
        RouteOutcome::Dispatched
    }

    fn log_unmatched_once(&self, topic: &str) {
        let count = self.samples.unmatched.fetch_add(1, Ordering::Relaxed);
        if count < UNMATCHED_LOG_LIMIT {
            info!(
                sample_index = count + 1,
                sample_limit = UNMATCHED_LOG_LIMIT,
                topic,
                "ws frame for unsubscribed topic dropped"
            );
        }
    }

    fn log_unknown_once(&self, raw: &str) {
        let count = self.samples.unknown.fetch_add(1, Ordering::Relaxed);
        if count < UNKNOWN_LOG_LIMIT {
            let preview = truncate_for_log(raw, RAW_LOG_MAX_BYTES);
            info!(
                sample_index = count + 1,
                sample_limit = UNKNOWN_LOG_LIMIT,
                bytes = raw.len(),
                message = %preview,
                "ws frame unrecognized"
            );
        }
    }

    fn log_parse_fail_once(&self, err: &str, raw: &str) {
        let count = self.samples.parse_fail.fetch_add(1, Ordering::Relaxed);
        if count < PARSE_FAIL_LOG_LIMIT {
            info!(
                sample_index = count + 1,
                sample_limit = PARSE_FAIL_LOG_LIMIT,
                error = %err,
                bytes = raw.len(),
                "ws frame parse failed"
            );
            let preview = truncate_for_log(raw, RAW_LOG_MAX_BYTES);
            debug!(message = %preview, "ws frame parse failed");
        }
    }
}

pub(crate) fn truncate_for_log(value: &str, max_len: usize) -> String {
    if value.len() <= max_len {
        return value.to_string();
    }
    let mut end = max_len;
    while !value.is_char_boundary(end) {
        end -= 1;
    }
    let mut out = String::with_capacity(end + 3);
    out.push_str(&value[..end]);
    out.push_str("...");
    out
}
