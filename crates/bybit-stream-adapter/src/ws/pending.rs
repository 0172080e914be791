/*
[INPUT]:  Outbound control requests and inbound acknowledgments
[OUTPUT]: One-shot completion per request id
[POS]:    WebSocket layer - request/ack correlation table
[UPDATE]: When adding acknowledged operations
*/

use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use tokio::sync::oneshot;
use tokio::time::Instant;
use tracing::debug;

use crate::error::{BybitError, Result};

/// Auth frames carry no `req_id`; acks are matched under this key
pub const AUTH_REQUEST_ID: &str = "auth";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestKind {
    Auth,
    Ping,
    Subscribe,
    Unsubscribe,
}

/// Acknowledgment fields of a control frame
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ack {
    pub success: bool,
    pub ret_msg: Option<String>,
    pub conn_id: Option<String>,
}

/// What a resolved request was waiting for
#[derive(Debug, Clone)]
pub struct Resolved {
    pub kind: RequestKind,
    pub topics: Vec<String>,
    pub elapsed: Duration,
}

pub type Completion = oneshot::Receiver<Result<Ack>>;

#[derive(Debug)]
struct PendingEntry {
    kind: RequestKind,
    epoch: u64,
    issued_at: Instant,
    topics: Vec<String>,
    responder: oneshot::Sender<Result<Ack>>,
}

impl PendingEntry {
    fn complete(self, outcome: Result<Ack>) {
        // receiver may be gone (fire-and-forget pings and subscribes)
        let _ = self.responder.send(outcome);
    }
}

#[derive(Debug, Default)]
pub struct PendingRequests {
    entries: Mutex<HashMap<String, PendingEntry>>,
}

impl PendingRequests {
    pub fn new() -> Self {
        Self::default()
    }

    /// Track a request; an entry already under `req_id` completes as stale.
    pub fn register(
        &self,
        req_id: impl Into<String>,
        kind: RequestKind,
        epoch: u64,
        topics: Vec<String>,
    ) -> Completion {
        let (responder, completion) = oneshot::channel();
        let entry = PendingEntry {
            kind,
            epoch,
            issued_at: Instant::now(),
            topics,
            responder,
        };
        let replaced = self.lock().insert(req_id.into(), entry);
        if let Some(previous) = replaced {
            let previous_epoch = previous.epoch;
            previous.complete(Err(BybitError::Stale {
                epoch: previous_epoch,
            }));
        }
        completion
    }

    /// Complete the request matching `req_id`, if any
    pub fn resolve(&self, req_id: &str, ack: Ack) -> Option<Resolved> {
        let entry = self.lock().remove(req_id)?;
        let resolved = Resolved {
            kind: entry.kind,
            topics: entry.topics.clone(),
            elapsed: entry.issued_at.elapsed(),
        };
        entry.complete(Ok(ack));
        Some(resolved)
    }

    pub fn remove(&self, req_id: &str) -> bool {
        self.lock().remove(req_id).is_some()
    }

    /// Fail every request issued in `epoch` as stale
    pub fn fail_epoch(&self, epoch: u64) -> usize {
        let drained: Vec<PendingEntry> = {
            let mut entries = self.lock();
            let ids: Vec<String> = entries
                .iter()
                .filter(|(_, entry)| entry.epoch == epoch)
                .map(|(id, _)| id.clone())
                .collect();
            ids.iter().filter_map(|id| entries.remove(id)).collect()
        };
        let count = drained.len();
        for entry in drained {
            entry.complete(Err(BybitError::Stale { epoch }));
        }
        if count > 0 {
            debug!(epoch, count, "stale pending requests failed");
        }
        count
    }

    pub fn fail_all(&self, err: &BybitError) -> usize {
        let drained: Vec<PendingEntry> = self.lock().drain().map(|(_, entry)| entry).collect();
        let count = drained.len();
        for entry in drained {
            entry.complete(Err(err.clone()));
        }
        count
    }

    /// Drop unacknowledged requests older than `max_age`
    pub fn prune_older_than(&self, max_age: Duration) -> usize {
        let mut entries = self.lock();
        let before = entries.len();
        entries.retain(|_, entry| entry.issued_at.elapsed() < max_age);
        before - entries.len()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, PendingEntry>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ok_ack() -> Ack {
        Ack {
            success: true,
            ret_msg: None,
            conn_id: Some("conn".into()),
        }
    }

    #[tokio::test]
    async fn resolve_completes_once() {
        let pending = PendingRequests::new();
        let completion = pending.register("req-1", RequestKind::Subscribe, 0, vec!["tickers.BTCUSDT".into()]);

        let resolved = pending.resolve("req-1", ok_ack()).unwrap();
        assert_eq!(resolved.kind, RequestKind::Subscribe);
        assert_eq!(resolved.topics, vec!["tickers.BTCUSDT".to_string()]);
        assert_eq!(completion.await.unwrap(), Ok(ok_ack()));

        assert!(pending.resolve("req-1", ok_ack()).is_none());
        assert!(pending.is_empty());
    }

    #[tokio::test]
    async fn reregistering_marks_previous_stale() {
        let pending = PendingRequests::new();
        let first = pending.register("ping", RequestKind::Ping, 1, Vec::new());
        let _second = pending.register("ping", RequestKind::Ping, 2, Vec::new());

        assert_eq!(first.await.unwrap(), Err(BybitError::Stale { epoch: 1 }));
        assert_eq!(pending.len(), 1);
    }

    #[tokio::test]
    async fn fail_epoch_only_touches_that_epoch() {
        let pending = PendingRequests::new();
        let old = pending.register("a", RequestKind::Subscribe, 3, Vec::new());
        let current = pending.register("b", RequestKind::Subscribe, 4, Vec::new());

        assert_eq!(pending.fail_epoch(3), 1);
        assert_eq!(old.await.unwrap(), Err(BybitError::Stale { epoch: 3 }));
        assert_eq!(pending.len(), 1);

        assert_eq!(pending.fail_all(&BybitError::ClosedConnectionUse), 1);
        assert_eq!(current.await.unwrap(), Err(BybitError::ClosedConnectionUse));
    }

    #[test]
    fn resolving_without_receiver_is_harmless() {
        let pending = PendingRequests::new();
        drop(pending.register("ping", RequestKind::Ping, 0, Vec::new()));
        assert!(pending.resolve("ping", ok_ack()).is_some());
    }

    #[test]
    fn prune_drops_old_entries() {
        let pending = PendingRequests::new();
        let _completion = pending.register("a", RequestKind::Subscribe, 0, Vec::new());
        assert_eq!(pending.prune_older_than(Duration::ZERO), 1);
        assert!(pending.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn prune_follows_runtime_clock() {
        let pending = PendingRequests::new();
        let _completion = pending.register("sub", RequestKind::Subscribe, 0, Vec::new());
        assert_eq!(pending.prune_older_than(Duration::from_secs(60)), 0);

        tokio::time::advance(Duration::from_secs(61)).await;
        assert_eq!(pending.prune_older_than(Duration::from_secs(60)), 1);
        assert!(pending.is_empty());
    }
}
