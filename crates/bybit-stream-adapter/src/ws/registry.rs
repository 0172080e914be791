/*
[INPUT]:  Topic keys and handlers from subscribers
[OUTPUT]: Insertion-ordered subscription table for dispatch and replay
[POS]:    WebSocket layer - subscription registry
[UPDATE]: When changing replace/replay policy
*/

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use super::message::TopicMessage;

/// Called synchronously on the receive loop for each data frame of a topic
pub type TopicHandler = Arc<dyn Fn(&TopicMessage) + Send + Sync>;

/// Identifies one registration; inert once its topic is replaced or removed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionHandle(u64);

impl SubscriptionHandle {
    pub fn id(self) -> u64 {
        self.0
    }
}

/// Outcome of [`SubscriptionRegistry::register`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Registration {
    pub handle: SubscriptionHandle,
    /// The topic was already registered and only its handler changed
    pub replaced: bool,
}

struct Entry {
    topic: String,
    handle: SubscriptionHandle,
    handler: TopicHandler,
    active: bool,
}

#[derive(Default)]
pub struct SubscriptionRegistry {
    entries: Mutex<Vec<Entry>>,
    next_handle: AtomicU64,
}

impl SubscriptionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `topic`. An existing topic keeps its position and active flag
    /// and only swaps in the new handler.
    pub fn register(&self, topic: impl Into<String>, handler: TopicHandler) -> Registration {
        let topic = topic.into();
        let handle = SubscriptionHandle(self.next_handle.fetch_add(1, Ordering::Relaxed) + 1);
        let mut entries = self.lock();
        let replaced = match entries.iter_mut().find(|entry| entry.topic == topic) {
            Some(entry) => {
                entry.handle = handle;
                entry.handler = handler;
                true
            }
            None => {
                entries.push(Entry {
                    topic,
                    handle,
                    handler,
                    active: false,
                });
                false
            }
        };
        Registration { handle, replaced }
    }

    /// Remove by handle; returns the topic when the handle was still current
    pub fn unregister(&self, handle: SubscriptionHandle) -> Option<String> {
        let mut entries = self.lock();
        let index = entries.iter().position(|entry| entry.handle == handle)?;
        Some(entries.remove(index).topic)
    }

    pub fn unregister_topic(&self, topic: &str) -> bool {
        let mut entries = self.lock();
        let before = entries.len();
        entries.retain(|entry| entry.topic != topic);
        entries.len() != before
    }

    /// Topics in insertion order, for resubscription
    pub fn replay_all(&self) -> Vec<String> {
        self.topics()
    }

    pub fn topics(&self) -> Vec<String> {
        self.lock().iter().map(|entry| entry.topic.clone()).collect()
    }

    /// Handler snapshot; the lock is released before the caller invokes it
    pub fn lookup(&self, topic: &str) -> Option<TopicHandler> {
        self.lock()
            .iter()
            .find(|entry| entry.topic == topic)
            .map(|entry| entry.handler.clone())
    }

    pub fn mark_active<S: AsRef<str>>(&self, topics: &[S]) {
        let mut entries = self.lock();
        for topic in topics {
            if let Some(entry) = entries.iter_mut().find(|entry| entry.topic == topic.as_ref()) {
                entry.active = true;
            }
        }
    }

    pub fn is_active(&self, topic: &str) -> bool {
        self.lock()
            .iter()
            .any(|entry| entry.topic == topic && entry.active)
    }

    /// Everything goes back to pending before a replay
    pub fn reset_active(&self) {
        for entry in self.lock().iter_mut() {
            entry.active = false;
        }
    }

    pub fn contains(&self, topic: &str) -> bool {
        self.lock().iter().any(|entry| entry.topic == topic)
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    pub fn clear(&self) {
        self.lock().clear();
    }

    fn lock(&self) -> MutexGuard<'_, Vec<Entry>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl fmt::Debug for SubscriptionRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SubscriptionRegistry")
            .field("topics", &self.topics())
            .finish()
    }
}
