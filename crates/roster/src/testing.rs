//! In-memory collaborators for exercising the facade without a real tracker.

use crate::error::TrackerError;
use crate::tracker::Tracker;
use crate::types::{DiffBatch, PresenceEntry, PresenceMeta, PresenceRef};
use async_trait::async_trait;
use dashmap::DashMap;
use parking_lot::Mutex;
use serde_json::Value;
use tokio::sync::mpsc;

/// A scriptable in-memory tracker.
///
/// Point-query state is set up with [`MemoryTracker::insert`]; diff events
/// are injected with [`MemoryTracker::push_batch`] and fan out to every open
/// subscription. [`MemoryTracker::close_taps`] ends all open subscriptions,
/// simulating a tracker-side restart.
#[derive(Debug, Default)]
pub struct MemoryTracker {
    topics: DashMap<String, Vec<PresenceEntry>>,
    taps: Mutex<Vec<mpsc::UnboundedSender<DiffBatch>>>,
}

impl MemoryTracker {
    /// Create an empty tracker.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an entry under `topic`, after any existing entries.
    pub fn insert(&self, topic: &str, entry: PresenceEntry) {
        self.topics.entry(topic.to_string()).or_default().push(entry);
    }

    /// Deliver a diff batch to every open subscription.
    pub fn push_batch(&self, batch: DiffBatch) {
        let mut taps = self.taps.lock();
        taps.retain(|tap| tap.send(batch.clone()).is_ok());
    }

    /// End every open subscription.
    pub fn close_taps(&self) {
        self.taps.lock().clear();
    }

    /// Number of open subscriptions.
    pub fn tap_count(&self) -> usize {
        let mut taps = self.taps.lock();
        taps.retain(|tap| !tap.is_closed());
        taps.len()
    }
}

#[async_trait]
impl Tracker for MemoryTracker {
    async fn query_topic(&self, topic: &str) -> Result<Vec<PresenceEntry>, TrackerError> {
        Ok(self
            .topics
            .get(topic)
            .map(|entries| entries.value().clone())
            .unwrap_or_default())
    }

    async fn query_key(
        &self,
        topic: &str,
        key: &str,
    ) -> Result<Vec<PresenceMeta>, TrackerError> {
        Ok(self
            .topics
            .get(topic)
            .map(|entries| {
                entries
                    .iter()
                    .filter(|entry| entry.key == key)
                    .map(|entry| entry.meta.clone())
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn subscribe(&self) -> Result<mpsc::UnboundedReceiver<DiffBatch>, TrackerError> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.taps.lock().push(tx);
        Ok(rx)
    }
}

/// Build an entry with an empty metadata map.
pub fn entry(key: &str, entry_ref: &str) -> PresenceEntry {
    PresenceEntry::new(key, PresenceMeta::new(PresenceRef::from_string(entry_ref)))
}

/// Build an entry carrying the given metadata fields.
pub fn entry_with(key: &str, entry_ref: &str, fields: Vec<(&str, Value)>) -> PresenceEntry {
    let mut meta = PresenceMeta::new(PresenceRef::from_string(entry_ref));
    for (name, value) in fields {
        meta = meta.with_field(name, value);
    }
    PresenceEntry::new(key, meta)
}
