//! Publish transport boundary and an in-process implementation.
//!
//! The facade publishes exactly one message per topic per processed diff
//! batch, addressed to subscribers of that exact topic on the local node.
//! No cross-node fan-out happens here: the external tracker is assumed to
//! have already distributed the diff to every node that needs to dispatch
//! it locally.

use crate::error::PublishError;
use crate::types::PresenceDiff;
use async_trait::async_trait;
use dashmap::DashMap;
use tokio::sync::mpsc;

/// The publish transport, at its interface boundary.
#[async_trait]
pub trait PubSub: Send + Sync + 'static {
    /// Deliver `diff` to the local subscribers of `topic`.
    async fn local_broadcast(&self, topic: &str, diff: PresenceDiff) -> Result<(), PublishError>;
}

/// In-process pubsub backed by a topic registry.
///
/// Suitable for single-process deployments and tests. Subscribers receive
/// every diff published for their topic after the subscription was opened;
/// dropped receivers are pruned on the next broadcast.
#[derive(Debug, Default)]
pub struct LocalPubSub {
    subscribers: DashMap<String, Vec<mpsc::UnboundedSender<PresenceDiff>>>,
}

impl LocalPubSub {
    /// Create an empty pubsub.
    pub fn new() -> Self {
        Self::default()
    }

    /// Subscribe to diffs published for `topic`.
    pub fn subscribe(&self, topic: &str) -> mpsc::UnboundedReceiver<PresenceDiff> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.subscribers.entry(topic.to_string()).or_default().push(tx);
        rx
    }

    /// Number of live subscriptions for `topic`.
    pub fn subscriber_count(&self, topic: &str) -> usize {
        self.subscribers
            .get(topic)
            .map(|senders| senders.iter().filter(|tx| !tx.is_closed()).count())
            .unwrap_or(0)
    }
}

#[async_trait]
impl PubSub for LocalPubSub {
    async fn local_broadcast(&self, topic: &str, diff: PresenceDiff) -> Result<(), PublishError> {
        if let Some(mut senders) = self.subscribers.get_mut(topic) {
            senders.retain(|tx| tx.send(diff.clone()).is_ok());
            tracing::debug!(
                topic = %topic,
                subscriber_count = senders.len(),
                joins = diff.joins.len(),
                leaves = diff.leaves.len(),
                "delivered presence diff to local subscribers"
            );
        }
        Ok(())
    }
}
