//! Asynchronous, fault-isolated dispatch of diff batches.
//!
//! One tracker event may bundle membership changes for several topics. The
//! dispatcher schedules exactly one pool job per batch and returns to the
//! diff source immediately, so ingestion is never slowed by hook or publish
//! latency. Inside the job, each topic's joins and leaves are grouped and
//! enriched through two separate hook calls before the topic's
//! `{joins, leaves}` message is published to local subscribers.

use crate::error::{DispatchError, PresenceError};
use crate::fetcher::{fetch_group, Fetcher};
use crate::pool::PoolHandle;
use crate::pubsub::PubSub;
use crate::types::{DiffBatch, PresenceDiff, TopicDiff};
use futures::FutureExt;
use std::sync::Arc;
use tokio::sync::mpsc;

/// Consumes diff batches and publishes enriched per-topic diffs.
#[derive(Clone)]
pub struct DiffDispatcher {
    fetcher: Arc<dyn Fetcher>,
    pubsub: Arc<dyn PubSub>,
    pool: PoolHandle,
    failures: mpsc::UnboundedSender<PresenceError>,
}

impl DiffDispatcher {
    /// Create a dispatcher bound to a worker pool.
    pub fn new(
        fetcher: Arc<dyn Fetcher>,
        pubsub: Arc<dyn PubSub>,
        pool: PoolHandle,
        failures: mpsc::UnboundedSender<PresenceError>,
    ) -> Self {
        Self {
            fetcher,
            pubsub,
            pool,
            failures,
        }
    }

    /// Schedule one dispatch unit for `batch` and return immediately.
    ///
    /// The unit captures the batch by value; it runs concurrently with any
    /// subsequently submitted batches and may complete out of order relative
    /// to them. A failure inside the unit is confined to it: logged,
    /// reported to the failure channel, never retried.
    pub fn submit(&self, batch: DiffBatch) -> Result<(), DispatchError> {
        if batch.values().all(TopicDiff::is_empty) {
            tracing::trace!("skipping empty diff batch");
            return Ok(());
        }

        let fetcher = self.fetcher.clone();
        let pubsub = self.pubsub.clone();
        let failures = self.failures.clone();

        let job = async move {
            for (topic, diff) in batch {
                if let Err(err) = process_topic(&fetcher, &pubsub, &topic, diff).await {
                    tracing::error!(
                        topic = %topic,
                        error = %err,
                        "presence diff dispatch failed for topic"
                    );
                    let _ = failures.send(err);
                }
            }
            Ok(())
        }
        .boxed();

        self.pool.submit(job)
    }
}

/// Group, enrich, and publish one topic's diff.
///
/// Joins and leaves go through separate hook calls so an implementation can
/// distinguish join context from leave context; both must complete before
/// the topic's publish.
async fn process_topic(
    fetcher: &Arc<dyn Fetcher>,
    pubsub: &Arc<dyn PubSub>,
    topic: &str,
    diff: TopicDiff,
) -> Result<(), PresenceError> {
    let joins = fetch_group(fetcher, topic, diff.joins).await?;
    let leaves = fetch_group(fetcher, topic, diff.leaves).await?;

    tracing::debug!(
        topic = %topic,
        joins = joins.len(),
        leaves = leaves.len(),
        "publishing presence diff"
    );
    pubsub
        .local_broadcast(topic, PresenceDiff { joins, leaves })
        .await?;
    Ok(())
}
