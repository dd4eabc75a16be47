//! Boundary trait for the external distributed tracking service.
//!
//! The tracker maintains the cluster-wide registration state and computes
//! join/leave diffs; this crate consumes it as an opaque source of point
//! queries and diff events. Its internal replication and anti-entropy
//! protocol are not this crate's concern.

use crate::error::TrackerError;
use crate::types::{DiffBatch, PresenceEntry, PresenceMeta};
use async_trait::async_trait;
use tokio::sync::mpsc;

/// The external tracking service, at its interface boundary.
#[async_trait]
pub trait Tracker: Send + Sync + 'static {
    /// All entries registered under `topic`, in registration order.
    async fn query_topic(&self, topic: &str) -> Result<Vec<PresenceEntry>, TrackerError>;

    /// Metadata for the entries registered under `(topic, key)` only, in
    /// registration order.
    async fn query_key(&self, topic: &str, key: &str)
        -> Result<Vec<PresenceMeta>, TrackerError>;

    /// Open a diff subscription.
    ///
    /// The tracker delivers one [`DiffBatch`] per membership change event;
    /// a batch may bundle changes for several topics. Delivery is
    /// at-least-once from the consumer's perspective and the consumer does
    /// not de-duplicate; a closed channel means the binding must be
    /// re-established.
    async fn subscribe(&self) -> Result<mpsc::UnboundedReceiver<DiffBatch>, TrackerError>;
}
