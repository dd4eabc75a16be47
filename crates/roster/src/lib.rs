//! # Roster - presence facade over an external process tracker
//!
//! Roster turns raw membership-change events from a distributed
//! process-tracking service into application-visible presence updates: a
//! per-key list of metadata entries in stable order, optionally enriched by
//! an integrator-supplied hook, and broadcast to topic subscribers.
//!
//! # Architecture
//!
//! Like Phoenix.Presence, this crate is a facade over two collaborators it
//! does not implement: the tracker that maintains cluster-wide registration
//! state and computes join/leave diffs, and the pubsub transport that
//! delivers messages to local subscribers.
//!
//! - **Grouping** converts a flat sequence of (key, metadata) entries into a
//!   per-key map, preserving each key's metadata order
//! - **The extension hook** ([`Fetcher`]) enriches a grouped map in one
//!   batched call per topic, instead of one lookup per key
//! - **The query facade** ([`Presence::list`], [`Presence::get_by_key`])
//!   answers point-in-time questions by pulling from the tracker
//! - **The diff dispatcher** processes each diff batch as one isolated
//!   asynchronous unit and publishes a `{joins, leaves}` message per topic
//! - **The lifecycle supervisor** keeps the worker pool alive before and
//!   across restarts of the tracker binding that depends on it
//!
//! The facade holds no presence state of its own: every query re-asks the
//! tracker, and diffs are transient.
//!
//! # Starting the facade
//!
//! ```ignore
//! use roster::{IdentityFetcher, LocalPubSub, Presence, PresenceConfig};
//! use std::sync::Arc;
//!
//! let pubsub = Arc::new(LocalPubSub::new());
//! let presence = Presence::start(
//!     PresenceConfig::new("my_presence"),
//!     tracker,                     // Arc<dyn Tracker>, your tracker binding
//!     pubsub.clone(),
//!     Arc::new(IdentityFetcher),   // or your own Fetcher
//! )
//! .await?;
//!
//! // Subscribers see one PresenceDiff per topic per processed batch.
//! let mut diffs = pubsub.subscribe("room:lobby");
//!
//! // Point-in-time queries share the same grouping and enrichment.
//! let presences = presence.list("room:lobby").await?;
//! for (key, state) in presences {
//!     println!("{}: {} connection(s)", key, state.metas.len());
//! }
//! ```
//!
//! # Enrichment
//!
//! ```ignore
//! use roster::{Fetcher, FetchError, GroupedPresence};
//!
//! struct UserFetcher { db: Database }
//!
//! #[async_trait::async_trait]
//! impl Fetcher for UserFetcher {
//!     async fn fetch(
//!         &self,
//!         _topic: &str,
//!         mut grouped: GroupedPresence,
//!     ) -> Result<GroupedPresence, FetchError> {
//!         // One batched lookup for all keys, never one per key.
//!         let users = self.db.users(grouped.keys()).await?;
//!         for (key, state) in grouped.iter_mut() {
//!             state.extra.insert("user".into(), users[key].clone());
//!         }
//!         Ok(grouped)
//!     }
//! }
//! ```

#![deny(missing_docs)]

pub mod dispatcher;
pub mod error;
pub mod fetcher;
pub mod group;
pub mod pool;
pub mod presence;
pub mod pubsub;
mod supervisor;
pub mod testing;
pub mod tracker;
pub mod types;

pub use dispatcher::DiffDispatcher;
pub use error::{DispatchError, FetchError, PresenceError, PublishError, TrackerError};
pub use fetcher::{Fetcher, IdentityFetcher};
pub use group::group;
pub use pool::{PoolHandle, TaskPool};
pub use presence::{Presence, PresenceConfig};
pub use pubsub::{LocalPubSub, PubSub};
pub use tracker::Tracker;
pub use types::{
    DiffBatch, GroupedPresence, Meta, PresenceDiff, PresenceEntry, PresenceMeta, PresenceRef,
    PresenceState, TopicDiff,
};
