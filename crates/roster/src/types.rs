//! Presence data model.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::HashMap;

/// Opaque metadata map attached to a single registration.
///
/// The facade never edits metadata, only re-shapes the containers around it.
pub type Meta = Map<String, Value>;

/// A unique reference for one tracked registration.
///
/// Assigned by the external tracking service; opaque to this crate.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PresenceRef(String);

impl PresenceRef {
    /// Create a ref from a string.
    pub fn from_string(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    /// Get the ref as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for PresenceRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Metadata for a single presence registration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PresenceMeta {
    /// Unique reference for this registration.
    pub entry_ref: PresenceRef,
    /// Previous reference, present only when the registration was updated
    /// in place (metadata changed without re-registering).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prev_ref: Option<PresenceRef>,
    /// The registration's metadata.
    #[serde(flatten)]
    pub data: Meta,
}

impl PresenceMeta {
    /// Create metadata for a fresh registration.
    pub fn new(entry_ref: PresenceRef) -> Self {
        Self {
            entry_ref,
            prev_ref: None,
            data: Meta::new(),
        }
    }

    /// Record the previous registration ref for an update-in-place.
    pub fn with_prev(mut self, prev_ref: PresenceRef) -> Self {
        self.prev_ref = Some(prev_ref);
        self
    }

    /// Attach a metadata field.
    pub fn with_field(mut self, name: impl Into<String>, value: Value) -> Self {
        self.data.insert(name.into(), value);
        self
    }
}

/// A flat (key, metadata) pair as produced by the external tracker.
///
/// Many entries may share a key, e.g. one user present on several
/// connections.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PresenceEntry {
    /// The grouping key (stringified by the tracker).
    pub key: String,
    /// This registration's metadata.
    pub meta: PresenceMeta,
}

impl PresenceEntry {
    /// Create a new entry.
    pub fn new(key: impl Into<String>, meta: PresenceMeta) -> Self {
        Self {
            key: key.into(),
            meta,
        }
    }
}

/// Presence state for a single key.
///
/// `metas` holds one element per live registration, in registration order.
/// `extra` starts empty; extension hooks merge enrichment fields into it.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PresenceState {
    /// All metadata entries for this key, in input order.
    pub metas: Vec<PresenceMeta>,
    /// Arbitrary additional fields added by an extension hook.
    #[serde(flatten)]
    pub extra: Meta,
}

impl PresenceState {
    /// Wrap a metas list with no enrichment.
    pub fn from_metas(metas: Vec<PresenceMeta>) -> Self {
        Self {
            metas,
            extra: Meta::new(),
        }
    }
}

/// Mapping of key to per-key presence state.
///
/// Constructed fresh on every grouping call and never retained; the facade
/// holds no presence state of its own.
pub type GroupedPresence = HashMap<String, PresenceState>;

/// The per-topic message published to subscribers after a diff is processed.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PresenceDiff {
    /// Keys that joined (new or updated registrations).
    pub joins: GroupedPresence,
    /// Keys that left.
    pub leaves: GroupedPresence,
}

impl PresenceDiff {
    /// Check if the diff carries no changes.
    pub fn is_empty(&self) -> bool {
        self.joins.is_empty() && self.leaves.is_empty()
    }
}

/// Raw membership changes for one topic, as emitted by the tracker.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TopicDiff {
    /// Registrations that joined, in arrival order.
    pub joins: Vec<PresenceEntry>,
    /// Registrations that left, in arrival order.
    pub leaves: Vec<PresenceEntry>,
}

impl TopicDiff {
    /// Check if the diff carries no changes.
    pub fn is_empty(&self) -> bool {
        self.joins.is_empty() && self.leaves.is_empty()
    }
}

/// One tracker event: membership changes, possibly for several topics.
pub type DiffBatch = HashMap<String, TopicDiff>;
