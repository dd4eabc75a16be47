//! Order-preserving grouping of flat presence entries.

use crate::types::{GroupedPresence, PresenceEntry, PresenceState};

/// Group a flat sequence of (key, metadata) entries into a per-key map.
///
/// Duplicate keys accumulate: the metas list for a key holds that key's
/// metadata in the same relative order it appeared in the input. No ordering
/// is promised for the keys of the returned map itself.
///
/// Pure and total; empty input yields an empty map.
pub fn group(entries: Vec<PresenceEntry>) -> GroupedPresence {
    let mut grouped = GroupedPresence::with_capacity(entries.len());
    for entry in entries {
        grouped
            .entry(entry.key)
            .or_insert_with(PresenceState::default)
            .metas
            .push(entry.meta);
    }
    grouped
}
