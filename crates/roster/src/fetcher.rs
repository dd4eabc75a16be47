//! Extension-hook protocol for batched presence enrichment.
//!
//! An integrator supplies a [`Fetcher`] to enrich grouped presence data in
//! one batched call per (topic, grouped map), typically resolving all keys
//! against a datastore at once instead of once per key.
//!
//! # Contract
//!
//! - Every key present in the input must be present in the output.
//! - The `metas` list for each key must be carried through; hooks may merge
//!   additional fields into each meta's open map and into the per-key
//!   `extra` map, but must not drop registrations.
//! - Implementations must tolerate concurrent invocations for different
//!   topics; the facade issues hook calls with no serialization guarantee.
//!
//! A hook that drops a key surfaces as
//! [`PresenceError::HookContractViolation`] in the operation in progress.

use crate::error::{FetchError, PresenceError};
use crate::group::group;
use crate::types::{GroupedPresence, PresenceEntry};
use async_trait::async_trait;
use std::sync::Arc;

/// Integrator-supplied enrichment hook.
#[async_trait]
pub trait Fetcher: Send + Sync + 'static {
    /// Enrich a grouped presence map for `topic`.
    ///
    /// Invoked exactly once per grouped map; joins and leaves of a diff are
    /// enriched through two separate calls so an implementation never sees
    /// both sides at once.
    async fn fetch(
        &self,
        topic: &str,
        grouped: GroupedPresence,
    ) -> Result<GroupedPresence, FetchError>;
}

/// The default hook: returns its input unchanged.
#[derive(Debug, Clone, Copy, Default)]
pub struct IdentityFetcher;

#[async_trait]
impl Fetcher for IdentityFetcher {
    async fn fetch(
        &self,
        _topic: &str,
        grouped: GroupedPresence,
    ) -> Result<GroupedPresence, FetchError> {
        Ok(grouped)
    }
}

/// Group entries, run the hook once, and verify the key-set contract.
pub(crate) async fn fetch_group(
    fetcher: &Arc<dyn Fetcher>,
    topic: &str,
    entries: Vec<PresenceEntry>,
) -> Result<GroupedPresence, PresenceError> {
    let grouped = group(entries);
    let keys: Vec<String> = grouped.keys().cloned().collect();
    let fetched = fetcher.fetch(topic, grouped).await?;
    verify_fetched(topic, &keys, &fetched)?;
    Ok(fetched)
}

/// Check that every input key survived the hook.
pub(crate) fn verify_fetched(
    topic: &str,
    expected_keys: &[String],
    fetched: &GroupedPresence,
) -> Result<(), PresenceError> {
    for key in expected_keys {
        if !fetched.contains_key(key) {
            return Err(PresenceError::HookContractViolation {
                topic: topic.to_string(),
                key: key.clone(),
            });
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{PresenceMeta, PresenceRef};

    fn entry(key: &str, entry_ref: &str) -> PresenceEntry {
        PresenceEntry::new(key, PresenceMeta::new(PresenceRef::from_string(entry_ref)))
    }

    #[tokio::test]
    async fn test_identity_fetcher_returns_input_unchanged() {
        let fetcher: Arc<dyn Fetcher> = Arc::new(IdentityFetcher);
        let fetched = fetch_group(&fetcher, "room:lobby", vec![entry("a", "r1"), entry("a", "r2")])
            .await
            .unwrap();

        assert_eq!(fetched.len(), 1);
        assert_eq!(fetched["a"].metas.len(), 2);
        assert!(fetched["a"].extra.is_empty());
    }

    #[tokio::test]
    async fn test_dropped_key_is_a_contract_violation() {
        struct DropAll;

        #[async_trait]
        impl Fetcher for DropAll {
            async fn fetch(
                &self,
                _topic: &str,
                _grouped: GroupedPresence,
            ) -> Result<GroupedPresence, FetchError> {
                Ok(GroupedPresence::new())
            }
        }

        let fetcher: Arc<dyn Fetcher> = Arc::new(DropAll);
        let err = fetch_group(&fetcher, "room:lobby", vec![entry("a", "r1")])
            .await
            .unwrap_err();

        match err {
            PresenceError::HookContractViolation { topic, key } => {
                assert_eq!(topic, "room:lobby");
                assert_eq!(key, "a");
            }
            other => panic!("expected contract violation, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_hook_error_propagates() {
        struct Failing;

        #[async_trait]
        impl Fetcher for Failing {
            async fn fetch(
                &self,
                _topic: &str,
                _grouped: GroupedPresence,
            ) -> Result<GroupedPresence, FetchError> {
                Err(FetchError::new("datastore offline"))
            }
        }

        let fetcher: Arc<dyn Fetcher> = Arc::new(Failing);
        let err = fetch_group(&fetcher, "room:lobby", vec![entry("a", "r1")])
            .await
            .unwrap_err();
        assert!(matches!(err, PresenceError::Fetch(_)));
    }
}
