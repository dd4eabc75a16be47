//! The presence facade: configuration, start-up, and point-in-time queries.

use crate::error::PresenceError;
use crate::fetcher::{fetch_group, Fetcher};
use crate::pubsub::PubSub;
use crate::supervisor::{self, SupervisorHandle, SupervisorSpec};
use crate::tracker::Tracker;
use crate::types::{GroupedPresence, PresenceMeta, PresenceState};
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

/// Configuration for starting a [`Presence`] facade.
#[derive(Debug, Clone)]
pub struct PresenceConfig {
    /// The name of this presence instance, used in log output.
    pub name: String,
    /// Delay between restart attempts of the dispatch stages.
    pub restart_backoff: Duration,
}

impl PresenceConfig {
    /// Create a configuration with the default restart backoff.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            restart_backoff: Duration::from_millis(100),
        }
    }

    /// Override the restart backoff.
    pub fn restart_backoff(mut self, backoff: Duration) -> Self {
        self.restart_backoff = backoff;
        self
    }

    fn validate(&self) -> Result<(), PresenceError> {
        if self.name.trim().is_empty() {
            return Err(PresenceError::Configuration(
                "presence name must not be empty".to_string(),
            ));
        }
        Ok(())
    }
}

/// A running presence facade.
///
/// An explicit handle rather than a named global: it owns the binding to the
/// external tracker, the publish transport, the extension hook, and the
/// supervised dispatch pipeline. Queries go through [`Presence::list`] and
/// [`Presence::get_by_key`]; diff broadcasting runs in the background from
/// the moment `start` returns.
pub struct Presence {
    config: PresenceConfig,
    tracker: Arc<dyn Tracker>,
    fetcher: Arc<dyn Fetcher>,
    supervisor: SupervisorHandle,
    failures: Mutex<Option<mpsc::UnboundedReceiver<PresenceError>>>,
}

impl std::fmt::Debug for Presence {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Presence")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl Presence {
    /// Start the facade.
    ///
    /// Brings up the dispatch pool, then the tracker binding, in that order;
    /// a tracker that refuses the initial subscription fails the start. The
    /// fetcher is shared by queries and diff dispatch, invoked once per
    /// grouped map in both paths.
    pub async fn start(
        config: PresenceConfig,
        tracker: Arc<dyn Tracker>,
        pubsub: Arc<dyn PubSub>,
        fetcher: Arc<dyn Fetcher>,
    ) -> Result<Self, PresenceError> {
        config.validate()?;

        let (fail_tx, fail_rx) = mpsc::unbounded_channel();
        let supervisor = supervisor::start(SupervisorSpec {
            name: config.name.clone(),
            restart_backoff: config.restart_backoff,
            tracker: tracker.clone(),
            pubsub,
            fetcher: fetcher.clone(),
            failures: fail_tx,
            pool_kill: None,
        })
        .await?;

        tracing::info!(name = %config.name, "presence facade started");
        Ok(Self {
            config,
            tracker,
            fetcher,
            supervisor,
            failures: Mutex::new(Some(fail_rx)),
        })
    }

    /// The configured instance name.
    pub fn name(&self) -> &str {
        &self.config.name
    }

    /// All presences for `topic`, grouped per key and enriched.
    ///
    /// Queries the tracker, groups the entries preserving per-key order,
    /// and applies the extension hook once for the whole topic. Blocks the
    /// caller until both complete; nothing is cached.
    pub async fn list(&self, topic: &str) -> Result<GroupedPresence, PresenceError> {
        let entries = self.tracker.query_topic(topic).await?;
        fetch_group(&self.fetcher, topic, entries).await
    }

    /// The enriched metadata entries for `(topic, key)`, in registration
    /// order, or an empty list.
    ///
    /// A key with no entries short-circuits without invoking the hook.
    /// Otherwise the entries are wrapped as a single-key grouped map and run
    /// through the same hook as [`Presence::list`], so enrichment is
    /// identical whether querying one key or a whole topic.
    pub async fn get_by_key(
        &self,
        topic: &str,
        key: &str,
    ) -> Result<Vec<PresenceMeta>, PresenceError> {
        let metas = self.tracker.query_key(topic, key).await?;
        if metas.is_empty() {
            return Ok(Vec::new());
        }

        let mut grouped = GroupedPresence::new();
        grouped.insert(key.to_string(), PresenceState::from_metas(metas));
        let mut fetched = self.fetcher.fetch(topic, grouped).await?;

        match fetched.remove(key) {
            Some(state) => Ok(state.metas),
            None => Err(PresenceError::HookContractViolation {
                topic: topic.to_string(),
                key: key.to_string(),
            }),
        }
    }

    /// Take the failure-event stream.
    ///
    /// Dispatch-unit failures (hook errors, publish errors, panics) are
    /// isolated from the pipeline and reported here for the integrator's
    /// logging or alerting. Yields `None` after the first call.
    pub fn take_failures(&self) -> Option<mpsc::UnboundedReceiver<PresenceError>> {
        self.failures.lock().take()
    }

    /// Stop diff dispatch and tear down the pipeline, stage 2 before
    /// stage 1. In-flight dispatch units are given a grace period to finish.
    pub async fn shutdown(self) {
        tracing::info!(name = %self.config.name, "presence facade shutting down");
        self.supervisor.shutdown().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_defaults() {
        let config = PresenceConfig::new("presence");
        assert_eq!(config.name, "presence");
        assert_eq!(config.restart_backoff, Duration::from_millis(100));
    }

    #[test]
    fn test_config_rejects_empty_name() {
        assert!(PresenceConfig::new("").validate().is_err());
        assert!(PresenceConfig::new("  ").validate().is_err());
        assert!(PresenceConfig::new("ok").validate().is_ok());
    }
}
