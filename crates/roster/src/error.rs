//! Error types for presence operations.

use thiserror::Error;

/// Errors surfaced by the presence facade.
#[derive(Debug, Error)]
pub enum PresenceError {
    /// A required binding was missing or invalid at start-up.
    #[error("invalid configuration: {0}")]
    Configuration(String),

    /// An extension hook dropped a key that was present in its input.
    #[error("extension hook dropped key {key:?} for topic {topic:?}")]
    HookContractViolation {
        /// The topic the hook was invoked for.
        topic: String,
        /// The key missing from the hook's output.
        key: String,
    },

    /// An extension hook returned an error.
    #[error("extension hook failed: {0}")]
    Fetch(#[from] FetchError),

    /// The external tracking service failed to answer a query.
    #[error("upstream query failed: {0}")]
    UpstreamQuery(#[from] TrackerError),

    /// Publishing a diff to the transport failed.
    #[error("publish failed: {0}")]
    Publish(#[from] PublishError),

    /// A diff batch could not be scheduled or ran to failure.
    #[error("dispatch failed: {0}")]
    Dispatch(#[from] DispatchError),
}

/// Error returned by an extension hook implementation.
///
/// Hooks that perform I/O (e.g., a batched datastore lookup) wrap whatever
/// went wrong in a message string; the facade never inspects it beyond
/// logging and propagation.
#[derive(Debug, Error)]
#[error("{0}")]
pub struct FetchError(pub String);

impl FetchError {
    /// Create a new hook error from a message.
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }
}

/// Errors produced by the external tracking service boundary.
#[derive(Debug, Error)]
pub enum TrackerError {
    /// A point-in-time query could not be answered.
    #[error("query failed: {0}")]
    QueryFailed(String),

    /// The diff subscription could not be established.
    #[error("subscription failed: {0}")]
    SubscriptionFailed(String),

    /// The tracker connection is gone.
    #[error("tracker disconnected")]
    Disconnected,
}

/// Errors produced by the publish transport boundary.
#[derive(Debug, Error)]
pub enum PublishError {
    /// The transport rejected or failed to deliver the message.
    #[error("broadcast failed: {0}")]
    BroadcastFailed(String),

    /// The transport is no longer accepting messages.
    #[error("transport closed")]
    TransportClosed,
}

/// Errors related to scheduling asynchronous dispatch units.
#[derive(Debug, Error)]
pub enum DispatchError {
    /// The worker pool is not accepting jobs (driver terminated).
    #[error("worker pool unavailable")]
    PoolUnavailable,

    /// A dispatch unit panicked and was torn down by the pool.
    #[error("dispatch unit panicked")]
    UnitPanicked,
}
