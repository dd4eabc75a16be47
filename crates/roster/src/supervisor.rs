//! Lifecycle supervision for the dispatch pipeline.
//!
//! Bring-up is strictly ordered: stage 1 starts the worker pool, stage 2
//! binds the tracker's diff subscription with a handle to that pool. The
//! coupling of restarts is directional: a dead pool forces the binding to be
//! rebuilt with a fresh pool handle (a stale handle would silently drop
//! dispatch capability), while a dead binding is restarted alone and leaves
//! the pool untouched.

use crate::dispatcher::DiffDispatcher;
use crate::error::PresenceError;
use crate::fetcher::Fetcher;
use crate::pool::{PoolHandle, TaskPool};
use crate::pubsub::PubSub;
use crate::tracker::Tracker;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::sleep;

/// Everything the supervisor needs to (re)build its two stages.
pub(crate) struct SupervisorSpec {
    pub(crate) name: String,
    pub(crate) restart_backoff: Duration,
    pub(crate) tracker: Arc<dyn Tracker>,
    pub(crate) pubsub: Arc<dyn PubSub>,
    pub(crate) fetcher: Arc<dyn Fetcher>,
    pub(crate) failures: mpsc::UnboundedSender<PresenceError>,
    /// Each received signal kills the live pool driver, forcing the
    /// stage-1-death restart path. `None` outside of fault injection.
    pub(crate) pool_kill: Option<mpsc::UnboundedReceiver<()>>,
}

/// Owner handle for a running supervision loop.
pub(crate) struct SupervisorHandle {
    shutdown: Option<oneshot::Sender<()>>,
    monitor: JoinHandle<()>,
}

impl SupervisorHandle {
    /// Tear down stage 2, then stage 1, then the monitor itself.
    pub(crate) async fn shutdown(mut self) {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
        let _ = self.monitor.await;
    }
}

/// Bring up both stages and spawn the monitor loop.
///
/// A subscribe failure here is fatal and returned to the caller; failures
/// after a successful start are handled by the restart discipline instead.
pub(crate) async fn start(mut spec: SupervisorSpec) -> Result<SupervisorHandle, PresenceError> {
    // Stage 1: the pool must exist before the event source that feeds it.
    let mut pool = TaskPool::start(spec.failures.clone());

    // Stage 2: bind the tracker with a handle to the live pool.
    let mut feed = start_feed(&spec, pool.handle()).await?;

    let mut pool_kill = spec.pool_kill.take();
    let (shutdown_tx, mut shutdown_rx) = oneshot::channel::<()>();
    let monitor = tokio::spawn(async move {
        loop {
            tokio::select! {
                _ = &mut shutdown_rx => {
                    feed.abort();
                    break;
                }
                Some(()) = recv_kill(&mut pool_kill) => {
                    pool.kill();
                }
                _ = pool.died() => {
                    tracing::error!(
                        name = %spec.name,
                        "dispatch pool terminated, rebuilding pool and tracker binding"
                    );
                    feed.abort();
                    sleep(spec.restart_backoff).await;
                    pool = TaskPool::start(spec.failures.clone());
                    feed = restart_feed(&spec, pool.handle()).await;
                }
                _ = &mut feed => {
                    tracing::warn!(
                        name = %spec.name,
                        "tracker binding terminated, restarting binding"
                    );
                    sleep(spec.restart_backoff).await;
                    feed = restart_feed(&spec, pool.handle()).await;
                }
            }
        }
        pool.stop().await;
    });

    Ok(SupervisorHandle {
        shutdown: Some(shutdown_tx),
        monitor,
    })
}

/// Subscribe to the tracker and spawn the binding task that forwards each
/// received batch to the dispatcher.
async fn start_feed(
    spec: &SupervisorSpec,
    pool: PoolHandle,
) -> Result<JoinHandle<()>, PresenceError> {
    let mut diffs = spec.tracker.subscribe().await?;
    let dispatcher = DiffDispatcher::new(
        spec.fetcher.clone(),
        spec.pubsub.clone(),
        pool,
        spec.failures.clone(),
    );
    let name = spec.name.clone();

    Ok(tokio::spawn(async move {
        tracing::debug!(name = %name, "tracker binding established");
        while let Some(batch) = diffs.recv().await {
            if let Err(err) = dispatcher.submit(batch) {
                tracing::warn!(
                    name = %name,
                    error = %err,
                    "worker pool unavailable, dropping diff batch"
                );
                break;
            }
        }
        tracing::debug!(name = %name, "tracker diff stream ended");
    }))
}

/// Receive a kill signal, or never resolve when no channel was supplied.
async fn recv_kill(kill: &mut Option<mpsc::UnboundedReceiver<()>>) -> Option<()> {
    match kill {
        Some(rx) => rx.recv().await,
        None => std::future::pending().await,
    }
}

/// Re-establish the binding, retrying until the tracker accepts.
async fn restart_feed(spec: &SupervisorSpec, pool: PoolHandle) -> JoinHandle<()> {
    loop {
        match start_feed(spec, pool.clone()).await {
            Ok(feed) => return feed,
            Err(err) => {
                tracing::error!(
                    name = %spec.name,
                    error = %err,
                    "failed to rebind tracker subscription, retrying"
                );
                sleep(spec.restart_backoff).await;
            }
        }
    }
}
