//! Worker pool for asynchronous dispatch units.
//!
//! Each submitted job runs as its own task: jobs never block one another and
//! never block the submitter. The pool observes every completion; a job that
//! returns an error or panics is logged and reported to the failure channel,
//! and nothing else is affected. Jobs are never retried.

use crate::error::{DispatchError, PresenceError};
use futures::future::BoxFuture;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tokio::task::{JoinError, JoinHandle, JoinSet};

/// A unit of asynchronous dispatch work.
pub type Job = BoxFuture<'static, Result<(), PresenceError>>;

/// How long `stop` waits for in-flight units before tearing the driver down.
const STOP_GRACE: Duration = Duration::from_secs(5);

/// Cloneable submission side of a [`TaskPool`].
///
/// A handle outlives the pool it was taken from; submitting into a dead pool
/// fails with [`DispatchError::PoolUnavailable`] rather than blocking.
#[derive(Debug, Clone)]
pub struct PoolHandle {
    jobs: mpsc::UnboundedSender<Job>,
}

impl PoolHandle {
    /// Schedule a job. Returns as soon as the job is queued.
    pub fn submit(&self, job: Job) -> Result<(), DispatchError> {
        self.jobs
            .send(job)
            .map_err(|_| DispatchError::PoolUnavailable)
    }
}

/// Owns the driver task that runs dispatch units.
#[derive(Debug)]
pub struct TaskPool {
    jobs: mpsc::UnboundedSender<Job>,
    stop: oneshot::Sender<()>,
    driver: JoinHandle<()>,
}

impl TaskPool {
    /// Start a pool. Job failures and panics are forwarded to `failures`.
    pub fn start(failures: mpsc::UnboundedSender<PresenceError>) -> Self {
        let (jobs, mut job_rx) = mpsc::unbounded_channel::<Job>();
        let (stop, mut stop_rx) = oneshot::channel::<()>();

        let driver = tokio::spawn(async move {
            let mut running: JoinSet<Result<(), PresenceError>> = JoinSet::new();
            loop {
                tokio::select! {
                    _ = &mut stop_rx => break,
                    job = job_rx.recv() => match job {
                        Some(job) => {
                            running.spawn(job);
                        }
                        None => break,
                    },
                    Some(done) = running.join_next(), if !running.is_empty() => {
                        observe(done, &failures);
                    }
                }
            }
            // Stop accepting work. Jobs already accepted still run: drain
            // the queue into the set, then wait for everything in flight.
            while let Ok(job) = job_rx.try_recv() {
                running.spawn(job);
            }
            drop(job_rx);
            while let Some(done) = running.join_next().await {
                observe(done, &failures);
            }
        });

        Self { jobs, stop, driver }
    }

    /// Get a submission handle.
    pub fn handle(&self) -> PoolHandle {
        PoolHandle {
            jobs: self.jobs.clone(),
        }
    }

    /// Kill the driver task outright, abandoning queued and in-flight
    /// units, the way a driver crash would.
    pub(crate) fn kill(&self) {
        self.driver.abort();
    }

    /// Wait for the driver task to terminate.
    ///
    /// Resolves only if the pool dies (the driver does not exit while any
    /// submission handle is live); used by the lifecycle monitor.
    pub(crate) async fn died(&mut self) {
        let _ = (&mut self.driver).await;
    }

    /// Shut the pool down, waiting briefly for in-flight units.
    pub async fn stop(self) {
        let _ = self.stop.send(());
        drop(self.jobs);
        let mut driver = self.driver;
        if tokio::time::timeout(STOP_GRACE, &mut driver).await.is_err() {
            tracing::warn!("dispatch pool did not drain in time, aborting driver");
            driver.abort();
        }
    }
}

fn observe(
    done: Result<Result<(), PresenceError>, JoinError>,
    failures: &mpsc::UnboundedSender<PresenceError>,
) {
    match done {
        Ok(Ok(())) => {}
        Ok(Err(err)) => {
            tracing::error!(error = %err, "dispatch unit failed");
            let _ = failures.send(err);
        }
        Err(join_err) if join_err.is_panic() => {
            tracing::error!(error = %join_err, "dispatch unit panicked");
            let _ = failures.send(PresenceError::Dispatch(DispatchError::UnitPanicked));
        }
        Err(_) => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::FutureExt;

    #[tokio::test]
    async fn test_job_failure_is_reported_not_fatal() {
        let (fail_tx, mut fail_rx) = mpsc::unbounded_channel();
        let pool = TaskPool::start(fail_tx);
        let handle = pool.handle();

        handle
            .submit(async { Err(PresenceError::Configuration("boom".into())) }.boxed())
            .unwrap();
        let err = fail_rx.recv().await.unwrap();
        assert!(matches!(err, PresenceError::Configuration(_)));

        // The pool keeps accepting work afterwards.
        handle.submit(async { Ok(()) }.boxed()).unwrap();
        drop(handle);
        pool.stop().await;
    }

    #[tokio::test]
    async fn test_panicking_job_is_contained() {
        let (fail_tx, mut fail_rx) = mpsc::unbounded_channel();
        let pool = TaskPool::start(fail_tx);
        let handle = pool.handle();

        handle
            .submit(async { panic!("unit blew up") }.boxed())
            .unwrap();
        let err = fail_rx.recv().await.unwrap();
        assert!(matches!(
            err,
            PresenceError::Dispatch(DispatchError::UnitPanicked)
        ));

        handle.submit(async { Ok(()) }.boxed()).unwrap();
        drop(handle);
        pool.stop().await;
    }

    #[tokio::test]
    async fn test_jobs_queued_before_stop_still_run() {
        use std::sync::atomic::{AtomicBool, Ordering};
        use std::sync::Arc;

        let (fail_tx, _fail_rx) = mpsc::unbounded_channel();
        let pool = TaskPool::start(fail_tx);
        let ran = Arc::new(AtomicBool::new(false));

        let flag = ran.clone();
        pool.handle()
            .submit(
                async move {
                    flag.store(true, Ordering::SeqCst);
                    Ok(())
                }
                .boxed(),
            )
            .unwrap();

        // Stopping immediately: the job was accepted, so it must complete
        // even if the driver never got to spawn it before the stop signal.
        pool.stop().await;
        assert!(ran.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn test_submit_into_stopped_pool_fails() {
        let (fail_tx, _fail_rx) = mpsc::unbounded_channel();
        let pool = TaskPool::start(fail_tx);
        let handle = pool.handle();
        pool.stop().await;

        let err = handle.submit(async { Ok(()) }.boxed()).unwrap_err();
        assert!(matches!(err, DispatchError::PoolUnavailable));
    }
}
