//! Runs each worker in its own failure domain.
//!
//! A worker task that fails, panics or returns on its own is restarted after
//! a fixed backoff; the other workers keep running. Shutdown cancels one
//! shared token, waits for the workers to finish their current unit of work
//! and aborts whatever is still running once the grace period runs out.

use crate::config::SupervisorConfig;
use anyhow::Result;
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::task::AbortHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

#[async_trait::async_trait]
pub trait Worker: Send + Sync + 'static {
    fn name(&self) -> &'static str;

    /// Runs until `shutdown` is cancelled.
    ///
    /// # Errors
    ///
    /// An error means the control loop itself broke (typically the store
    /// went away); the supervisor restarts the worker.
    async fn run(&self, shutdown: CancellationToken) -> Result<()>;
}

struct AbortOnDrop(AbortHandle);

impl Drop for AbortOnDrop {
    fn drop(&mut self) {
        self.0.abort();
    }
}

pub struct Supervisor {
    workers: Vec<Arc<dyn Worker>>,
    restart_backoff: Duration,
    shutdown_grace: Duration,
}

impl Supervisor {
    #[must_use]
    pub const fn new(restart_backoff: Duration, shutdown_grace: Duration) -> Self {
        Self {
            workers: Vec::new(),
            restart_backoff,
            shutdown_grace,
        }
    }

    #[must_use]
    pub const fn from_config(config: &SupervisorConfig) -> Self {
        Self::new(config.restart_backoff(), config.shutdown_grace())
    }

    #[must_use]
    pub fn with_worker(mut self, worker: Arc<dyn Worker>) -> Self {
        self.workers.push(worker);
        self
    }

    #[must_use]
    pub fn worker_names(&self) -> Vec<&'static str> {
        self.workers.iter().map(|w| w.name()).collect()
    }

    /// Returns once `shutdown` resolves and every worker has stopped or the
    /// grace period elapsed.
    pub async fn run<F>(self, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()> + Send,
    {
        let token = CancellationToken::new();

        let handles: Vec<_> = self
            .workers
            .iter()
            .map(|worker| {
                info!(event = "worker_starting", worker = worker.name(), "Starting worker");
                tokio::spawn(supervise(
                    Arc::clone(worker),
                    token.clone(),
                    self.restart_backoff,
                ))
            })
            .collect();
        let abort_handles: Vec<AbortHandle> = handles.iter().map(|h| h.abort_handle()).collect();

        shutdown.await;

        info!(
            event = "shutdown_requested",
            grace_secs = self.shutdown_grace.as_secs(),
            "Stopping workers"
        );
        token.cancel();

        let start = Instant::now();
        if tokio::time::timeout(self.shutdown_grace, futures::future::join_all(handles))
            .await
            .is_err()
        {
            warn!(
                event = "shutdown_grace_elapsed",
                "Workers did not stop within the grace period, aborting"
            );
            for handle in abort_handles {
                handle.abort();
            }
        }

        info!(
            event = "shutdown_finished",
            duration_ms = u64::try_from(start.elapsed().as_millis()).unwrap_or(u64::MAX),
            "All workers stopped"
        );
        Ok(())
    }
}

async fn supervise(worker: Arc<dyn Worker>, token: CancellationToken, backoff: Duration) {
    let name = worker.name();
    let mut generation: u64 = 0;

    loop {
        if token.is_cancelled() {
            break;
        }
        generation += 1;

        let task_worker = Arc::clone(&worker);
        let task_token = token.clone();
        let handle = tokio::spawn(async move { task_worker.run(task_token).await });
        // Aborting this supervising task must take the worker task with it.
        let _guard = AbortOnDrop(handle.abort_handle());
        let result = handle.await;

        if token.is_cancelled() {
            match result {
                Ok(Ok(())) => debug!(worker = name, "Worker stopped"),
                Ok(Err(e)) => warn!(worker = name, error = %e, "Worker failed while stopping"),
                Err(e) => warn!(worker = name, error = %e, "Worker task ended while stopping"),
            }
            break;
        }

        match result {
            Ok(Ok(())) => warn!(
                event = "worker_exited",
                worker = name,
                generation,
                "Worker returned without a shutdown request"
            ),
            Ok(Err(e)) => error!(
                event = "worker_failed",
                worker = name,
                generation,
                error = %e,
                "Worker failed"
            ),
            Err(e) if e.is_panic() => error!(
                event = "worker_panicked",
                worker = name,
                generation,
                "Worker panicked"
            ),
            Err(e) => error!(
                event = "worker_failed",
                worker = name,
                generation,
                error = %e,
                "Worker task was cancelled"
            ),
        }

        metrics::counter!("supervisor_restarts_total", "worker" => name).increment(1);
        info!(
            event = "worker_restart_scheduled",
            worker = name,
            backoff_ms = u64::try_from(backoff.as_millis()).unwrap_or(u64::MAX),
            "Restarting worker after backoff"
        );

        tokio::select! {
            () = token.cancelled() => break,
            () = tokio::time::sleep(backoff) => {}
        }
    }
}
