//! Integration tests for worker supervision and shutdown.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::{Duration, Instant};

use anyhow::Result;
use pricehound::services::{Supervisor, Worker};
use tokio::sync::Notify;
use tokio_util::sync::CancellationToken;

enum Failure {
    Error,
    Panic,
    EarlyReturn,
}

/// Fails its first `failures` runs, then signals `ready` and runs until
/// cancelled.
struct FlakyWorker {
    name: &'static str,
    failures: usize,
    failure: Failure,
    runs: AtomicUsize,
    ready: Notify,
    stopped_cleanly: AtomicBool,
}

impl FlakyWorker {
    fn new(name: &'static str, failures: usize, failure: Failure) -> Arc<Self> {
        Arc::new(Self {
            name,
            failures,
            failure,
            runs: AtomicUsize::new(0),
            ready: Notify::new(),
            stopped_cleanly: AtomicBool::new(false),
        })
    }

    fn runs(&self) -> usize {
        self.runs.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl Worker for FlakyWorker {
    fn name(&self) -> &'static str {
        self.name
    }

    async fn run(&self, shutdown: CancellationToken) -> Result<()> {
        let run = self.runs.fetch_add(1, Ordering::SeqCst);
        if run < self.failures {
            match self.failure {
                Failure::Error => anyhow::bail!("store unavailable"),
                Failure::Panic => panic!("worker bug"),
                Failure::EarlyReturn => return Ok(()),
            }
        }

        self.ready.notify_one();
        shutdown.cancelled().await;
        self.stopped_cleanly.store(true, Ordering::SeqCst);
        Ok(())
    }
}

/// Ignores cancellation entirely.
struct StubbornWorker {
    dropped: Arc<AtomicBool>,
    started: Notify,
}

struct SetOnDrop(Arc<AtomicBool>);

impl Drop for SetOnDrop {
    fn drop(&mut self) {
        self.0.store(true, Ordering::SeqCst);
    }
}

#[async_trait::async_trait]
impl Worker for StubbornWorker {
    fn name(&self) -> &'static str {
        "stubborn"
    }

    async fn run(&self, _shutdown: CancellationToken) -> Result<()> {
        let _guard = SetOnDrop(Arc::clone(&self.dropped));
        self.started.notify_one();
        tokio::time::sleep(Duration::from_secs(600)).await;
        Ok(())
    }
}

fn supervisor() -> Supervisor {
    Supervisor::new(Duration::from_millis(10), Duration::from_secs(5))
}

#[tokio::test]
async fn test_failed_worker_is_restarted() {
    let worker = FlakyWorker::new("extraction", 2, Failure::Error);

    let waiter = Arc::clone(&worker);
    supervisor()
        .with_worker(worker.clone())
        .run(async move { waiter.ready.notified().await })
        .await
        .unwrap();

    assert_eq!(worker.runs(), 3);
    assert!(worker.stopped_cleanly.load(Ordering::SeqCst));
}

#[tokio::test]
async fn test_panicking_worker_is_restarted() {
    let worker = FlakyWorker::new("discovery", 1, Failure::Panic);

    let waiter = Arc::clone(&worker);
    supervisor()
        .with_worker(worker.clone())
        .run(async move { waiter.ready.notified().await })
        .await
        .unwrap();

    assert_eq!(worker.runs(), 2);
}

#[tokio::test]
async fn test_worker_that_returns_early_is_restarted() {
    let worker = FlakyWorker::new("extraction", 2, Failure::EarlyReturn);

    let waiter = Arc::clone(&worker);
    supervisor()
        .with_worker(worker.clone())
        .run(async move { waiter.ready.notified().await })
        .await
        .unwrap();

    assert_eq!(worker.runs(), 3);
    assert!(worker.stopped_cleanly.load(Ordering::SeqCst));
}

#[tokio::test]
async fn test_restarts_do_not_touch_other_workers() {
    let flaky = FlakyWorker::new("discovery", 3, Failure::Error);
    let steady = FlakyWorker::new("extraction", 0, Failure::Error);

    let waiter = Arc::clone(&flaky);
    let supervisor = supervisor()
        .with_worker(flaky.clone())
        .with_worker(steady.clone());
    assert_eq!(supervisor.worker_names(), vec!["discovery", "extraction"]);

    supervisor
        .run(async move { waiter.ready.notified().await })
        .await
        .unwrap();

    assert_eq!(flaky.runs(), 4);
    assert_eq!(steady.runs(), 1);
    assert!(steady.stopped_cleanly.load(Ordering::SeqCst));
}

#[tokio::test]
async fn test_shutdown_waits_for_cooperative_workers() {
    let a = FlakyWorker::new("discovery", 0, Failure::Error);
    let b = FlakyWorker::new("extraction", 0, Failure::Error);

    let (wa, wb) = (Arc::clone(&a), Arc::clone(&b));
    supervisor()
        .with_worker(a.clone())
        .with_worker(b.clone())
        .run(async move {
            wa.ready.notified().await;
            wb.ready.notified().await;
        })
        .await
        .unwrap();

    assert!(a.stopped_cleanly.load(Ordering::SeqCst));
    assert!(b.stopped_cleanly.load(Ordering::SeqCst));
    assert_eq!(a.runs(), 1);
    assert_eq!(b.runs(), 1);
}

#[tokio::test]
async fn test_unresponsive_worker_is_aborted_after_grace() {
    let dropped = Arc::new(AtomicBool::new(false));
    let worker = Arc::new(StubbornWorker {
        dropped: Arc::clone(&dropped),
        started: Notify::new(),
    });

    let waiter = Arc::clone(&worker);
    let start = Instant::now();
    Supervisor::new(Duration::from_millis(10), Duration::from_millis(100))
        .with_worker(worker)
        .run(async move { waiter.started.notified().await })
        .await
        .unwrap();
    assert!(start.elapsed() < Duration::from_secs(5));

    let deadline = Instant::now() + Duration::from_secs(2);
    while !dropped.load(Ordering::SeqCst) && Instant::now() < deadline {
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert!(dropped.load(Ordering::SeqCst));
}
