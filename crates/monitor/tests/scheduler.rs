//! Scheduler isolation, cancellation, and registry concurrency.

mod common;

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use common::{eventually, recording_relay, test_registry, FakeProbe};
use pipewatch_core::alert::DedupPolicy;
use pipewatch_core::metric_names::{METRIC_CPU_USAGE, METRIC_SAMPLE_FAILURES};
use pipewatch_core::resources::{ResourceThresholds, ResourceUsage};
use pipewatch_monitor::registry::MetricsRegistry;
use pipewatch_monitor::scheduler::{Scheduler, StatusBoard, Watcher, WatcherState};
use pipewatch_monitor::sources::SampleError;
use pipewatch_monitor::watchers::ResourceWatcher;

const FAST: Duration = Duration::from_millis(20);

fn usage(cpu: f64) -> ResourceUsage {
    ResourceUsage {
        cpu_percent: cpu,
        memory_percent: 40.0,
        disk_percent: 30.0,
    }
}

/// Counts cycles; panics during the given cycle numbers.
struct Ticker {
    name: &'static str,
    cycles: Arc<AtomicUsize>,
    panic_on: Vec<usize>,
}

#[async_trait]
impl Watcher for Ticker {
    type Sample = usize;

    fn name(&self) -> &'static str {
        self.name
    }

    async fn sample(&mut self) -> Result<usize, SampleError> {
        let n = self.cycles.fetch_add(1, Ordering::SeqCst) + 1;
        if self.panic_on.contains(&n) {
            panic!("ticker blew up on cycle {n}");
        }
        Ok(n)
    }

    async fn apply(&mut self, _n: usize) {}
}

/// Sample that never finishes.
struct Stuck;

#[async_trait]
impl Watcher for Stuck {
    type Sample = ();

    fn name(&self) -> &'static str {
        "stuck"
    }

    async fn sample(&mut self) -> Result<(), SampleError> {
        std::future::pending::<()>().await;
        Ok(())
    }

    async fn apply(&mut self, _: ()) {}
}

// ---------------------------------------------------------------------------
// Failed samples
// ---------------------------------------------------------------------------

#[tokio::test]
async fn failed_sample_leaves_gauge_unchanged() {
    let registry = test_registry();
    let board = Arc::new(StatusBoard::new());
    let (relay, _alerts) = recording_relay(&registry);
    let probe = FakeProbe::new(Some(usage(55.0)));

    let mut scheduler = Scheduler::new(Arc::clone(&registry), Arc::clone(&board));
    scheduler.spawn(
        ResourceWatcher::new(
            probe.clone(),
            ResourceThresholds::default(),
            Arc::clone(&registry),
            relay,
            DedupPolicy::EveryCycle,
        ),
        FAST,
    );

    assert!(eventually(|| registry.snapshot().gauge(METRIC_CPU_USAGE) == Some(55.0)).await);

    probe.set(None);
    let calls_at_outage = probe.calls.load(Ordering::SeqCst);
    assert!(eventually(|| probe.calls.load(Ordering::SeqCst) >= calls_at_outage + 3).await);

    let snapshot = registry.snapshot();
    assert_eq!(snapshot.gauge(METRIC_CPU_USAGE), Some(55.0));
    assert!(snapshot.counter(METRIC_SAMPLE_FAILURES).unwrap() >= 2);

    let status = board.get("resources").unwrap();
    assert!(status.consecutive_failures >= 2);
    assert!(status.last_error.unwrap().contains("probe offline"));
    assert!(!board.all_healthy());

    // Recovery resets the failure streak.
    probe.set(Some(usage(60.0)));
    assert!(eventually(|| registry.snapshot().gauge(METRIC_CPU_USAGE) == Some(60.0)).await);
    assert!(eventually(|| board.all_healthy()).await);

    scheduler.shutdown(Duration::from_secs(1)).await;
}

// ---------------------------------------------------------------------------
// Isolation
// ---------------------------------------------------------------------------

#[tokio::test]
async fn panicking_watcher_keeps_running_and_spares_others() {
    let registry = Arc::new(MetricsRegistry::new());
    let board = Arc::new(StatusBoard::new());
    let flaky_cycles = Arc::new(AtomicUsize::new(0));
    let steady_cycles = Arc::new(AtomicUsize::new(0));

    let mut scheduler = Scheduler::new(Arc::clone(&registry), Arc::clone(&board));
    scheduler.spawn(
        Ticker {
            name: "flaky",
            cycles: Arc::clone(&flaky_cycles),
            panic_on: vec![1, 2],
        },
        FAST,
    );
    scheduler.spawn(
        Ticker {
            name: "steady",
            cycles: Arc::clone(&steady_cycles),
            panic_on: vec![],
        },
        FAST,
    );

    assert!(eventually(|| flaky_cycles.load(Ordering::SeqCst) >= 4).await);
    assert!(steady_cycles.load(Ordering::SeqCst) >= 2);

    let flaky = board.get("flaky").unwrap();
    assert!(flaky.last_error.unwrap().contains("ticker blew up"));
    assert!(flaky.last_success.is_some());
    assert_eq!(board.get("steady").unwrap().consecutive_failures, 0);
    assert_eq!(registry.snapshot().counter(METRIC_SAMPLE_FAILURES), Some(2));

    scheduler.shutdown(Duration::from_secs(1)).await;
}

// ---------------------------------------------------------------------------
// Cancellation
// ---------------------------------------------------------------------------

#[tokio::test]
async fn shutdown_stops_every_loop() {
    let registry = Arc::new(MetricsRegistry::new());
    let board = Arc::new(StatusBoard::new());
    let cycles = Arc::new(AtomicUsize::new(0));

    let mut scheduler = Scheduler::new(Arc::clone(&registry), Arc::clone(&board));
    scheduler.spawn(
        Ticker {
            name: "ticker",
            cycles: Arc::clone(&cycles),
            panic_on: vec![],
        },
        Duration::from_secs(3600),
    );
    assert_eq!(scheduler.watcher_count(), 1);

    // The first cycle runs immediately, then the loop sleeps for an hour.
    assert!(eventually(|| cycles.load(Ordering::SeqCst) == 1).await);

    let started = tokio::time::Instant::now();
    scheduler.shutdown(Duration::from_secs(5)).await;
    assert!(started.elapsed() < Duration::from_secs(1));
    assert_eq!(board.get("ticker").unwrap().state, WatcherState::Stopped);
    assert_eq!(cycles.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn shutdown_gives_up_on_stuck_sample_after_timeout() {
    let registry = Arc::new(MetricsRegistry::new());
    let board = Arc::new(StatusBoard::new());

    let mut scheduler = Scheduler::new(registry, Arc::clone(&board));
    scheduler.spawn(Stuck, FAST);
    assert!(eventually(|| board.get("stuck").unwrap().state == WatcherState::Sampling).await);

    let started = tokio::time::Instant::now();
    scheduler.shutdown(Duration::from_millis(100)).await;
    let elapsed = started.elapsed();
    assert!(elapsed >= Duration::from_millis(100));
    assert!(elapsed < Duration::from_secs(2));
}

// ---------------------------------------------------------------------------
// Registry concurrency
// ---------------------------------------------------------------------------

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_counter_increments_are_not_lost() {
    const WRITERS: usize = 16;
    const INCREMENTS: usize = 500;

    let registry = Arc::new(MetricsRegistry::new());
    registry.describe_counter("jobs_total", "Jobs");

    let writers = (0..WRITERS).map(|i| {
        let registry = Arc::clone(&registry);
        tokio::spawn(async move {
            for _ in 0..INCREMENTS {
                registry.increment_counter("jobs_total", 1);
                registry.set_gauge("last_writer", i as f64);
            }
        })
    });
    let reader = {
        let registry = Arc::clone(&registry);
        tokio::spawn(async move {
            for _ in 0..100 {
                let count = registry.snapshot().counter("jobs_total").unwrap();
                assert!(count <= (WRITERS * INCREMENTS) as u64);
                tokio::task::yield_now().await;
            }
        })
    };

    for writer in writers.collect::<Vec<_>>() {
        writer.await.unwrap();
    }
    reader.await.unwrap();

    assert_eq!(
        registry.snapshot().counter("jobs_total"),
        Some((WRITERS * INCREMENTS) as u64)
    );
}
