use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use pipewatch_core::alert::AlertSeverity;
use pipewatch_core::metric_names::{METRIC_PIPELINE_FAILURE, METRIC_PIPELINE_SUCCESS};
use pipewatch_core::runs::{RunRecord, RunTracker};
use pipewatch_events::AlertEvent;

use crate::alerting::AlertRelay;
use crate::registry::MetricsRegistry;
use crate::scheduler::Watcher;
use crate::sources::{RunSource, SampleError};

/// Counts finished orchestration runs and alerts once per failed run.
///
/// Run failures are deduplicated by run id through the [`RunTracker`]; the
/// configured dedup policy does not apply here.
pub struct RunWatcher {
    source: Arc<dyn RunSource>,
    tracker: RunTracker,
    registry: Arc<MetricsRegistry>,
    relay: AlertRelay,
}

impl RunWatcher {
    pub fn new(
        source: Arc<dyn RunSource>,
        tracker: RunTracker,
        registry: Arc<MetricsRegistry>,
        relay: AlertRelay,
    ) -> Self {
        Self {
            source,
            tracker,
            registry,
            relay,
        }
    }
}

#[async_trait]
impl Watcher for RunWatcher {
    type Sample = Vec<RunRecord>;

    fn name(&self) -> &'static str {
        "runs"
    }

    async fn sample(&mut self) -> Result<Vec<RunRecord>, SampleError> {
        self.source.recent_runs().await
    }

    async fn apply(&mut self, runs: Vec<RunRecord>) {
        let polled = runs.len();
        let classified = self.tracker.observe(runs, Utc::now());

        self.registry.increment_counter(
            METRIC_PIPELINE_SUCCESS,
            classified.new_successes.len() as u64,
        );
        self.registry.increment_counter(
            METRIC_PIPELINE_FAILURE,
            classified.new_failures.len() as u64,
        );
        tracing::debug!(
            polled,
            new_successes = classified.new_successes.len(),
            new_failures = classified.new_failures.len(),
            tracked = self.tracker.seen_count(),
            "Pipeline runs polled"
        );

        for run in &classified.new_failures {
            tracing::warn!(dag_id = %run.dag_id, run_id = %run.run_id, "Pipeline run failed");
            let event = AlertEvent::new(AlertSeverity::Critical, run.failure_message())
                .with_subject(format!("Pipeline run failed: {}", run.dag_id));
            self.relay.send(event).await;
        }
    }
}
