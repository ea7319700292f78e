use std::sync::Arc;

use async_trait::async_trait;
use pipewatch_core::metric_names::{METRIC_PIPELINE_DURATION, METRIC_RECORDS_PROCESSED};
use pipewatch_db::models::warehouse::VolumeStats;

use crate::registry::MetricsRegistry;
use crate::scheduler::Watcher;
use crate::sources::{SampleError, WarehouseSource};

/// Turns the warehouse row count into a monotonic records counter.
pub struct ThroughputWatcher {
    source: Arc<dyn WarehouseSource>,
    registry: Arc<MetricsRegistry>,
    last_count: Option<u64>,
}

impl ThroughputWatcher {
    pub fn new(source: Arc<dyn WarehouseSource>, registry: Arc<MetricsRegistry>) -> Self {
        Self {
            source,
            registry,
            last_count: None,
        }
    }

    /// Increase since the previous sample. The first sample counts in full; a
    /// shrinking table contributes nothing and becomes the new baseline.
    fn delta(&mut self, total: u64) -> u64 {
        let delta = match self.last_count {
            None => total,
            Some(prev) => total.saturating_sub(prev),
        };
        self.last_count = Some(total);
        delta
    }
}

#[async_trait]
impl Watcher for ThroughputWatcher {
    type Sample = VolumeStats;

    fn name(&self) -> &'static str {
        "throughput"
    }

    async fn sample(&mut self) -> Result<VolumeStats, SampleError> {
        self.source.volume().await
    }

    async fn apply(&mut self, stats: VolumeStats) {
        let total = u64::try_from(stats.total_records).unwrap_or(0);
        let delta = self.delta(total);
        self.registry.increment_counter(METRIC_RECORDS_PROCESSED, delta);

        if let Some(span) = stats.span_seconds() {
            self.registry.observe_histogram(METRIC_PIPELINE_DURATION, span);
        }
        tracing::debug!(total, delta, "Warehouse volume sampled");
    }
}
