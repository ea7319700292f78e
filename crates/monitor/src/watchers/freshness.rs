use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use pipewatch_core::alert::{AlertGate, AlertSeverity, DedupPolicy};
use pipewatch_core::metric_names::METRIC_DATA_FRESHNESS;
use pipewatch_core::types::Timestamp;

use crate::alerting::AlertRelay;
use crate::registry::MetricsRegistry;
use crate::scheduler::Watcher;
use crate::sources::{SampleError, WarehouseSource};

/// Default staleness ceiling in hours.
pub const DEFAULT_FRESHNESS_THRESHOLD_HOURS: f64 = 24.0;

const FRESHNESS_ALERT_KEY: &str = "data_freshness";

/// Tracks how long ago the newest warehouse record landed.
pub struct FreshnessWatcher {
    source: Arc<dyn WarehouseSource>,
    threshold_hours: f64,
    registry: Arc<MetricsRegistry>,
    relay: AlertRelay,
    gate: AlertGate,
}

impl FreshnessWatcher {
    pub fn new(
        source: Arc<dyn WarehouseSource>,
        threshold_hours: f64,
        registry: Arc<MetricsRegistry>,
        relay: AlertRelay,
        dedup: DedupPolicy,
    ) -> Self {
        Self {
            source,
            threshold_hours,
            registry,
            relay,
            gate: AlertGate::new(dedup),
        }
    }
}

/// Hours between `latest` and `now`; negative when the data is ahead of the clock.
pub fn hours_since(latest: Timestamp, now: Timestamp) -> f64 {
    (now - latest).num_milliseconds() as f64 / 3_600_000.0
}

#[async_trait]
impl Watcher for FreshnessWatcher {
    type Sample = Timestamp;

    fn name(&self) -> &'static str {
        "freshness"
    }

    async fn sample(&mut self) -> Result<Timestamp, SampleError> {
        self.source
            .latest_record_time()
            .await?
            .ok_or_else(|| SampleError::Malformed("warehouse table has no records".to_string()))
    }

    async fn apply(&mut self, latest: Timestamp) {
        let now = Utc::now();
        let hours = hours_since(latest, now);
        self.registry.set_gauge(METRIC_DATA_FRESHNESS, hours);

        let stale = hours > self.threshold_hours;
        if stale {
            tracing::warn!(
                hours,
                threshold = self.threshold_hours,
                latest = %latest,
                "Data is stale"
            );
        }
        if self.gate.should_fire(FRESHNESS_ALERT_KEY, stale, now) {
            let message = format!(
                "Data is {hours:.1} hours old (threshold: {} hours)",
                self.threshold_hours
            );
            self.relay.raise(message, AlertSeverity::Warning).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::Duration;

    use super::*;

    #[test]
    fn hours_since_counts_fractional_hours() {
        let now = Utc::now();
        assert_eq!(hours_since(now - Duration::minutes(90), now), 1.5);
        assert_eq!(hours_since(now, now), 0.0);
        assert!(hours_since(now + Duration::hours(1), now) < 0.0);
    }
}
