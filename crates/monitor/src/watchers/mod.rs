//! The watcher loops run by the [`Scheduler`](crate::scheduler::Scheduler).

pub mod freshness;
pub mod health_report;
pub mod quality;
pub mod resource;
pub mod runs;
pub mod throughput;

use pipewatch_core::metric_names::*;

use crate::registry::MetricsRegistry;

pub use freshness::FreshnessWatcher;
pub use health_report::{HealthReport, HealthReporter};
pub use quality::QualityWatcher;
pub use resource::ResourceWatcher;
pub use runs::RunWatcher;
pub use throughput::ThroughputWatcher;

/// Upper bounds for `pipeline_duration_seconds`: 1m, 5m, 15m, 1h, 6h, 1d, 1w, 30d, 1y.
pub const DURATION_BUCKETS: [f64; 9] = [
    60.0, 300.0, 900.0, 3600.0, 21600.0, 86400.0, 604800.0, 2592000.0, 31536000.0,
];

/// Register help text for every metric the watchers publish.
///
/// Counters are exposed at zero from startup so rate queries work before the
/// first event.
pub fn register_metrics(registry: &MetricsRegistry) {
    registry.describe(METRIC_CPU_USAGE, "CPU usage percentage");
    registry.describe(METRIC_MEMORY_USAGE, "Memory usage percentage");
    registry.describe(METRIC_DISK_USAGE, "Disk usage percentage");
    registry.describe(METRIC_DATA_FRESHNESS, "Hours since last data update");
    registry.describe(METRIC_QUALITY_SCORE, "Data quality score (0-100)");

    registry.describe_counter(METRIC_PIPELINE_SUCCESS, "Number of successful pipeline runs");
    registry.describe_counter(METRIC_PIPELINE_FAILURE, "Number of failed pipeline runs");
    registry.describe_counter(METRIC_RECORDS_PROCESSED, "Total records processed");
    registry.describe_counter(METRIC_QUALITY_EVALUATIONS, "Completed quality evaluations");
    registry.describe_counter(
        METRIC_QUALITY_FAILURES,
        "Quality evaluations aborted on an empty or malformed dataset",
    );
    registry.describe_counter(METRIC_ALERTS_DISPATCHED, "Alerts dispatched");
    registry.describe_counter(
        METRIC_ALERT_DELIVERY_FAILURES,
        "Failed alert deliveries across all channels",
    );
    registry.describe_counter(METRIC_SAMPLE_FAILURES, "Failed watcher sampling cycles");

    registry.describe_histogram(
        METRIC_PIPELINE_DURATION,
        "Time span covered by the warehouse data in seconds",
        &DURATION_BUCKETS,
    );
}
