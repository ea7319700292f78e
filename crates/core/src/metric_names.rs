//! Well-known metric names.
//!
//! These are the canonical names published by the watchers and scraped from
//! the `/metrics` endpoint. Keeping them in one place lets the watchers, the
//! health report, and the tests agree on spelling.

/// Host CPU utilisation percentage (0-100).
pub const METRIC_CPU_USAGE: &str = "cpu_usage_percent";

/// Host memory utilisation percentage (0-100).
pub const METRIC_MEMORY_USAGE: &str = "memory_usage_percent";

/// Disk utilisation percentage of the monitored mount (0-100).
pub const METRIC_DISK_USAGE: &str = "disk_usage_percent";

/// Orchestration runs observed finishing successfully.
pub const METRIC_PIPELINE_SUCCESS: &str = "pipeline_success_total";

/// Orchestration runs observed finishing in a failed state.
pub const METRIC_PIPELINE_FAILURE: &str = "pipeline_failure_total";

/// Hours since the newest record in the warehouse table.
pub const METRIC_DATA_FRESHNESS: &str = "data_freshness_hours";

/// Records seen arriving in the warehouse table.
pub const METRIC_RECORDS_PROCESSED: &str = "records_processed_total";

/// Time span covered by the warehouse table, in seconds.
pub const METRIC_PIPELINE_DURATION: &str = "pipeline_duration_seconds";

/// Overall score of the most recent quality evaluation (0-100).
pub const METRIC_QUALITY_SCORE: &str = "data_quality_score";

/// Completed quality evaluations.
pub const METRIC_QUALITY_EVALUATIONS: &str = "quality_evaluations_total";

/// Quality evaluations aborted (empty or malformed dataset).
pub const METRIC_QUALITY_FAILURES: &str = "quality_evaluation_failures_total";

/// Alerts handed to the dispatcher.
pub const METRIC_ALERTS_DISPATCHED: &str = "alerts_dispatched_total";

/// Individual channel deliveries that failed.
pub const METRIC_ALERT_DELIVERY_FAILURES: &str = "alert_delivery_failures_total";

/// Watcher cycles whose sample step failed.
pub const METRIC_SAMPLE_FAILURES: &str = "watcher_sample_failures_total";
