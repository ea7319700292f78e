use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use pipewatch_core::types::Timestamp;
use serde::Serialize;

use crate::registry::{MetricsRegistry, RegistrySnapshot};
use crate::reports::{ReportKind, ReportStore};
use crate::scheduler::{StatusBoard, Watcher, WatcherStatus};
use crate::sources::SampleError;

/// Contents of one `monitoring_report_*.json` file.
#[derive(Debug, Serialize)]
pub struct HealthReport {
    pub timestamp: Timestamp,
    pub healthy: bool,
    pub watchers: BTreeMap<String, WatcherStatus>,
    pub metrics: RegistrySnapshot,
}

/// Periodically persists the registry and watcher status.
///
/// Writing is the sample step, so a failed write shows up as a failed cycle.
pub struct HealthReporter {
    registry: Arc<MetricsRegistry>,
    board: Arc<StatusBoard>,
    store: ReportStore,
}

impl HealthReporter {
    pub fn new(registry: Arc<MetricsRegistry>, board: Arc<StatusBoard>, store: ReportStore) -> Self {
        Self {
            registry,
            board,
            store,
        }
    }

    pub fn build_report(&self) -> HealthReport {
        HealthReport {
            timestamp: Utc::now(),
            healthy: self.board.all_healthy(),
            watchers: self.board.snapshot(),
            metrics: self.registry.snapshot(),
        }
    }
}

#[async_trait]
impl Watcher for HealthReporter {
    type Sample = PathBuf;

    fn name(&self) -> &'static str {
        "health_report"
    }

    async fn sample(&mut self) -> Result<PathBuf, SampleError> {
        let report = self.build_report();
        self.store
            .write(ReportKind::Health, report.timestamp, &report)
            .await
            .map_err(|e| SampleError::Unavailable(e.to_string()))
    }

    async fn apply(&mut self, path: PathBuf) {
        tracing::debug!(path = %path.display(), "Health report written");
    }
}
