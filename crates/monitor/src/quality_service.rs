//! Quality evaluation shared by the periodic watcher and the HTTP endpoint.

use std::path::PathBuf;
use std::sync::{Arc, Mutex, PoisonError, RwLock};

use chrono::Utc;
use pipewatch_core::alert::{AlertGate, AlertSeverity, DedupPolicy};
use pipewatch_core::error::CoreError;
use pipewatch_core::metric_names::{
    METRIC_QUALITY_EVALUATIONS, METRIC_QUALITY_FAILURES, METRIC_QUALITY_SCORE,
};
use pipewatch_core::quality::{self, QualityReport, QualityRules};
use pipewatch_core::thresholds::ThresholdConfig;
use pipewatch_events::AlertEvent;

use crate::alerting::AlertRelay;
use crate::registry::MetricsRegistry;
use crate::reports::{ReportKind, ReportStore};
use crate::sources::{SampleError, WarehouseSource};

const QUALITY_ALERT_KEY: &str = "quality_score";

/// A published report and where it was written, if the write succeeded.
#[derive(Debug, Clone)]
pub struct PublishedReport {
    pub report: Arc<QualityReport>,
    pub path: Option<PathBuf>,
}

pub struct QualityService {
    source: Arc<dyn WarehouseSource>,
    config: ThresholdConfig,
    rules: QualityRules,
    registry: Arc<MetricsRegistry>,
    relay: AlertRelay,
    store: ReportStore,
    gate: Mutex<AlertGate>,
    latest: RwLock<Option<Arc<QualityReport>>>,
}

impl QualityService {
    pub fn new(
        source: Arc<dyn WarehouseSource>,
        config: ThresholdConfig,
        rules: QualityRules,
        registry: Arc<MetricsRegistry>,
        relay: AlertRelay,
        store: ReportStore,
        dedup: DedupPolicy,
    ) -> Self {
        Self {
            source,
            config,
            rules,
            registry,
            relay,
            store,
            gate: Mutex::new(AlertGate::new(dedup)),
            latest: RwLock::new(None),
        }
    }

    pub fn config(&self) -> &ThresholdConfig {
        &self.config
    }

    /// Most recently published report.
    pub fn latest(&self) -> Option<Arc<QualityReport>> {
        self.latest
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Snapshot the warehouse and score it. Publishes nothing.
    ///
    /// Empty and malformed snapshots count as failed evaluations.
    pub async fn evaluate(&self) -> Result<QualityReport, SampleError> {
        let dataset = self.source.snapshot().await?;

        match quality::evaluate(&dataset, &self.config, &self.rules, Utc::now()) {
            Ok(report) => Ok(report),
            Err(err) => {
                self.registry.increment_counter(METRIC_QUALITY_FAILURES, 1);
                match &err {
                    CoreError::EmptyDataset => {
                        tracing::warn!("Quality evaluation skipped: dataset is empty")
                    }
                    other => tracing::warn!(error = %other, "Quality evaluation aborted"),
                }
                Err(err.into())
            }
        }
    }

    /// Record `report` in the registry, persist it, and alert if it is below
    /// the ceiling.
    pub async fn publish(&self, report: QualityReport) -> PublishedReport {
        let report = Arc::new(report);

        self.registry
            .set_gauge(METRIC_QUALITY_SCORE, report.quality_score);
        self.registry.increment_counter(METRIC_QUALITY_EVALUATIONS, 1);
        tracing::info!(
            score = report.quality_score,
            rows = report.row_count,
            "Quality evaluation complete"
        );

        let path = match self
            .store
            .write(ReportKind::Quality, report.timestamp, report.as_ref())
            .await
        {
            Ok(path) => Some(path),
            Err(e) => {
                tracing::error!(error = %e, "Failed to write quality report");
                None
            }
        };

        *self.latest.write().unwrap_or_else(PoisonError::into_inner) = Some(Arc::clone(&report));

        let below = report.below_alert_threshold();
        let fire = self
            .gate
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .should_fire(QUALITY_ALERT_KEY, below, report.timestamp);
        if below {
            tracing::warn!(
                score = report.quality_score,
                threshold = self.config.alert_score(),
                "Data quality below alert threshold"
            );
        }
        if fire {
            let event = AlertEvent::new(AlertSeverity::Critical, report.alert_message())
                .with_subject(format!(
                    "Data Quality Alert - Score: {}%",
                    report.quality_score
                ));
            self.relay.send(event).await;
        }

        PublishedReport { report, path }
    }

    /// Evaluate and publish in one step.
    pub async fn run(&self) -> Result<PublishedReport, SampleError> {
        let report = self.evaluate().await?;
        Ok(self.publish(report).await)
    }
}
