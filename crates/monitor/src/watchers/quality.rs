use std::sync::Arc;

use async_trait::async_trait;
use pipewatch_core::quality::QualityReport;

use crate::quality_service::QualityService;
use crate::scheduler::Watcher;
use crate::sources::SampleError;

/// Periodic quality evaluation.
pub struct QualityWatcher {
    service: Arc<QualityService>,
}

impl QualityWatcher {
    pub fn new(service: Arc<QualityService>) -> Self {
        Self { service }
    }
}

#[async_trait]
impl Watcher for QualityWatcher {
    type Sample = QualityReport;

    fn name(&self) -> &'static str {
        "quality"
    }

    async fn sample(&mut self) -> Result<QualityReport, SampleError> {
        self.service.evaluate().await
    }

    async fn apply(&mut self, report: QualityReport) {
        self.service.publish(report).await;
    }
}
