use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use pipewatch_core::alert::{AlertGate, AlertSeverity, DedupPolicy};
use pipewatch_core::resources::{Resource, ResourceThresholds, ResourceUsage};

use crate::alerting::AlertRelay;
use crate::registry::MetricsRegistry;
use crate::scheduler::Watcher;
use crate::sources::{ResourceProbe, SampleError};

/// Publishes host CPU, memory, and disk gauges and alerts above the ceilings.
pub struct ResourceWatcher {
    probe: Arc<dyn ResourceProbe>,
    thresholds: ResourceThresholds,
    registry: Arc<MetricsRegistry>,
    relay: AlertRelay,
    gate: AlertGate,
}

impl ResourceWatcher {
    pub fn new(
        probe: Arc<dyn ResourceProbe>,
        thresholds: ResourceThresholds,
        registry: Arc<MetricsRegistry>,
        relay: AlertRelay,
        dedup: DedupPolicy,
    ) -> Self {
        Self {
            probe,
            thresholds,
            registry,
            relay,
            gate: AlertGate::new(dedup),
        }
    }
}

#[async_trait]
impl Watcher for ResourceWatcher {
    type Sample = ResourceUsage;

    fn name(&self) -> &'static str {
        "resources"
    }

    async fn sample(&mut self) -> Result<ResourceUsage, SampleError> {
        self.probe.sample().await
    }

    async fn apply(&mut self, usage: ResourceUsage) {
        for resource in Resource::ALL {
            self.registry
                .set_gauge(resource.metric_name(), usage.get(resource));
        }
        tracing::debug!(
            cpu = usage.cpu_percent,
            memory = usage.memory_percent,
            disk = usage.disk_percent,
            "Resource usage sampled"
        );

        let now = Utc::now();
        for check in self.thresholds.check(&usage) {
            let key = check.resource.label();
            if !self.gate.should_fire(key, check.exceeded, now) {
                continue;
            }
            tracing::warn!(
                resource = key,
                value = check.value,
                threshold = check.threshold,
                "Resource usage above threshold"
            );
            self.relay
                .raise(check.message(), AlertSeverity::Warning)
                .await;
        }
    }
}
