//! Glue between watchers and the alert dispatcher.

use std::sync::Arc;

use pipewatch_core::alert::AlertSeverity;
use pipewatch_core::metric_names::{METRIC_ALERTS_DISPATCHED, METRIC_ALERT_DELIVERY_FAILURES};
use pipewatch_events::{AlertDispatcher, AlertEvent};

use crate::registry::MetricsRegistry;

/// Dispatches alerts and counts them in the registry.
#[derive(Clone)]
pub struct AlertRelay {
    dispatcher: AlertDispatcher,
    registry: Arc<MetricsRegistry>,
}

impl AlertRelay {
    pub fn new(dispatcher: AlertDispatcher, registry: Arc<MetricsRegistry>) -> Self {
        Self {
            dispatcher,
            registry,
        }
    }

    pub async fn raise(&self, message: impl Into<String>, severity: AlertSeverity) -> AlertEvent {
        self.send(AlertEvent::new(severity, message)).await
    }

    pub async fn send(&self, event: AlertEvent) -> AlertEvent {
        let event = self.dispatcher.dispatch_event(event).await;
        self.registry.increment_counter(METRIC_ALERTS_DISPATCHED, 1);
        self.registry
            .increment_counter(METRIC_ALERT_DELIVERY_FAILURES, event.failed_count() as u64);
        event
    }
}
