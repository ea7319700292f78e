//! Multi-channel alert fan-out.
//!
//! [`AlertDispatcher::dispatch`] never fails: every channel is attempted
//! concurrently, a failing channel does not stop the others, and each
//! outcome is recorded on the returned [`AlertEvent`].

use std::sync::Arc;

use async_trait::async_trait;
use futures::future::join_all;
use pipewatch_core::alert::AlertSeverity;
use pipewatch_core::types::Timestamp;
use serde::Serialize;
use uuid::Uuid;

use crate::delivery::email::{EmailDelivery, EmailError};
use crate::delivery::webhook::{WebhookDelivery, WebhookError};

// ---------------------------------------------------------------------------
// Error
// ---------------------------------------------------------------------------

/// Failure of a single channel for a single alert.
#[derive(Debug, thiserror::Error)]
pub enum ChannelDeliveryError {
    #[error(transparent)]
    Webhook(#[from] WebhookError),

    #[error(transparent)]
    Email(#[from] EmailError),

    #[error("{0}")]
    Other(String),
}

// ---------------------------------------------------------------------------
// Event
// ---------------------------------------------------------------------------

/// Subject for alerts that do not set their own.
pub const DEFAULT_SUBJECT: &str = "Pipeline Monitoring Alert";

/// Result of one channel's attempt.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChannelOutcome {
    pub channel: String,
    pub delivered: bool,
    pub error: Option<String>,
}

/// One alert and what became of it.
#[derive(Debug, Clone, Serialize)]
pub struct AlertEvent {
    pub id: Uuid,
    pub severity: AlertSeverity,
    pub subject: String,
    pub message: String,
    pub timestamp: Timestamp,
    pub deliveries: Vec<ChannelOutcome>,
}

impl AlertEvent {
    pub fn new(severity: AlertSeverity, message: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            severity,
            subject: DEFAULT_SUBJECT.to_string(),
            message: message.into(),
            timestamp: chrono::Utc::now(),
            deliveries: Vec::new(),
        }
    }

    pub fn with_subject(mut self, subject: impl Into<String>) -> Self {
        self.subject = subject.into();
        self
    }

    pub fn delivered_count(&self) -> usize {
        self.deliveries.iter().filter(|d| d.delivered).count()
    }

    pub fn failed_count(&self) -> usize {
        self.deliveries.len() - self.delivered_count()
    }
}

// ---------------------------------------------------------------------------
// Channels
// ---------------------------------------------------------------------------

/// A notification transport.
#[async_trait]
pub trait AlertChannel: Send + Sync {
    /// Short name recorded in delivery outcomes and logs.
    fn name(&self) -> &str;

    async fn send(&self, event: &AlertEvent) -> Result<(), ChannelDeliveryError>;
}

/// Chat webhook channel; posts the message body only.
pub struct WebhookChannel {
    delivery: WebhookDelivery,
}

impl WebhookChannel {
    pub fn new(delivery: WebhookDelivery) -> Self {
        Self { delivery }
    }
}

#[async_trait]
impl AlertChannel for WebhookChannel {
    fn name(&self) -> &str {
        "webhook"
    }

    async fn send(&self, event: &AlertEvent) -> Result<(), ChannelDeliveryError> {
        self.delivery.deliver(&event.message).await?;
        Ok(())
    }
}

/// SMTP email channel.
pub struct EmailChannel {
    delivery: EmailDelivery,
}

impl EmailChannel {
    pub fn new(delivery: EmailDelivery) -> Self {
        Self { delivery }
    }
}

#[async_trait]
impl AlertChannel for EmailChannel {
    fn name(&self) -> &str {
        "email"
    }

    async fn send(&self, event: &AlertEvent) -> Result<(), ChannelDeliveryError> {
        self.delivery.deliver(&event.subject, &event.message).await?;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// AlertDispatcher
// ---------------------------------------------------------------------------

/// Fans alerts out to every configured channel.
#[derive(Clone, Default)]
pub struct AlertDispatcher {
    channels: Vec<Arc<dyn AlertChannel>>,
}

impl AlertDispatcher {
    pub fn new(channels: Vec<Arc<dyn AlertChannel>>) -> Self {
        Self { channels }
    }

    pub fn channel_names(&self) -> Vec<&str> {
        self.channels.iter().map(|c| c.name()).collect()
    }

    /// Send `message` with a default subject.
    pub async fn dispatch(&self, message: impl Into<String>, severity: AlertSeverity) -> AlertEvent {
        self.dispatch_event(AlertEvent::new(severity, message)).await
    }

    /// Send a pre-built event and fill in its delivery outcomes.
    pub async fn dispatch_event(&self, mut event: AlertEvent) -> AlertEvent {
        if self.channels.is_empty() {
            tracing::warn!(
                alert_id = %event.id,
                severity = %event.severity,
                message = %event.message,
                "No alert channels configured, alert logged only"
            );
            return event;
        }

        let attempts = self.channels.iter().map(|channel| {
            let event = &event;
            async move { (channel.name().to_string(), channel.send(event).await) }
        });
        let results = join_all(attempts).await;

        event.deliveries = results
            .into_iter()
            .map(|(channel, result)| match result {
                Ok(()) => ChannelOutcome {
                    channel,
                    delivered: true,
                    error: None,
                },
                Err(e) => {
                    tracing::error!(
                        alert_id = %event.id,
                        channel = %channel,
                        error = %e,
                        "Alert delivery failed"
                    );
                    ChannelOutcome {
                        channel,
                        delivered: false,
                        error: Some(e.to_string()),
                    }
                }
            })
            .collect();

        tracing::info!(
            alert_id = %event.id,
            severity = %event.severity,
            subject = %event.subject,
            delivered = event.delivered_count(),
            failed = event.failed_count(),
            "Alert dispatched"
        );
        event
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_event_has_default_subject() {
        let event = AlertEvent::new(AlertSeverity::Critical, "disk full");
        assert_eq!(event.subject, "Pipeline Monitoring Alert");
        assert!(event.deliveries.is_empty());
    }

    #[test]
    fn with_subject_overrides() {
        let event = AlertEvent::new(AlertSeverity::Warning, "x").with_subject("Data Quality Alert");
        assert_eq!(event.subject, "Data Quality Alert");
    }

    #[tokio::test]
    async fn no_channels_yields_empty_outcomes() {
        let dispatcher = AlertDispatcher::default();
        let event = dispatcher.dispatch("hello", AlertSeverity::Info).await;
        assert!(event.deliveries.is_empty());
        assert_eq!(event.message, "hello");
    }
}
