//! Pipewatch alert delivery.
//!
//! - [`AlertDispatcher`] fans one alert out to every configured channel
//!   concurrently and records a per-channel outcome.
//! - [`delivery`] holds the concrete transports (chat webhook, SMTP email).

pub mod delivery;
pub mod dispatcher;

pub use delivery::email::{EmailConfig, EmailDelivery, EmailError};
pub use delivery::webhook::{WebhookDelivery, WebhookError};
pub use dispatcher::{
    AlertChannel, AlertDispatcher, AlertEvent, ChannelDeliveryError, ChannelOutcome,
    EmailChannel, WebhookChannel,
};
