//! Alert email delivery via SMTP.
//!
//! [`EmailDelivery`] wraps the `lettre` async SMTP transport and sends one
//! plain-text message per alert to the whole recipient list. The transport
//! connects per send, so constructing it never touches the network.

use std::time::Duration;

use lettre::message::header::ContentType;
use lettre::message::Mailbox;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};

// ---------------------------------------------------------------------------
// Error
// ---------------------------------------------------------------------------

/// Error type for email delivery failures.
#[derive(Debug, thiserror::Error)]
pub enum EmailError {
    /// SMTP transport-level failure (authentication, connection, etc.).
    #[error("SMTP transport error: {0}")]
    Transport(#[from] lettre::transport::smtp::Error),

    /// The recipient or sender address could not be parsed.
    #[error("Email address parse error: {0}")]
    Address(#[from] lettre::address::AddressError),

    /// The MIME message could not be assembled.
    #[error("Email build error: {0}")]
    Build(String),

    #[error("No email recipients configured")]
    NoRecipients,
}

// ---------------------------------------------------------------------------
// EmailConfig
// ---------------------------------------------------------------------------

/// Default SMTP relay.
pub const DEFAULT_SMTP_HOST: &str = "smtp.gmail.com";

/// Default SMTP port (STARTTLS).
pub const DEFAULT_SMTP_PORT: u16 = 587;

/// Default sender address.
pub const DEFAULT_FROM_ADDRESS: &str = "alerts@bikeshare.com";

/// SMTP command timeout.
const SMTP_TIMEOUT: Duration = Duration::from_secs(30);

/// Configuration for the SMTP email delivery service.
#[derive(Debug, Clone, PartialEq)]
pub struct EmailConfig {
    /// SMTP server hostname.
    pub smtp_host: String,
    /// SMTP server port (defaults to 587).
    pub smtp_port: u16,
    /// RFC 5322 "From" address.
    pub from_address: String,
    /// Optional SMTP username.
    pub smtp_user: Option<String>,
    /// Optional SMTP password.
    pub smtp_password: Option<String>,
    /// Every alert goes to all of these.
    pub recipients: Vec<String>,
}

impl EmailConfig {
    /// Split a comma-separated recipient list, dropping blanks.
    pub fn parse_recipients(raw: &str) -> Vec<String> {
        raw.split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect()
    }
}

// ---------------------------------------------------------------------------
// EmailDelivery
// ---------------------------------------------------------------------------

/// Sends alert emails via SMTP.
#[derive(Debug, Clone)]
pub struct EmailDelivery {
    from: Mailbox,
    to: Vec<Mailbox>,
    mailer: AsyncSmtpTransport<Tokio1Executor>,
}

impl EmailDelivery {
    /// Validate addresses and prepare the transport.
    pub fn new(config: &EmailConfig) -> Result<Self, EmailError> {
        let from: Mailbox = config.from_address.parse()?;
        let to = config
            .recipients
            .iter()
            .map(|r| r.parse::<Mailbox>())
            .collect::<Result<Vec<_>, _>>()?;
        if to.is_empty() {
            return Err(EmailError::NoRecipients);
        }

        let mut transport_builder =
            AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&config.smtp_host)?
                .port(config.smtp_port)
                .timeout(Some(SMTP_TIMEOUT));

        if let (Some(user), Some(pass)) = (&config.smtp_user, &config.smtp_password) {
            transport_builder =
                transport_builder.credentials(Credentials::new(user.clone(), pass.clone()));
        }

        Ok(Self {
            from,
            to,
            mailer: transport_builder.build(),
        })
    }

    pub fn recipient_count(&self) -> usize {
        self.to.len()
    }

    /// Assemble the MIME message without sending it.
    pub fn build_message(&self, subject: &str, body: &str) -> Result<Message, EmailError> {
        let mut builder = Message::builder().from(self.from.clone());
        for to in &self.to {
            builder = builder.to(to.clone());
        }
        builder
            .subject(subject)
            .header(ContentType::TEXT_PLAIN)
            .body(body.to_string())
            .map_err(|e| EmailError::Build(e.to_string()))
    }

    /// Send one message to all recipients.
    pub async fn deliver(&self, subject: &str, body: &str) -> Result<(), EmailError> {
        let email = self.build_message(subject, body)?;
        self.mailer.send(email).await?;
        tracing::info!(recipients = self.to.len(), subject, "Alert email sent");
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;

    fn config(recipients: &str) -> EmailConfig {
        EmailConfig {
            smtp_host: DEFAULT_SMTP_HOST.to_string(),
            smtp_port: DEFAULT_SMTP_PORT,
            from_address: DEFAULT_FROM_ADDRESS.to_string(),
            smtp_user: None,
            smtp_password: None,
            recipients: EmailConfig::parse_recipients(recipients),
        }
    }

    #[test]
    fn parses_recipient_list() {
        assert_eq!(
            EmailConfig::parse_recipients(" a@x.com, ,b@y.org,"),
            vec!["a@x.com", "b@y.org"]
        );
    }

    #[test]
    fn message_addresses_every_recipient() {
        let delivery = EmailDelivery::new(&config("ops@example.com,data@example.com")).unwrap();
        assert_eq!(delivery.recipient_count(), 2);

        let message = delivery
            .build_message("Data Quality Alert", "score dropped")
            .unwrap();
        let raw = String::from_utf8(message.formatted()).unwrap();
        assert!(raw.contains("Subject: Data Quality Alert"));
        assert!(raw.contains("ops@example.com"));
        assert!(raw.contains("data@example.com"));
        assert!(raw.contains("From: alerts@bikeshare.com"));
    }

    #[test]
    fn rejects_bad_recipient() {
        assert_matches!(
            EmailDelivery::new(&config("not-an-email")),
            Err(EmailError::Address(_))
        );
    }

    #[test]
    fn rejects_empty_recipient_list() {
        assert_matches!(EmailDelivery::new(&config("")), Err(EmailError::NoRecipients));
    }

    #[test]
    fn email_error_display_build() {
        let err = EmailError::Build("missing body".to_string());
        assert_eq!(err.to_string(), "Email build error: missing body");
    }
}
