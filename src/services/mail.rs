//! Notification delivery over SMTP.

use async_trait::async_trait;
use lettre::message::header::ContentType;
use lettre::message::Mailbox;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use std::time::Duration;
use tracing::{info, instrument, warn};

use crate::error::{Result, WatchError};

const SMTP_TIMEOUT: Duration = Duration::from_secs(30);

/// A rendered notification addressed to one recipient.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutgoingMessage {
    pub to: String,
    pub subject: String,
    pub body: String,
}

/// Delivers rendered notifications. Failures are [`WatchError::Delivery`].
#[async_trait]
pub trait Deliver: Send + Sync {
    async fn deliver(&self, message: &OutgoingMessage) -> Result<()>;
}

/// SMTP connection settings.
#[derive(Debug, Clone)]
pub struct SmtpSettings {
    pub host: String,
    pub port: u16,
    pub username: String,
    pub password: String,
    pub from: String,
}

/// [`Deliver`] over SMTP with STARTTLS and username/password auth.
pub struct SmtpMailer {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
}

impl SmtpMailer {
    pub fn new(settings: &SmtpSettings) -> Result<Self> {
        let from: Mailbox = settings
            .from
            .parse()
            .map_err(|e| WatchError::Config(format!("invalid sender address {:?}: {e}", settings.from)))?;

        let transport = AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&settings.host)
            .map_err(|e| WatchError::Config(format!("invalid SMTP host {:?}: {e}", settings.host)))?
            .port(settings.port)
            .credentials(Credentials::new(
                settings.username.clone(),
                settings.password.clone(),
            ))
            .timeout(Some(SMTP_TIMEOUT))
            .build();

        Ok(Self { transport, from })
    }
}

#[async_trait]
impl Deliver for SmtpMailer {
    #[instrument(level = "info", skip_all, fields(to = %message.to))]
    async fn deliver(&self, message: &OutgoingMessage) -> Result<()> {
        let to: Mailbox = message
            .to
            .parse()
            .map_err(|e| WatchError::Delivery(format!("invalid recipient {:?}: {e}", message.to)))?;

        let email = Message::builder()
            .from(self.from.clone())
            .to(to)
            .subject(message.subject.clone())
            .header(ContentType::TEXT_PLAIN)
            .body(message.body.clone())
            .map_err(|e| WatchError::Delivery(format!("failed to build message: {e}")))?;

        self.transport
            .send(email)
            .await
            .map_err(|e| WatchError::Delivery(e.to_string()))?;
        info!("Email sent");
        Ok(())
    }
}

/// Stand-in used when no SMTP host is configured: every delivery fails, so
/// analyzed documents stay eligible until email is set up.
#[derive(Debug, Clone, Copy, Default)]
pub struct UnconfiguredMailer;

#[async_trait]
impl Deliver for UnconfiguredMailer {
    async fn deliver(&self, message: &OutgoingMessage) -> Result<()> {
        warn!(subject = %message.subject, "Email SMTP host not configured; cannot deliver");
        Err(WatchError::Delivery("SMTP host not configured".to_string()))
    }
}
