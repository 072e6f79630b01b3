//! SMTP notifier using Lettre.

use crate::error::{ResetError, Result};
use crate::providers::{Notification, Notifier};
use lettre::message::header::ContentType;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};

/// SMTP relay settings.
#[derive(Debug, Clone)]
pub struct SmtpConfig {
    /// Relay host (e.g. "smtp.example.com").
    pub host: String,
    /// Relay port, usually 587.
    pub port: u16,
    /// Username; when absent the relay is used unauthenticated and without TLS.
    pub username: Option<String>,
    /// Password.
    pub password: Option<String>,
    /// Sender address.
    pub from_email: String,
    /// Sender display name.
    pub from_name: String,
}

/// Sends notifications through an SMTP relay.
///
/// Without credentials the transport talks plain SMTP, which is only meant
/// for local catch-all relays.
#[derive(Clone)]
pub struct SmtpNotifier {
    mailer: AsyncSmtpTransport<Tokio1Executor>,
    from: String,
}

impl SmtpNotifier {
    /// Create a notifier for `config`.
    ///
    /// # Errors
    ///
    /// Returns `ResetError::NotificationFailed` if the relay cannot be configured.
    pub fn new(config: &SmtpConfig) -> Result<Self> {
        let mailer = match (&config.username, &config.password) {
            (Some(username), Some(password)) => {
                AsyncSmtpTransport::<Tokio1Executor>::relay(&config.host)
                    .map_err(|e| ResetError::NotificationFailed(format!("SMTP relay error: {e}")))?
                    .port(config.port)
                    .credentials(Credentials::new(username.clone(), password.clone()))
                    .build()
            }
            _ => AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(&config.host)
                .port(config.port)
                .build(),
        };

        Ok(Self {
            mailer,
            from: format!("{} <{}>", config.from_name, config.from_email),
        })
    }
}

impl Notifier for SmtpNotifier {
    async fn send(&self, notification: &Notification) -> Result<()> {
        let email = Message::builder()
            .from(
                self.from
                    .parse()
                    .map_err(|e| ResetError::NotificationFailed(format!("Invalid from address: {e}")))?,
            )
            .to(notification
                .recipient
                .parse()
                .map_err(|e| ResetError::NotificationFailed(format!("Invalid to address: {e}")))?)
            .subject(notification.subject.clone())
            .header(ContentType::TEXT_PLAIN)
            .body(notification.body.clone())
            .map_err(|e| ResetError::NotificationFailed(format!("Failed to build email: {e}")))?;

        self.mailer
            .send(email)
            .await
            .map_err(|e| ResetError::NotificationFailed(format!("Failed to send email: {e}")))?;

        Ok(())
    }
}
