//! Notifier selection.

use opsdesk_reset::notify::{ConsoleNotifier, SmtpConfig, SmtpNotifier};
use opsdesk_reset::providers::{Notification, Notifier};

/// SMTP when a relay is configured, console logging otherwise.
#[derive(Clone)]
pub enum Mailer {
    /// Real delivery.
    Smtp(SmtpNotifier),
    /// Development fallback.
    Console(ConsoleNotifier),
}

impl Mailer {
    /// Pick a mailer for `smtp`.
    ///
    /// # Errors
    ///
    /// Returns an error if the SMTP relay cannot be configured.
    pub fn from_config(smtp: Option<&SmtpConfig>) -> opsdesk_reset::Result<Self> {
        match smtp {
            Some(config) => {
                tracing::info!(host = %config.host, port = config.port, "Using SMTP notifier");
                Ok(Self::Smtp(SmtpNotifier::new(config)?))
            }
            None => {
                tracing::warn!("SMTP_HOST not set, notifications are logged only");
                Ok(Self::Console(ConsoleNotifier::new()))
            }
        }
    }
}

impl Notifier for Mailer {
    async fn send(&self, notification: &Notification) -> opsdesk_reset::Result<()> {
        match self {
            Self::Smtp(smtp) => smtp.send(notification).await,
            Self::Console(console) => console.send(notification).await,
        }
    }
}
