//! Console notifier for development.

use crate::error::Result;
use crate::providers::{Notification, Notifier};
use tracing::info;

/// Logs notifications instead of sending them.
///
/// Used by the server when no SMTP relay is configured.
#[derive(Clone, Debug, Default)]
pub struct ConsoleNotifier;

impl ConsoleNotifier {
    /// Create a new console notifier.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

impl Notifier for ConsoleNotifier {
    async fn send(&self, notification: &Notification) -> Result<()> {
        info!(
            to = %notification.recipient,
            subject = %notification.subject,
            body = %notification.body,
            "📧 Notification (development mode)"
        );
        Ok(())
    }
}
