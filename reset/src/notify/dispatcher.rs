//! Fire-and-forget delivery after commit.

use crate::metrics;
use crate::providers::{Notification, Notifier};
use std::sync::Arc;
use tokio::task::JoinHandle;

/// Spawns notification delivery onto the runtime.
///
/// The caller never waits for delivery and never sees its result; the
/// returned handle exists for tests and graceful shutdown.
#[derive(Debug)]
pub struct NotificationDispatcher<N> {
    notifier: Arc<N>,
}

impl<N> Clone for NotificationDispatcher<N> {
    fn clone(&self) -> Self {
        Self {
            notifier: Arc::clone(&self.notifier),
        }
    }
}

impl<N: Notifier + 'static> NotificationDispatcher<N> {
    /// Create a dispatcher over `notifier`.
    #[must_use]
    pub fn new(notifier: N) -> Self {
        Self {
            notifier: Arc::new(notifier),
        }
    }

    /// Underlying notifier.
    #[must_use]
    pub fn notifier(&self) -> &N {
        &self.notifier
    }

    /// Deliver `notification` on a background task.
    pub fn dispatch(&self, notification: Notification) -> JoinHandle<()> {
        let notifier = Arc::clone(&self.notifier);
        tokio::spawn(async move {
            match notifier.send(&notification).await {
                Ok(()) => {
                    metrics::notification("sent");
                    tracing::info!(
                        recipient = %notification.recipient,
                        subject = %notification.subject,
                        "Notification delivered"
                    );
                }
                Err(e) => {
                    metrics::notification("failed");
                    tracing::warn!(
                        recipient = %notification.recipient,
                        error = %e,
                        "Notification delivery failed"
                    );
                }
            }
        })
    }
}
